// src/validator.rs
//! Static checks that prove a decoded configuration self-consistent, and
//! the conversion into an immutable [`RuleSet`].
use crate::config::{AppConfig, ElementConfig, LogLineConfig, ToolConfig};
use crate::error::{ConfigError, ConfigLocation};
use crate::rules::{
    contains_all, BlockMarkers, Column, Element, EndBoundary, Group, Rule, RuleSet,
    StartBoundary, END_OF_LINE, START_OF_LINE,
};
use std::collections::HashSet;
use tracing::warn;

const EXAMPLE_ELEMENTS: &str = r#"
Elements:
  TimestampKey:
    ColumnName: timestamp
    StartPattern: '^'
    PatternLength: 26
  InstrumentIdKey:
    ColumnName: instrumentId
    StartPattern: 'instrumentId: '
    EndPattern: ','
    AllowEmpty: true"#;

/// Validate the whole configuration and build the rule table.
///
/// Structural checks run over every group first, then the per-element
/// checks. The first violation aborts with the offending location.
pub fn validate(config: &ToolConfig) -> Result<RuleSet, ConfigError> {
    check_structure(config)?;
    for app in &config.apps {
        check_elements(app)?;
    }

    Ok(RuleSet::new(config.apps.iter().map(build_group).collect()))
}

fn check_structure(config: &ToolConfig) -> Result<(), ConfigError> {
    if config.apps.is_empty() {
        return Err(ConfigError::invalid(
            ConfigLocation::default(),
            "No apps configured in the config",
        ));
    }

    let mut seen_ids = HashSet::new();
    for (index, app) in config.apps.iter().enumerate() {
        if app.app_name.is_empty() {
            return Err(ConfigError::invalid(
                ConfigLocation::group(format!("#{}", index + 1)),
                "AppName cannot be empty",
            ));
        }
        let at = ConfigLocation::group(&app.app_name);
        if !seen_ids.insert(app.app_name.as_str()) {
            return Err(ConfigError::invalid(at, "AppName is used by more than one app"));
        }
        if app.log_lines.is_empty() {
            return Err(ConfigError::invalid(at, "No LogLines configured for the app"));
        }
        if has_some_markers(app) && !app.has_block_markers() {
            warn!(
                app = %app.app_name,
                "only one of StartBlockPattern/EndBlockPattern is set, block tracking disabled"
            );
        }

        for (line_index, logline) in app.log_lines.iter().enumerate() {
            check_logline(&at, line_index, logline)?;
        }
    }

    Ok(())
}

fn has_some_markers(app: &AppConfig) -> bool {
    [&app.start_block_pattern, &app.end_block_pattern]
        .iter()
        .any(|patterns| patterns.first().is_some_and(|p| !p.is_empty()))
}

fn check_logline(
    group: &ConfigLocation,
    index: usize,
    logline: &LogLineConfig,
) -> Result<(), ConfigError> {
    if logline.tag.is_empty() {
        return Err(ConfigError::invalid(
            group.clone().rule(format!("#{}", index + 1)),
            "Please provide a Tag in the LogLines config",
        ));
    }
    let at = group.clone().rule(&logline.tag);

    if logline.patterns.is_empty() {
        return Err(ConfigError::invalid(
            at,
            "Please provide Patterns to filter log lines",
        ));
    }
    if logline.example_line.is_empty() {
        return Err(ConfigError::invalid(
            at,
            "Please provide an ExampleLine to document the matching log line",
        ));
    }
    if !contains_all(&logline.example_line, &logline.patterns) {
        let missing: Vec<&str> = logline
            .patterns
            .iter()
            .filter(|p| !logline.example_line.contains(p.as_str()))
            .map(|p| p.as_str())
            .collect();
        return Err(ConfigError::invalid(
            at,
            format!(
                "Patterns {:?} not found in ExampleLine '{}'",
                missing, logline.example_line
            ),
        ));
    }
    if logline.elements.is_empty() {
        return Err(ConfigError::invalid(
            at,
            format!(
                "Please provide Elements to be printed in the output, for example:{}",
                EXAMPLE_ELEMENTS
            ),
        ));
    }

    Ok(())
}

fn check_elements(app: &AppConfig) -> Result<(), ConfigError> {
    let tracking_blocks = app.has_block_markers();
    let mut keys: HashSet<&str> = HashSet::new();
    let mut column_names: HashSet<&str> = HashSet::new();

    for logline in &app.log_lines {
        for (key, element) in &logline.elements {
            let at = ConfigLocation::group(&app.app_name)
                .rule(&logline.tag)
                .element(key);

            if tracking_blocks {
                if !keys.insert(key.as_str()) {
                    return Err(ConfigError::invalid(
                        at,
                        "Element keys must be unique within an app that tracks blocks",
                    ));
                }
                if let Some(name) = element.column_name() {
                    if !column_names.insert(name) {
                        return Err(ConfigError::invalid(
                            at,
                            format!("ColumnName '{}' is used by more than one element", name),
                        ));
                    }
                }
            }

            check_element(at, &logline.example_line, element)?;
        }
    }

    Ok(())
}

fn check_element(
    at: ConfigLocation,
    example_line: &str,
    element: &ElementConfig,
) -> Result<(), ConfigError> {
    let start = element.start_pattern.as_str();
    let end = element.end_pattern();

    if !is_anchor(start) && !example_line.contains(start) {
        return Err(ConfigError::invalid(
            at,
            format!("StartPattern '{}' not found in ExampleLine '{}'", start, example_line),
        ));
    }
    if let Some(end) = end.filter(|e| !is_anchor(e)) {
        if !example_line.contains(end) {
            return Err(ConfigError::invalid(
                at,
                format!("EndPattern '{}' not found in ExampleLine '{}'", end, example_line),
            ));
        }
    }
    if start.is_empty() {
        return Err(ConfigError::invalid(at, "Please provide a StartPattern"));
    }
    if let Some(length) = element.pattern_length {
        if length < 0 {
            return Err(ConfigError::invalid(
                at,
                format!("Negative PatternLength {} is not supported", length),
            ));
        }
        if end.is_some() {
            return Err(ConfigError::invalid(
                at,
                "Provide either PatternLength or EndPattern, not both",
            ));
        }
    }
    if start == END_OF_LINE || end == Some(START_OF_LINE) {
        return Err(ConfigError::invalid(
            at,
            format!(
                "StartPattern and EndPattern look swapped: '{}' marks the start and '{}' the end of a line",
                START_OF_LINE, END_OF_LINE
            ),
        ));
    }

    Ok(())
}

fn is_anchor(pattern: &str) -> bool {
    pattern == START_OF_LINE || pattern == END_OF_LINE
}

fn build_group(app: &AppConfig) -> Group {
    let rules: Vec<Rule> = app.log_lines.iter().map(build_rule).collect();

    let block = app.has_block_markers().then(|| BlockMarkers {
        start: app.start_block_pattern.clone(),
        end: app.end_block_pattern.clone(),
        policy: app.block_start_policy,
    });

    Group {
        id: app.app_name.clone(),
        columns: canonical_columns(&rules),
        rules,
        block,
    }
}

fn build_rule(logline: &LogLineConfig) -> Rule {
    Rule {
        tag: logline.tag.clone(),
        required: logline.patterns.clone(),
        elements: logline
            .elements
            .iter()
            .map(|(key, element)| build_element(key, element))
            .collect(),
        example_line: logline.example_line.clone(),
        trim_spaces: logline.trim_spaces,
    }
}

fn build_element(key: &str, element: &ElementConfig) -> Element {
    let end = match (element.end_pattern(), element.pattern_length) {
        (Some(END_OF_LINE), _) => EndBoundary::LineEnd,
        (Some(marker), _) => EndBoundary::Literal(marker.to_string()),
        // Validation rejects negative lengths before we get here
        (None, Some(length)) => EndBoundary::Length(usize::try_from(length).unwrap_or(0)),
        (None, None) => EndBoundary::Unbounded,
    };

    Element {
        key: key.to_string(),
        display_name: element.column_name().map(str::to_string),
        start: StartBoundary::parse(&element.start_pattern),
        end,
        allow_empty: element.allow_empty,
    }
}

/// First appearance of each element key across the rules, in declaration order
pub fn canonical_columns(rules: &[Rule]) -> Vec<Column> {
    let mut seen = HashSet::new();
    rules
        .iter()
        .flat_map(|rule| rule.elements.iter())
        .filter(|element| seen.insert(element.key.as_str()))
        .map(|element| Column {
            key: element.key.clone(),
            display_name: element.display_name.clone(),
        })
        .collect()
}
