// src/config.rs
//! Configuration document as decoded from YAML, before validation.
use crate::error::ConfigError;
use crate::rules::BlockStartPolicy;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default location of the config file
pub const DEFAULT_CONFIG_FILE: &str = "~/.tocsv.yaml";

/// Top-level document: tool settings plus the application groups
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ToolConfig {
    #[serde(default)]
    pub anchor_files: Vec<String>,
    #[serde(default)]
    pub print_tag_in_output: bool,
    #[serde(default)]
    pub log_directory: Option<String>,
    #[serde(default)]
    pub apps: Vec<AppConfig>,
}

/// One group of rules producing one output table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppConfig {
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub start_block_pattern: Vec<String>,
    #[serde(default)]
    pub end_block_pattern: Vec<String>,
    #[serde(default)]
    pub block_start_policy: BlockStartPolicy,
    #[serde(default)]
    pub log_lines: Vec<LogLineConfig>,
}

impl AppConfig {
    /// Block tracking needs both marker sets, each with a non-empty first entry
    pub fn has_block_markers(&self) -> bool {
        has_markers(&self.start_block_pattern) && has_markers(&self.end_block_pattern)
    }
}

fn has_markers(patterns: &[String]) -> bool {
    patterns.first().is_some_and(|first| !first.is_empty())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogLineConfig {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub trim_spaces: bool,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub example_line: String,
    /// Declaration order is the column order
    #[serde(default)]
    pub elements: IndexMap<String, ElementConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ElementConfig {
    #[serde(default)]
    pub column_name: Option<String>,
    #[serde(default)]
    pub start_pattern: String,
    #[serde(default)]
    pub end_pattern: Option<String>,
    #[serde(default)]
    pub allow_empty: bool,
    #[serde(default)]
    pub pattern_length: Option<i64>,
}

impl ElementConfig {
    /// End pattern, treating an empty string as unset
    pub fn end_pattern(&self) -> Option<&str> {
        self.end_pattern.as_deref().filter(|p| !p.is_empty())
    }

    pub fn column_name(&self) -> Option<&str> {
        self.column_name.as_deref().filter(|n| !n.is_empty())
    }
}

/// Only the settings the loader needs before anchors can be resolved
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AnchorSettings {
    #[serde(default)]
    anchor_files: Vec<String>,
}

impl ToolConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load the config file, resolving aliases against anchor files.
    ///
    /// Anchor files given explicitly win over the `AnchorFiles` setting.
    /// Their contents are placed ahead of the main document so its aliases
    /// can refer to the anchors they define. Missing anchor files are skipped.
    pub fn load(path: &Path, anchor_files: &[PathBuf]) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        let main = read_file(path)?;

        let anchors: Vec<PathBuf> = if anchor_files.is_empty() {
            configured_anchor_files(&main)
        } else {
            anchor_files.to_vec()
        };

        let mut document = String::new();
        for anchor in &anchors {
            if !anchor.exists() {
                warn!(path = %anchor.display(), "anchor file does not exist, skipping");
                continue;
            }
            document.push_str(&read_file(anchor)?);
            document.push('\n');
        }
        document.push_str(&main);

        Self::from_yaml_str(&document)
    }
}

/// Read `AnchorFiles` from the main document before anchors are available.
///
/// Decoding the whole document fails as soon as it uses an alias defined in
/// an anchor file, so on failure only the top-level `AnchorFiles` block is
/// decoded.
fn configured_anchor_files(main: &str) -> Vec<PathBuf> {
    let settings = serde_yaml::from_str::<AnchorSettings>(main)
        .or_else(|_| serde_yaml::from_str::<AnchorSettings>(&anchor_files_block(main)));

    match settings {
        Ok(settings) => settings
            .anchor_files
            .iter()
            .map(|p| expand_tilde(p))
            .collect(),
        Err(e) => {
            debug!(error = %e, "could not read AnchorFiles from config");
            Vec::new()
        }
    }
}

/// The top-level `AnchorFiles:` entry and its indented continuation lines
fn anchor_files_block(document: &str) -> String {
    let mut block = String::new();
    let mut inside = false;

    for line in document.lines() {
        if inside {
            let continues = line.trim().is_empty()
                || line.starts_with(' ')
                || line.starts_with('\t')
                || line.starts_with('-');
            if !continues {
                break;
            }
        } else if line.starts_with("AnchorFiles:") {
            inside = true;
        } else {
            continue;
        }
        block.push_str(line);
        block.push('\n');
    }

    block
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match (path, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ORDERS: &str = r#"
Apps:
  - AppName: Orders
    LogLines:
      - Tag: NEW
        TrimSpaces: true
        Patterns: ["ORDER NEW"]
        ExampleLine: "2020-06-02 14:33:56.531063 ORDER NEW price: 123.123, side: BUY"
        Elements:
          TimeStampKey:
            ColumnName: timestamp
            StartPattern: "^"
            PatternLength: 26
          SideKey:
            StartPattern: "side: "
            EndPattern: "$"
          PriceKey:
            ColumnName: price
            StartPattern: "price: "
            EndPattern: ","
            AllowEmpty: true
"#;

    #[test]
    fn test_decode_preserves_element_order() {
        let config = ToolConfig::from_yaml_str(ORDERS).unwrap();
        assert_eq!(config.apps.len(), 1);

        let app = &config.apps[0];
        assert_eq!(app.app_name, "Orders");
        assert!(!app.has_block_markers());
        assert_eq!(app.block_start_policy, BlockStartPolicy::Reset);

        let line = &app.log_lines[0];
        assert!(line.trim_spaces);
        let keys: Vec<&str> = line.elements.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["TimeStampKey", "SideKey", "PriceKey"]);

        let ts = &line.elements["TimeStampKey"];
        assert_eq!(ts.pattern_length, Some(26));
        assert_eq!(ts.end_pattern(), None);
        assert!(line.elements["PriceKey"].allow_empty);
        assert_eq!(line.elements["SideKey"].column_name(), None);
    }

    #[test]
    fn test_defaults_for_tool_settings() {
        let config = ToolConfig::from_yaml_str(ORDERS).unwrap();
        assert!(!config.print_tag_in_output);
        assert_eq!(config.log_directory, None);
        assert!(config.anchor_files.is_empty());
    }

    #[test]
    fn test_empty_strings_mean_unset() {
        let element = ElementConfig {
            column_name: Some(String::new()),
            end_pattern: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(element.end_pattern(), None);
        assert_eq!(element.column_name(), None);

        let app = AppConfig {
            start_block_pattern: vec![String::new()],
            end_block_pattern: vec!["END".to_string()],
            ..Default::default()
        };
        assert!(!app.has_block_markers());
    }

    #[test]
    fn test_block_policy_decoding() {
        let config = ToolConfig::from_yaml_str(
            r#"
Apps:
  - AppName: Sessions
    StartBlockPattern: ["BEGIN"]
    EndBlockPattern: ["END"]
    BlockStartPolicy: carry
"#,
        )
        .unwrap();
        assert!(config.apps[0].has_block_markers());
        assert_eq!(config.apps[0].block_start_policy, BlockStartPolicy::Carry);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ToolConfig::load(Path::new("/no/such/tocsv.yaml"), &[]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_load_resolves_aliases_from_anchor_files() {
        let mut anchor = NamedTempFile::new().unwrap();
        write!(
            anchor,
            r#"
Orders: &Orders
  AppName: Orders
  LogLines:
    - Tag: NEW
      Patterns: ["ORDER NEW"]
      ExampleLine: "ORDER NEW price: 1,"
      Elements:
        PriceKey:
          StartPattern: "price: "
          EndPattern: ","
"#
        )
        .unwrap();

        let mut main = NamedTempFile::new().unwrap();
        write!(main, "PrintTagInOutput: true\nApps:\n  - *Orders\n").unwrap();

        let config = ToolConfig::load(main.path(), &[anchor.path().to_path_buf()]).unwrap();
        assert!(config.print_tag_in_output);
        assert_eq!(config.apps.len(), 1);
        assert_eq!(config.apps[0].app_name, "Orders");
        assert_eq!(config.apps[0].log_lines[0].tag, "NEW");
    }

    #[test]
    fn test_load_uses_configured_anchor_files() {
        let mut anchor = NamedTempFile::new().unwrap();
        write!(
            anchor,
            "Minimal: &Minimal\n  AppName: Minimal\n  LogLines: []\n"
        )
        .unwrap();

        let mut main = NamedTempFile::new().unwrap();
        write!(
            main,
            "AnchorFiles:\n  - \"{}\"\nLogDirectory: out\nApps:\n  - *Minimal\n",
            anchor.path().display()
        )
        .unwrap();

        let config = ToolConfig::load(main.path(), &[]).unwrap();
        assert_eq!(config.anchor_files.len(), 1);
        assert_eq!(config.log_directory.as_deref(), Some("out"));
        assert_eq!(config.apps[0].app_name, "Minimal");
    }

    #[test]
    fn test_anchor_files_block() {
        let doc = "PrintTagInOutput: true\nAnchorFiles:\n  - a.yaml\n  - b.yaml\nApps:\n  - *Orders\n";
        assert_eq!(anchor_files_block(doc), "AnchorFiles:\n  - a.yaml\n  - b.yaml\n");
        assert_eq!(anchor_files_block("Apps: []\n"), "");
    }

    #[test]
    fn test_load_skips_missing_anchor_files() {
        let mut main = NamedTempFile::new().unwrap();
        write!(main, "Apps: []\n").unwrap();

        let config =
            ToolConfig::load(main.path(), &[PathBuf::from("/no/such/anchor.yaml")]).unwrap();
        assert!(config.apps.is_empty());
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        let err = ToolConfig::from_yaml_str("Apps: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("logs/out"), PathBuf::from("logs/out"));
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(expand_tilde("~/logs"), PathBuf::from(home).join("logs"));
        }
    }
}
