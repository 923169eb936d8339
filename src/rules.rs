// src/rules.rs
use serde::Deserialize;

/// Start pattern meaning "the field starts at the beginning of the line"
pub const START_OF_LINE: &str = "^";
/// End pattern meaning "the field runs to the end of the line"
pub const END_OF_LINE: &str = "$";

/// Where a field begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartBoundary {
    LineStart,
    /// Field begins right after the first occurrence of this text
    Literal(String),
}

impl StartBoundary {
    pub fn parse(pattern: &str) -> Self {
        if pattern == START_OF_LINE {
            StartBoundary::LineStart
        } else {
            StartBoundary::Literal(pattern.to_string())
        }
    }

    pub fn pattern(&self) -> &str {
        match self {
            StartBoundary::LineStart => START_OF_LINE,
            StartBoundary::Literal(text) => text,
        }
    }
}

/// Where a field ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndBoundary {
    LineEnd,
    /// Field ends right before the first occurrence of this text after the start
    Literal(String),
    /// Field is this many characters long
    Length(usize),
    /// No end configured, the line itself terminates the field
    Unbounded,
}

/// One named field extraction within a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub key: String,
    pub display_name: Option<String>,
    pub start: StartBoundary,
    pub end: EndBoundary,
    pub allow_empty: bool,
}

impl Element {
    /// Header text for this element's column
    pub fn column_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.key)
    }
}

/// A classification rule: required substrings plus an extraction schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub tag: String,
    pub required: Vec<String>,
    pub elements: Vec<Element>,
    pub example_line: String,
    pub trim_spaces: bool,
}

impl Rule {
    pub fn matches(&self, line: &str) -> bool {
        contains_all(line, &self.required)
    }
}

/// What a block-start line does to fields accumulated from an unfinished block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStartPolicy {
    /// Discard the unfinished block and start over
    #[default]
    Reset,
    /// Keep accumulating until an end marker is seen
    Carry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMarkers {
    pub start: Vec<String>,
    pub end: Vec<String>,
    pub policy: BlockStartPolicy,
}

impl BlockMarkers {
    pub fn is_start(&self, line: &str) -> bool {
        contains_all(line, &self.start)
    }

    pub fn is_end(&self, line: &str) -> bool {
        contains_all(line, &self.end)
    }
}

/// One output column of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub key: String,
    pub display_name: Option<String>,
}

impl Column {
    pub fn header(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.key)
    }
}

/// An output table scope, e.g. one application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub rules: Vec<Rule>,
    /// Present only when both start and end markers are configured
    pub block: Option<BlockMarkers>,
    /// Canonical column order, fixed at load time
    pub columns: Vec<Column>,
}

/// Location of the rule that claimed a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleRef {
    pub group: usize,
    pub rule: usize,
}

/// Validated, immutable rule table. Built by [`crate::validator::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    groups: Vec<Group>,
}

impl RuleSet {
    pub(crate) fn new(groups: Vec<Group>) -> Self {
        RuleSet { groups }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, index: usize) -> Option<&Group> {
        self.groups.get(index)
    }

    pub fn rule(&self, at: RuleRef) -> Option<&Rule> {
        self.groups.get(at.group)?.rules.get(at.rule)
    }

    /// First rule, in declaration order, whose required substrings all occur in the line
    pub fn dispatch(&self, line: &str) -> Option<RuleRef> {
        self.groups.iter().enumerate().find_map(|(g, group)| {
            group
                .rules
                .iter()
                .position(|rule| rule.matches(line))
                .map(|r| RuleRef { group: g, rule: r })
        })
    }
}

pub fn contains_all(line: &str, patterns: &[String]) -> bool {
    patterns.iter().all(|pattern| line.contains(pattern.as_str()))
}
