use std::fmt;
use std::path::PathBuf;

/// Where in the configuration a problem was found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLocation {
    pub group: Option<String>,
    pub rule: Option<String>,
    pub element: Option<String>,
}

impl ConfigLocation {
    pub fn group(group: impl Into<String>) -> Self {
        ConfigLocation {
            group: Some(group.into()),
            ..Default::default()
        }
    }

    pub fn rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }
}

impl fmt::Display for ConfigLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(group) = &self.group {
            write!(f, " in group '{}'", group)?;
        }
        if let Some(rule) = &self.rule {
            write!(f, ", rule '{}'", rule)?;
        }
        if let Some(element) = &self.element {
            write!(f, ", element '{}'", element)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Failed to read config '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration{location}: {reason}")]
    Invalid {
        location: ConfigLocation,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(location: ConfigLocation, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            location,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Line {line_number} of input {source_index} too long: {length} > {max_length}")]
    LineTooLong {
        source_index: usize,
        line_number: usize,
        length: usize,
        max_length: usize,
    },
}
