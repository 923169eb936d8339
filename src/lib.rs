// src/lib.rs
pub mod aggregator;
pub mod config;
pub mod error;
pub mod explain;
pub mod extractor;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod rules;
pub mod source;
pub mod validator;

pub use error::*;

pub use aggregator::{Aggregator, Table, NOT_AVAILABLE, TAG_COLUMN};
pub use config::ToolConfig;
pub use explain::{ColorScheme, Explainer};
pub use extractor::{ExtractedField, Record, NOT_FOUND};
pub use merge::{MergedLine, MergedLines};
pub use pipeline::{Emitted, ErrorStrategy, Pipeline, PipelineConfig, ProcessingStats, RunOutput};
pub use rules::{BlockStartPolicy, RuleSet};
pub use source::{LineSource, ReaderLineSource};
pub use validator::validate;
