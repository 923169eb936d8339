use crate::rules::{EndBoundary, Element, Rule, StartBoundary};
use indexmap::IndexMap;

/// Cell text for an element that matched but produced disallowed-empty text
pub const NOT_FOUND: &str = "N/F";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedField {
    Text(String),
    /// Boundaries were found but the value was empty and empty is not allowed
    NotFound,
}

impl ExtractedField {
    pub fn as_str(&self) -> &str {
        match self {
            ExtractedField::Text(text) => text,
            ExtractedField::NotFound => NOT_FOUND,
        }
    }
}

/// Fields extracted from one line (or one block of lines)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Tag of the rule that produced the record
    pub tag: String,
    pub fields: IndexMap<String, ExtractedField>,
}

impl Record {
    pub fn new(tag: impl Into<String>) -> Self {
        Record {
            tag: tag.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(ExtractedField::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Fold a later record into this one; later values win
    pub fn absorb(&mut self, other: Record) {
        self.tag = other.tag;
        self.fields.extend(other.fields);
    }
}

/// Byte offsets of a located element within a line.
///
/// `start..value_start` is the start marker, `value_start..value_end` the
/// value and `value_end..end` the end marker. Anchors have zero width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan {
    pub start: usize,
    pub value_start: usize,
    pub value_end: usize,
    pub end: usize,
}

/// Find an element's boundaries in a line, or `None` if either is missing
pub fn locate(line: &str, element: &Element) -> Option<FieldSpan> {
    let (start, value_start) = match &element.start {
        StartBoundary::LineStart => (0, 0),
        StartBoundary::Literal(marker) => {
            let at = line.find(marker.as_str())?;
            (at, at + marker.len())
        }
    };

    let rest = &line[value_start..];
    let (value_end, end) = match &element.end {
        EndBoundary::LineEnd | EndBoundary::Unbounded => (line.len(), line.len()),
        EndBoundary::Literal(marker) => {
            let at = value_start + rest.find(marker.as_str())?;
            (at, at + marker.len())
        }
        EndBoundary::Length(length) => {
            // Some only when more than `length` characters remain
            let (offset, _) = rest.char_indices().nth(*length)?;
            (value_start + offset, value_start + offset)
        }
    };

    Some(FieldSpan {
        start,
        value_start,
        value_end,
        end,
    })
}

/// Extract one element's value from a line
pub fn extract_field(line: &str, element: &Element, trim_spaces: bool) -> Option<ExtractedField> {
    let span = locate(line, element)?;
    let mut text = &line[span.value_start..span.value_end];
    if trim_spaces {
        text = text.trim();
    }

    if text.is_empty() && !element.allow_empty {
        Some(ExtractedField::NotFound)
    } else {
        Some(ExtractedField::Text(text.to_string()))
    }
}

/// Extract every element of a rule from a matched line.
///
/// Elements are independent: a missing one is skipped without affecting
/// the others. Returns `None` when no element produced a field.
pub fn extract(line: &str, rule: &Rule) -> Option<Record> {
    let mut record = Record::new(rule.tag.as_str());

    for element in &rule.elements {
        if let Some(field) = extract_field(line, element, rule.trim_spaces) {
            record.fields.insert(element.key.clone(), field);
        }
    }

    if record.is_empty() {
        None
    } else {
        Some(record)
    }
}
