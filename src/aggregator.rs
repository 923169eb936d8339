use crate::extractor::Record;
use crate::rules::{Column, RuleSet};

/// Cell text for a column the record has no field for
pub const NOT_AVAILABLE: &str = "N/A";
/// Header of the optional leading column holding the rule tag
pub const TAG_COLUMN: &str = "__tag__";

/// One output table: a header and its rows, all cells as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Group id, used to name the output file
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

struct GroupTable {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

/// Collects records into per-group rows following each group's column order
pub struct Aggregator {
    groups: Vec<GroupTable>,
    include_tag: bool,
}

impl Aggregator {
    pub fn new(rules: &RuleSet, include_tag: bool) -> Self {
        Aggregator {
            groups: rules
                .groups()
                .iter()
                .map(|group| GroupTable {
                    name: group.id.clone(),
                    columns: group.columns.clone(),
                    rows: Vec::new(),
                })
                .collect(),
            include_tag,
        }
    }

    /// Append a record as a row of the given group's table.
    ///
    /// Records for an unknown group index are ignored.
    pub fn add(&mut self, group: usize, record: &Record) {
        let include_tag = self.include_tag;
        let Some(table) = self.groups.get_mut(group) else {
            return;
        };

        let mut row = Vec::with_capacity(table.columns.len() + usize::from(include_tag));
        if include_tag {
            row.push(record.tag.clone());
        }
        row.extend(
            table
                .columns
                .iter()
                .map(|column| record.get(&column.key).unwrap_or(NOT_AVAILABLE).to_string()),
        );
        table.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|g| g.rows.len()).sum()
    }

    /// Tables for every group that received at least one record, in group order
    pub fn into_tables(self) -> Vec<Table> {
        let include_tag = self.include_tag;
        self.groups
            .into_iter()
            .filter(|group| !group.rows.is_empty())
            .map(|group| {
                let mut header = Vec::with_capacity(group.columns.len() + 1);
                if include_tag {
                    header.push(TAG_COLUMN.to_string());
                }
                header.extend(group.columns.iter().map(|c| c.header().to_string()));
                Table {
                    name: group.name,
                    header,
                    rows: group.rows,
                }
            })
            .collect()
    }
}
