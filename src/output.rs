use crate::aggregator::Table;
use crate::error::ProcessingError;
use chrono::NaiveDate;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write a table as CSV: header, then rows.
///
/// Cells containing the delimiter, quotes or line breaks are quoted.
pub fn write_table<W: Write>(output: W, table: &Table) -> Result<(), ProcessingError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);

    writer.write_record(&table.header)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write all tables back to back, in order
pub fn write_tables<W: Write>(output: &mut W, tables: &[Table]) -> Result<(), ProcessingError> {
    for table in tables {
        write_table(&mut *output, table)?;
    }
    Ok(())
}

/// File name for a group's table produced on the given day
pub fn table_file_name(group: &str, date: NaiveDate) -> String {
    format!("{}.{}.csv", group, date.format("%Y%m%d"))
}

/// Write each table to `<dir>/<group>.<YYYYMMDD>.csv`, creating the directory
/// if needed. Returns the written paths in table order.
pub fn write_tables_to_dir(
    dir: &Path,
    tables: &[Table],
    date: NaiveDate,
) -> Result<Vec<PathBuf>, ProcessingError> {
    fs::create_dir_all(dir)?;

    let mut paths = Vec::with_capacity(tables.len());
    for table in tables {
        let path = dir.join(table_file_name(&table.name, date));
        debug!(path = %path.display(), rows = table.rows.len(), "writing table");
        let file = BufWriter::new(File::create(&path)?);
        write_table(file, table)?;
        paths.push(path);
    }
    Ok(paths)
}
