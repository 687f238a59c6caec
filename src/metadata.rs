use std::path::Path;

use csv::StringRecord;
use thiserror::Error;

use crate::labels::{ID_COLUMNS, STATUS_COLUMN};

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Fully materialized metadata CSV: header row plus data rows.
/// Columns are open-ended; every original column is carried through the merge.
pub struct MetadataTable {
    pub columns: Vec<String>,
    pub rows: Vec<StringRecord>,
}

impl MetadataTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Resolve the patient id column by trying the accepted aliases in
    /// priority order; first one present wins.
    pub fn id_column(&self) -> Option<(usize, &'static str)> {
        ID_COLUMNS
            .iter()
            .find_map(|&name| self.column_index(name).map(|idx| (idx, name)))
    }
}

/// Load the metadata CSV and print a short report.
pub fn load(path: &Path) -> Result<MetadataTable, MetadataError> {
    println!("Loading metadata CSV...");

    let mut reader = csv::Reader::from_path(path)?;
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?);
    }

    let table = MetadataTable { columns, rows };
    report(&table);
    Ok(table)
}

fn report(table: &MetadataTable) {
    println!(
        "Metadata shape: {} rows x {} columns",
        table.rows.len(),
        table.columns.len()
    );
    println!("Columns: {:?}", table.columns);

    if let Some(idx) = table.column_index(STATUS_COLUMN) {
        println!("{STATUS_COLUMN} distribution:");
        for (value, count) in value_counts(&table.rows, idx) {
            println!("  {value:<30} {count}");
        }
    }

    if let Some(idx) = table.column_index("id") {
        let sample: Vec<&str> = table
            .rows
            .iter()
            .take(5)
            .filter_map(|r| r.get(idx))
            .collect();
        println!("Sample patient IDs: {sample:?}");
    }
}

/// Frequency counts of one column, descending by count; ties keep first-seen
/// order (the sort is stable).
pub fn value_counts(rows: &[StringRecord], idx: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for row in rows {
        let value = row.get(idx).unwrap_or_default();
        match counts.iter().position(|(v, _)| v == value) {
            Some(i) => counts[i].1 += 1,
            None => counts.push((value.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
