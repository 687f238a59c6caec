use std::collections::HashMap;
use std::fs;
use std::path::Path;

use csv::StringRecord;
use thiserror::Error;

use crate::inventory::InventoryRecord;
use crate::labels::{self, ID_COLUMNS, STATUS_COLUMN};
use crate::metadata::{self, MetadataTable};
use crate::{EXPECTED_RECORDINGS, NUM_RECORDINGS, column_key};

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("no patient id column in metadata (tried {tried:?}); available columns: {available:?}")]
    NoJoinKey {
        tried: Vec<String>,
        available: Vec<String>,
    },
    #[error("no rows survived the merge")]
    Empty,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// The merged, labeled dataset: all metadata columns, the inventory columns,
/// then `target`, `has_all_audio`, `num_audio_types`.
#[derive(Debug)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MergedTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows labeled positive.
    pub fn positives(&self) -> usize {
        match self.column_index("target") {
            Some(idx) => self
                .rows
                .iter()
                .filter(|r| r.get(idx).map(String::as_str) == Some("1"))
                .count(),
            None => 0,
        }
    }
}

/// Inner-join metadata and inventory on patient id, derive the binary target
/// and the completeness columns, and optionally write the result CSV.
///
/// Metadata rows keep file order, a patient scanned under several date
/// folders fans out into one row per inventory record, and rows whose status
/// has no label are dropped.
pub fn create_dataset(
    metadata: &MetadataTable,
    inventory: &[InventoryRecord],
    output: Option<&Path>,
) -> Result<MergedTable, MergeError> {
    println!("Merging datasets...");

    let (id_idx, id_col) = metadata.id_column().ok_or_else(|| MergeError::NoJoinKey {
        tried: ID_COLUMNS.iter().map(|s| s.to_string()).collect(),
        available: metadata.columns.clone(),
    })?;
    println!("Using '{id_col}' as patient ID column from metadata");

    // Index inventory rows by patient id, preserving scan order per id.
    let mut by_patient: HashMap<&str, Vec<&InventoryRecord>> = HashMap::new();
    for record in inventory {
        by_patient
            .entry(record.patient_id.as_str())
            .or_default()
            .push(record);
    }

    let status_idx = metadata.column_index(STATUS_COLUMN);
    if status_idx.is_none() {
        log::warn!("'{STATUS_COLUMN}' column not found; target defaults to 0 for every row");
    }

    let (columns, add_patient_id) = output_columns(&metadata.columns);

    let mut joined = 0usize;
    let mut joined_statuses: Vec<StringRecord> = Vec::new();
    let mut audio_type_sum = 0u64;
    let mut rows: Vec<Vec<String>> = Vec::new();

    for meta_row in &metadata.rows {
        let Some(key) = meta_row.get(id_idx) else {
            continue;
        };
        let Some(matches) = by_patient.get(key) else {
            continue;
        };
        for &record in matches {
            joined += 1;
            let target = match status_idx {
                Some(idx) => {
                    let status = meta_row.get(idx).unwrap_or_default();
                    joined_statuses.push(StringRecord::from(vec![status]));
                    labels::target_for(status)
                }
                None => Some(0),
            };
            // Unmapped status: the row is excluded, not an error.
            let Some(target) = target else {
                continue;
            };
            audio_type_sum += u64::from(record.num_audio_types());
            rows.push(build_row(
                meta_row,
                record,
                target,
                metadata.columns.len(),
                add_patient_id,
            ));
        }
    }

    // Shape of the joined table before the derived columns are added.
    println!(
        "Merged dataset shape: {} rows x {} columns",
        joined,
        columns.len() - DERIVED_COLUMNS.len()
    );

    if status_idx.is_some() {
        println!("{STATUS_COLUMN} in merged data:");
        for (value, count) in metadata::value_counts(&joined_statuses, 0) {
            println!("  {value:<30} {count}");
        }
        println!("Creating target variable...");
        println!("Records before filtering unknown status: {joined}");
        println!("Records after filtering: {}", rows.len());
    }

    if rows.is_empty() {
        return Err(MergeError::Empty);
    }

    let table = MergedTable { columns, rows };
    let positives = table.positives();
    println!("Target distribution:");
    println!("  0    {}", table.len() - positives);
    println!("  1    {positives}");
    println!(
        "Average audio types per patient: {:.2}",
        audio_type_sum as f64 / table.len() as f64
    );

    if let Some(path) = output {
        write_csv(&table, path)?;
        println!("Final dataset saved to: {}", path.display());
    }

    Ok(table)
}

/// Columns appended after the join, in output order.
const DERIVED_COLUMNS: &[&str] = &["target", "has_all_audio", "num_audio_types"];

/// Output header: metadata columns in file order, the inventory columns, then
/// the derived columns. `patient_id` is skipped when the metadata id column is
/// already literally `patient_id` (the join would duplicate it).
fn output_columns(meta_columns: &[String]) -> (Vec<String>, bool) {
    let add_patient_id = !meta_columns.iter().any(|c| c == "patient_id");

    let mut columns = meta_columns.to_vec();
    if add_patient_id {
        columns.push("patient_id".to_string());
    }
    columns.push("date_folder".to_string());
    for name in EXPECTED_RECORDINGS {
        let key = column_key(name);
        columns.push(key.clone());
        columns.push(format!("has_{key}"));
    }
    for name in DERIVED_COLUMNS {
        columns.push(name.to_string());
    }

    (columns, add_patient_id)
}

fn build_row(
    meta_row: &StringRecord,
    record: &InventoryRecord,
    target: u8,
    meta_width: usize,
    add_patient_id: bool,
) -> Vec<String> {
    let mut row = Vec::with_capacity(meta_width + 2 + 2 * NUM_RECORDINGS + 3);

    // Short metadata rows pad with empty cells so the table stays rectangular.
    for i in 0..meta_width {
        row.push(meta_row.get(i).unwrap_or_default().to_string());
    }
    if add_patient_id {
        row.push(record.patient_id.clone());
    }
    row.push(record.date_folder.clone());
    for i in 0..NUM_RECORDINGS {
        row.push(
            record.paths[i]
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        row.push(record.flags[i].to_string());
    }
    row.push(target.to_string());
    row.push(u8::from(record.has_all_audio()).to_string());
    row.push(record.num_audio_types().to_string());

    row
}

fn write_csv(table: &MergedTable, path: &Path) -> Result<(), MergeError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn meta(columns: &[&str], rows: &[&[&str]]) -> MetadataTable {
        MetadataTable {
            columns: columns.iter().map(|s| s.to_string()).collect(),
            rows: rows.iter().map(|r| StringRecord::from(r.to_vec())).collect(),
        }
    }

    fn record(patient: &str, date: &str, present: &[&str]) -> InventoryRecord {
        let mut flags = [0u8; NUM_RECORDINGS];
        let mut paths: [Option<PathBuf>; NUM_RECORDINGS] = std::array::from_fn(|_| None);
        for (i, name) in EXPECTED_RECORDINGS.iter().enumerate() {
            if present.contains(name) {
                flags[i] = 1;
                paths[i] = Some(PathBuf::from(format!("{date}/{patient}/{name}.wav")));
            }
        }
        InventoryRecord {
            patient_id: patient.to_string(),
            date_folder: date.to_string(),
            flags,
            paths,
        }
    }

    fn cell<'a>(table: &'a MergedTable, row: usize, column: &str) -> &'a str {
        let idx = table.column_index(column).unwrap();
        table.rows[row][idx].as_str()
    }

    #[test]
    fn test_join_labels_and_filters() {
        // A healthy, B positive, C under validation; C joins but its status
        // has no label, so its row is dropped.
        let metadata = meta(
            &["id", "covid_status"],
            &[
                &["A", "healthy"],
                &["B", "positive_mild"],
                &["C", "under_validation"],
            ],
        );
        let inventory = vec![
            record("A", "20200413", &["cough-heavy"]),
            record("B", "20200413", &["cough-heavy"]),
            record("C", "20200413", &["cough-heavy"]),
        ];

        let table = create_dataset(&metadata, &inventory, None).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.positives(), 1);

        assert_eq!(cell(&table, 0, "id"), "A");
        assert_eq!(cell(&table, 0, "target"), "0");
        assert_eq!(cell(&table, 1, "id"), "B");
        assert_eq!(cell(&table, 1, "target"), "1");
        assert_eq!(cell(&table, 1, "num_audio_types"), "1");
        assert_eq!(cell(&table, 1, "has_all_audio"), "0");
        assert_eq!(cell(&table, 1, "has_cough_heavy"), "1");
        assert_eq!(cell(&table, 1, "has_vowel_a"), "0");
        assert_eq!(cell(&table, 1, "cough_heavy"), "20200413/B/cough-heavy.wav");
        assert_eq!(cell(&table, 1, "vowel_a"), "");
    }

    #[test]
    fn test_inner_join_drops_both_sides() {
        // C has metadata but no audio; X has audio but no metadata.
        let metadata = meta(
            &["id", "covid_status"],
            &[&["A", "healthy"], &["C", "healthy"]],
        );
        let inventory = vec![
            record("A", "20200413", &["vowel-a"]),
            record("X", "20200413", &["vowel-a"]),
        ];

        let table = create_dataset(&metadata, &inventory, None).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(cell(&table, 0, "id"), "A");
    }

    #[test]
    fn test_no_join_key() {
        let metadata = meta(&["age", "covid_status"], &[&["34", "healthy"]]);
        let err = create_dataset(&metadata, &[], None).unwrap_err();
        assert!(matches!(err, MergeError::NoJoinKey { .. }));
    }

    #[test]
    fn test_empty_join_is_an_error() {
        let metadata = meta(&["id", "covid_status"], &[&["A", "healthy"]]);
        let inventory = vec![record("B", "20200413", &["vowel-a"])];
        let err = create_dataset(&metadata, &inventory, None).unwrap_err();
        assert!(matches!(err, MergeError::Empty));
    }

    #[test]
    fn test_missing_status_column_defaults_target() {
        let metadata = meta(&["id", "age"], &[&["A", "34"], &["B", "41"]]);
        let inventory = vec![
            record("A", "20200413", &["vowel-a"]),
            record("B", "20200413", &["vowel-e"]),
        ];

        let table = create_dataset(&metadata, &inventory, None).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.positives(), 0);
        assert_eq!(cell(&table, 0, "target"), "0");
        assert_eq!(cell(&table, 1, "target"), "0");
    }

    #[test]
    fn test_duplicate_patient_fans_out() {
        let metadata = meta(&["id", "covid_status"], &[&["A", "positive_mild"]]);
        let inventory = vec![
            record("A", "20200413", &["cough-heavy"]),
            record("A", "20200420", EXPECTED_RECORDINGS),
        ];

        let table = create_dataset(&metadata, &inventory, None).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(cell(&table, 0, "date_folder"), "20200413");
        assert_eq!(cell(&table, 0, "num_audio_types"), "1");
        assert_eq!(cell(&table, 1, "date_folder"), "20200420");
        assert_eq!(cell(&table, 1, "num_audio_types"), "9");
        assert_eq!(cell(&table, 1, "has_all_audio"), "1");
    }

    #[test]
    fn test_output_columns_shape() {
        let meta_columns = vec!["id".to_string(), "covid_status".to_string()];
        let (columns, add_patient_id) = output_columns(&meta_columns);

        assert!(add_patient_id);
        // metadata + patient_id + date_folder + (path, flag) per recording,
        // then the derived columns last
        assert_eq!(
            columns.len(),
            meta_columns.len() + 2 + 2 * NUM_RECORDINGS + DERIVED_COLUMNS.len()
        );
        let joined_width = columns.len() - DERIVED_COLUMNS.len();
        assert_eq!(&columns[joined_width..], DERIVED_COLUMNS);
        assert_eq!(columns[..2], ["id", "covid_status"]);
        assert_eq!(columns[2], "patient_id");
        assert_eq!(columns[3], "date_folder");
    }

    #[test]
    fn test_patient_id_metadata_column_not_duplicated() {
        let metadata = meta(&["patient_id", "covid_status"], &[&["A", "healthy"]]);
        let inventory = vec![record("A", "20200413", &["vowel-a"])];

        let table = create_dataset(&metadata, &inventory, None).unwrap();
        let count = table.columns.iter().filter(|c| *c == "patient_id").count();
        assert_eq!(count, 1);
        assert_eq!(cell(&table, 0, "patient_id"), "A");
    }

    #[test]
    fn test_writes_output_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let metadata = meta(
            &["id", "covid_status"],
            &[&["A", "healthy"], &["B", "positive_mild"]],
        );
        let inventory = vec![
            record("A", "20200413", &["cough-heavy", "vowel-a"]),
            record("B", "20200413", &["cough-heavy"]),
        ];

        // Parent directories are created as needed.
        let first = tmp.path().join("out").join("merged.csv");
        let second = tmp.path().join("out").join("merged2.csv");
        create_dataset(&metadata, &inventory, Some(first.as_path())).unwrap();
        create_dataset(&metadata, &inventory, Some(second.as_path())).unwrap();

        let a = std::fs::read(&first).unwrap();
        let b = std::fs::read(&second).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a, b);

        let contents = String::from_utf8(a).unwrap();
        let header = contents.lines().next().unwrap();
        assert!(header.starts_with("id,covid_status,patient_id,date_folder,"));
        assert!(header.ends_with("target,has_all_audio,num_audio_types"));
        assert_eq!(contents.lines().count(), 3);
    }
}
