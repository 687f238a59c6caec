use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use walkdir::WalkDir;

use crate::{EXPECTED_RECORDINGS, NUM_RECORDINGS, RECORDING_EXT};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// One patient folder that holds at least one expected recording.
/// Flags and paths are indexed in `EXPECTED_RECORDINGS` order.
#[derive(Debug, Clone)]
pub struct InventoryRecord {
    pub patient_id: String,
    pub date_folder: String,
    /// Presence flag (1/0) per expected recording.
    pub flags: [u8; NUM_RECORDINGS],
    /// Full path per recording, recorded only when the file exists.
    pub paths: [Option<PathBuf>; NUM_RECORDINGS],
}

impl InventoryRecord {
    pub fn num_audio_types(&self) -> u32 {
        self.flags.iter().map(|&f| u32::from(f)).sum()
    }

    pub fn has_all_audio(&self) -> bool {
        self.flags.iter().all(|&f| f == 1)
    }
}

/// Scan the two-level date/patient tree and build one record per patient
/// folder that contains at least one expected recording. Folders are visited
/// in name order so repeat runs produce identical output.
pub fn scan(root: &Path) -> Result<Vec<InventoryRecord>, ScanError> {
    println!("Scanning for audio files...");

    let date_folders = subdirectories(root)?;
    println!("Found {} date folders", date_folders.len());

    let pb = ProgressBar::new(date_folders.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} date folders ({eta})",
        )
        .unwrap()
        .progress_chars("#>-"),
    );

    let mut records = Vec::new();
    for date_dir in &date_folders {
        let date_folder = dir_name(date_dir);
        for patient_dir in subdirectories(date_dir)? {
            if let Some(record) = scan_patient(&patient_dir, &date_folder) {
                records.push(record);
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!("Found {} patients with audio files", records.len());
    if !records.is_empty() {
        let sample: Vec<&str> = records
            .iter()
            .take(5)
            .map(|r| r.patient_id.as_str())
            .collect();
        println!("Sample audio patient IDs: {sample:?}");
    }

    warn_duplicates(&records);
    Ok(records)
}

/// Patients recorded under more than one date folder fan out into multiple
/// rows after the join. Surface the condition instead of deduplicating.
fn warn_duplicates(records: &[InventoryRecord]) {
    let mut seen = HashSet::new();
    let mut duplicates = 0usize;
    for record in records {
        if !seen.insert(record.patient_id.as_str()) {
            duplicates += 1;
        }
    }
    if duplicates > 0 {
        log::warn!(
            "{duplicates} patient folders appear under more than one date folder; \
             each occurrence becomes its own row in the merged dataset"
        );
    }
}

/// Immediate subdirectories of `dir`, sorted by name.
/// Non-directory entries are skipped silently.
fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    dirs.sort_unstable();
    Ok(dirs)
}

/// Probe one patient folder for the nine expected recordings.
/// Returns None when none of them is present.
fn scan_patient(patient_dir: &Path, date_folder: &str) -> Option<InventoryRecord> {
    let mut flags = [0u8; NUM_RECORDINGS];
    let mut paths: [Option<PathBuf>; NUM_RECORDINGS] = std::array::from_fn(|_| None);

    for (i, name) in EXPECTED_RECORDINGS.iter().enumerate() {
        let candidate = patient_dir.join(format!("{name}.{RECORDING_EXT}"));
        if candidate.exists() {
            flags[i] = 1;
            paths[i] = Some(candidate);
        }
    }

    if flags.iter().all(|&f| f == 0) {
        return None;
    }

    Some(InventoryRecord {
        patient_id: dir_name(patient_dir),
        date_folder: date_folder.to_string(),
        flags,
        paths,
    })
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
