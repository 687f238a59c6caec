pub mod config;
pub mod inventory;
pub mod labels;
pub mod merge;
pub mod metadata;

/// Recordings every Coswara patient folder is expected to contain
pub const EXPECTED_RECORDINGS: &[&str] = &[
    "breathing-deep",
    "breathing-shallow",
    "cough-heavy",
    "cough-shallow",
    "counting-normal",
    "counting-fast",
    "vowel-a",
    "vowel-e",
    "vowel-o",
];

/// Number of expected recordings per patient folder
pub const NUM_RECORDINGS: usize = EXPECTED_RECORDINGS.len();

/// File extension of the expected recordings
pub const RECORDING_EXT: &str = "wav";

/// Application name for XDG paths
pub const APP_NAME: &str = "coswara-merge";

/// Normalize a recording name into a column key ("cough-heavy" -> "cough_heavy").
pub fn column_key(recording: &str) -> String {
    recording.replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_key() {
        assert_eq!(column_key("cough-heavy"), "cough_heavy");
        assert_eq!(column_key("vowel-a"), "vowel_a");
        assert_eq!(column_key("target"), "target");
    }
}
