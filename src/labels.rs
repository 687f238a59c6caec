/// Column holding the categorical health status in the metadata CSV.
pub const STATUS_COLUMN: &str = "covid_status";

/// Metadata columns accepted as the patient identifier, tried in priority order.
pub const ID_COLUMNS: &[&str] = &["id", "d", "patient_id"];

/// Fixed health-status -> binary target mapping. Categories outside this table
/// (e.g. "under_validation", "resp_illness_not_identified") carry no label and
/// their rows are dropped after the join.
const STATUS_LABELS: &[(&str, u8)] = &[
    ("positive_mild", 1),
    ("positive_moderate", 1),
    ("positive_asymp", 1),
    ("healthy", 0),
    ("no_resp_illness_exposed", 0),
    ("recovered_full", 0),
];

/// Look up the binary target for a status category, if it is recognized.
pub fn target_for(status: &str) -> Option<u8> {
    STATUS_LABELS
        .iter()
        .find(|(s, _)| *s == status)
        .map(|&(_, target)| target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_categories() {
        assert_eq!(target_for("positive_mild"), Some(1));
        assert_eq!(target_for("positive_moderate"), Some(1));
        assert_eq!(target_for("positive_asymp"), Some(1));
    }

    #[test]
    fn test_negative_categories() {
        assert_eq!(target_for("healthy"), Some(0));
        assert_eq!(target_for("no_resp_illness_exposed"), Some(0));
        assert_eq!(target_for("recovered_full"), Some(0));
    }

    #[test]
    fn test_unmapped_categories() {
        assert_eq!(target_for("under_validation"), None);
        assert_eq!(target_for("resp_illness_not_identified"), None);
        assert_eq!(target_for(""), None);
        assert_eq!(target_for("Healthy"), None);
    }
}
