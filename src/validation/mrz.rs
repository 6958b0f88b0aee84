use crate::models::{ParsedRecord, ValidationIssue, ValidationIssueType};

/// Only the passport number, birth date and expiry checks are binding. The
/// personal number and composite checks are often defeated by misread fillers.
pub struct MrzValidator;

impl MrzValidator {
    pub fn validate(record: &ParsedRecord) -> Option<ValidationIssue> {
        let failed = record.check_digits.critical_failures();
        if failed.is_empty() {
            return None;
        }
        Some(ValidationIssue::new(
            ValidationIssueType::Checksum,
            format!("Critical MRZ checksum validation failed: {}", failed.join(", ")),
        ))
    }
}
