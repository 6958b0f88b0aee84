use crate::models::{ParsedRecord, ValidationIssue, ValidationIssueType};
use chrono::NaiveDate;

const EARLIEST_BIRTH_YEAR: i32 = 1900;

/// Temporal rules, evaluated against a caller-supplied `today`.
pub struct DateValidator;

impl DateValidator {
    pub fn validate_birth_date(record: &ParsedRecord, today: NaiveDate) -> Vec<ValidationIssue> {
        let issue = |message: &str| ValidationIssue::new(ValidationIssueType::BirthDate, message);

        let Some(dob) = record.date_of_birth else {
            return vec![issue("Missing date of birth")];
        };

        let mut issues = Vec::new();
        if dob > today {
            issues.push(issue("Date of birth is in the future"));
        }
        if dob < NaiveDate::from_ymd_opt(EARLIEST_BIRTH_YEAR, 1, 1).unwrap_or(NaiveDate::MIN) {
            issues.push(issue("Date of birth is too far in the past"));
        }
        issues
    }

    /// A passport expiring today is still valid.
    pub fn validate_expiry(record: &ParsedRecord, today: NaiveDate) -> Vec<ValidationIssue> {
        let issue = |message: &str| ValidationIssue::new(ValidationIssueType::Expiry, message);

        match record.date_of_expiry {
            None => vec![issue("Missing expiry date")],
            Some(expiry) if expiry < today => vec![issue("Passport has expired")],
            Some(_) => Vec::new(),
        }
    }
}
