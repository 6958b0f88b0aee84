pub mod dates;
pub mod format;
pub mod mrz;

pub use dates::DateValidator;
pub use format::FormatValidator;
pub use mrz::MrzValidator;

use crate::models::{CountryCodes, ParsedRecord, ValidationVerdict};
use chrono::{Local, NaiveDate};
use std::sync::Arc;

/// Business rules over a decoded record. Holds only the shared country table,
/// so the same record and day always give the same verdict.
#[derive(Debug, Clone)]
pub struct RecordValidator {
    countries: Arc<CountryCodes>,
}

impl RecordValidator {
    pub fn new(countries: Arc<CountryCodes>) -> Self {
        RecordValidator { countries }
    }

    pub fn validate(&self, record: &ParsedRecord) -> ValidationVerdict {
        self.validate_on(record, Local::now().date_naive())
    }

    pub fn validate_on(&self, record: &ParsedRecord, today: NaiveDate) -> ValidationVerdict {
        let mut issues = FormatValidator::validate_document_type(record);
        issues.extend(FormatValidator::validate_countries(record, &self.countries));
        issues.extend(MrzValidator::validate(record));
        issues.extend(DateValidator::validate_birth_date(record, today));
        issues.extend(DateValidator::validate_expiry(record, today));
        issues.extend(FormatValidator::validate_required_fields(record));
        ValidationVerdict::from_issues(issues)
    }
}

impl Default for RecordValidator {
    fn default() -> Self {
        RecordValidator::new(Arc::new(CountryCodes::default()))
    }
}
