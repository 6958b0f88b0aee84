use crate::models::{CountryCodes, ParsedRecord, ValidationIssue, ValidationIssueType, DOCUMENT_TYPES};

/// Structural rules: document type, country codes and required fields.
pub struct FormatValidator;

impl FormatValidator {
    pub fn validate_document_type(record: &ParsedRecord) -> Vec<ValidationIssue> {
        let mut chars = record.document_type.chars();
        let known = match (chars.next(), chars.next()) {
            (Some(c), None) => DOCUMENT_TYPES.contains(&c),
            _ => false,
        };

        if known {
            Vec::new()
        } else {
            vec![ValidationIssue::new(
                ValidationIssueType::DocumentType,
                format!("Invalid document type: {}", record.document_type),
            )]
        }
    }

    /// Empty codes are skipped; anything else must be in the table.
    pub fn validate_countries(record: &ParsedRecord, countries: &CountryCodes) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if !record.issuing_country.is_empty() && !countries.contains(&record.issuing_country) {
            issues.push(ValidationIssue::new(
                ValidationIssueType::Country,
                format!("Invalid issuing country code: {}", record.issuing_country),
            ));
        }

        if !record.nationality.is_empty() && !countries.contains(&record.nationality) {
            issues.push(ValidationIssue::new(
                ValidationIssueType::Country,
                format!("Invalid nationality code: {}", record.nationality),
            ));
        }

        issues
    }

    pub fn validate_required_fields(record: &ParsedRecord) -> Vec<ValidationIssue> {
        [
            ("surname", &record.surname),
            ("passport_number", &record.passport_number),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| {
            ValidationIssue::new(
                ValidationIssueType::RequiredField,
                format!("Missing required field: {}", name),
            )
        })
        .collect()
    }
}
