use crate::models::{CheckDigitResults, ParsedRecord, RawText, Sex, DOCUMENT_TYPES};
use crate::processing::checksum::verify_check_digit;
use crate::processing::field_correction::{FieldCorrection, FILLER};
use crate::utils::PassportError;
use chrono::NaiveDate;
use log::debug;
use std::ops::Range;

const MIN_LINE_LENGTH: usize = 35;
const MAX_LINE_LENGTH: usize = 50;
const MIN_FILLERS_WITHOUT_TYPE: usize = 5;

/// Turns recognized text into a TD3 record.
#[derive(Debug, Clone, Copy, Default)]
pub struct MrzDecoder;

impl MrzDecoder {
    pub fn new() -> Self {
        MrzDecoder
    }

    pub fn decode(&self, raw: &RawText) -> Result<ParsedRecord, PassportError> {
        let lines = Self::select_lines(raw);
        match lines.as_slice() {
            [first, second, ..] => Ok(Self::parse_td3(first, second)),
            _ => Err(PassportError::DecodeFailure(format!(
                "found {} MRZ line(s) in {} text line(s), need 2",
                lines.len(),
                raw.lines().len()
            ))),
        }
    }

    pub fn decode_text(&self, text: &str) -> Result<ParsedRecord, PassportError> {
        self.decode(&RawText::from_text(text))
    }

    /// Normalized lines that pass the MRZ filter, in recognition order.
    pub fn select_lines(raw: &RawText) -> Vec<String> {
        let selected: Vec<String> = raw
            .lines()
            .iter()
            .map(|line| FieldCorrection::normalize_line(line))
            .filter(|line| !line.is_empty())
            .filter(|line| Self::is_mrz_candidate(line))
            .collect();
        debug!("{} candidate MRZ line(s): {:?}", selected.len(), selected);
        selected
    }

    pub fn is_mrz_candidate(line: &str) -> bool {
        let len = line.chars().count();
        if !(MIN_LINE_LENGTH..=MAX_LINE_LENGTH).contains(&len) || !line.contains(FILLER) {
            return false;
        }

        let clean = line
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == FILLER)
            .count();
        if clean * 10 < len * 9 {
            return false;
        }

        let typed = line
            .chars()
            .next()
            .map_or(false, |c| DOCUMENT_TYPES.contains(&c));
        typed || line.matches(FILLER).count() >= MIN_FILLERS_WITHOUT_TYPE
    }

    /// Fixed-width extraction from a TD3 line pair.
    pub fn parse_td3(line1: &str, line2: &str) -> ParsedRecord {
        let l1 = FieldCorrection::fit_line(line1);
        let l2 = FieldCorrection::fit_line(line2);

        let document_type = stripped(&l1, 0..1);
        let issuing_country = FieldCorrection::correct_country_code(&stripped(&l1, 2..5));
        let (surname, given_names) = split_name(&field(&l1, 5..44));

        let passport_number = stripped(&l2, 0..9);
        let nationality = FieldCorrection::correct_country_code(&stripped(&l2, 10..13));
        let date_of_birth = parse_mrz_date(&field(&l2, 13..19));
        let sex = Sex::from_mrz(l2[20]);
        let date_of_expiry = parse_mrz_date(&field(&l2, 21..27));
        let personal_number = Some(stripped(&l2, 28..42)).filter(|p| !p.is_empty());

        let composite = format!(
            "{}{}{}",
            field(&l2, 0..10),
            field(&l2, 13..20),
            field(&l2, 21..43)
        );
        let check_digits = CheckDigitResults {
            passport_number: verify_check_digit(&field(&l2, 0..9), l2[9]),
            date_of_birth: verify_check_digit(&field(&l2, 13..19), l2[19]),
            date_of_expiry: verify_check_digit(&field(&l2, 21..27), l2[27]),
            personal_number: personal_number.is_none()
                || verify_check_digit(&field(&l2, 28..42), l2[42]),
            composite: verify_check_digit(&composite, l2[43]),
        };
        debug!("check digits: {:?}", check_digits);

        ParsedRecord {
            document_type,
            issuing_country,
            surname,
            given_names,
            passport_number,
            nationality,
            date_of_birth,
            sex,
            date_of_expiry,
            personal_number,
            checksum_valid: check_digits.all_valid(),
            check_digits,
            mrz_lines: vec![l1.iter().collect(), l2.iter().collect()],
        }
    }
}

fn field(line: &[char], cols: Range<usize>) -> String {
    line[cols].iter().collect()
}

fn stripped(line: &[char], cols: Range<usize>) -> String {
    field(line, cols).replace(FILLER, "")
}

// SURNAME<<GIVEN<NAMES<<<: single fillers separate words, the first double filler the parts
fn split_name(field: &str) -> (String, String) {
    let names = field.trim_end_matches(FILLER);
    let mut parts = names.split("<<");
    let words = |part: Option<&str>| {
        part.unwrap_or_default()
            .replace(FILLER, " ")
            .trim()
            .to_string()
    };
    let surname = words(parts.next());
    let given_names = words(parts.next());
    (surname, given_names)
}

/// YYMMDD with a sliding century: 00-49 is 20xx, 50-99 is 19xx.
pub fn parse_mrz_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let yy: i32 = value[0..2].parse().ok()?;
    let month: u32 = value[2..4].parse().ok()?;
    let day: u32 = value[4..6].parse().ok()?;
    let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECIMEN: &str = "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<\n\
                            L898902C36UTO7408122F1204159ZE184226B<<<<<10";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_decodes_icao_specimen() {
        let record = MrzDecoder::new().decode_text(SPECIMEN).unwrap();

        assert_eq!(record.document_type, "P");
        assert_eq!(record.issuing_country, "UTO");
        assert_eq!(record.surname, "ERIKSSON");
        assert_eq!(record.given_names, "ANNA MARIA");
        assert_eq!(record.full_name(), "ANNA MARIA ERIKSSON");
        assert_eq!(record.passport_number, "L898902C3");
        assert_eq!(record.nationality, "UTO");
        assert_eq!(record.date_of_birth, Some(date(1974, 8, 12)));
        assert_eq!(record.sex, Sex::Female);
        assert_eq!(record.date_of_expiry, Some(date(2012, 4, 15)));
        assert_eq!(record.personal_number.as_deref(), Some("ZE184226B"));
        assert!(record.check_digits.all_valid());
        assert!(record.checksum_valid);
        assert_eq!(record.mrz_lines.len(), 2);
        assert!(record.mrz_lines.iter().all(|l| l.len() == 44));
    }

    #[test]
    fn test_decodes_fixed_width_fields() {
        let text = "P<GBRJENNINGS<<PAUL<MICHAEL<<<<<<<<<<<<<<<<<\n\
                    0123456784GBR8411025M08100504<<<<<<<<<<<<<<02";
        let record = MrzDecoder::new().decode_text(text).unwrap();

        assert_eq!(record.document_type, "P");
        assert_eq!(record.issuing_country, "GBR");
        assert_eq!(record.surname, "JENNINGS");
        assert_eq!(record.given_names, "PAUL MICHAEL");
        assert_eq!(record.passport_number, "012345678");
        assert_eq!(record.nationality, "GBR");
        assert_eq!(record.date_of_birth, Some(date(1984, 11, 2)));
        assert_eq!(record.sex, Sex::Male);
        assert_eq!(record.date_of_expiry, Some(date(2008, 10, 5)));
        assert!(record.check_digits.passport_number);
        assert!(!record.check_digits.date_of_birth);
        assert!(record.check_digits.date_of_expiry);
        assert!(!record.checksum_valid);
    }

    #[test]
    fn test_normalizes_noisy_recognizer_output() {
        let text = "REPUBLIC OF UTOPIA\n\n\
                    p<uto ERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<\n\
                    L898902C36UTO7408122F1204159ZE184226B-----10\n";
        let record = MrzDecoder::new().decode_text(text).unwrap();

        assert_eq!(record.surname, "ERIKSSON");
        assert_eq!(record.personal_number.as_deref(), Some("ZE184226B"));
        assert!(record.checksum_valid);
    }

    #[test]
    fn test_short_lines_fail() {
        let text = "P<UTOERIKSSON<<ANNA<MARIA\nL898902C36UTO7408122F12";
        let err = MrzDecoder::new().decode_text(text).unwrap_err();
        assert!(matches!(err, PassportError::DecodeFailure(_)));
    }

    #[test]
    fn test_single_line_fails() {
        let err = MrzDecoder::new()
            .decode_text("P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<")
            .unwrap_err();
        assert!(matches!(err, PassportError::DecodeFailure(_)));
    }

    #[test]
    fn test_candidate_filter() {
        assert!(MrzDecoder::is_mrz_candidate("P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<"));
        assert!(MrzDecoder::is_mrz_candidate("L898902C36UTO7408122F1204159ZE184226B<<<<<10"));
        // no filler
        assert!(!MrzDecoder::is_mrz_candidate("L898902C36UTO7408122F1204159ZE184226B9999910"));
        // too noisy
        assert!(!MrzDecoder::is_mrz_candidate("P<UTO.,;:!?ERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<"));
        // neither a type letter nor enough fillers
        assert!(!MrzDecoder::is_mrz_candidate("1898902C36UTO7408122F1204159ZE184226B9<<<10"));
    }

    #[test]
    fn test_corrects_country_codes() {
        let text = "P<1NDSHARMA<<PRIYA<<<<<<<<<<<<<<<<<<<<<<<<<<\n\
                    AB2134<<<51ND9005156F4506016K1234<<<<<<<<<86";
        let record = MrzDecoder::new().decode_text(text).unwrap();

        assert_eq!(record.issuing_country, "IND");
        assert_eq!(record.nationality, "IND");
        assert_eq!(record.passport_number, "AB2134");
        assert_eq!(record.personal_number.as_deref(), Some("K1234"));
        assert!(record.check_digits.passport_number);
        assert!(record.check_digits.personal_number);
    }

    #[test]
    fn test_empty_personal_number_passes() {
        let text = "P<GBRSMITH<<JOHN<<<<<<<<<<<<<<<<<<<<<<<<<<<<\n\
                    X123456785GBR8401027M4912310<<<<<<<<<<<<<<<2";
        let record = MrzDecoder::new().decode_text(text).unwrap();

        assert_eq!(record.personal_number, None);
        assert!(record.check_digits.personal_number);
        assert!(record.checksum_valid);
        assert_eq!(record.date_of_expiry, Some(date(2049, 12, 31)));
    }

    #[test]
    fn test_corrupted_check_digit_fails_only_that_check() {
        let text = "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<\n\
                    L898902C37UTO7408122F1204159ZE184226B<<<<<10";
        let record = MrzDecoder::new().decode_text(text).unwrap();

        assert!(!record.check_digits.passport_number);
        assert!(record.check_digits.date_of_birth);
        assert!(!record.check_digits.composite);
        assert!(!record.checksum_valid);
    }

    #[test]
    fn test_unknown_sex_becomes_unspecified() {
        let text = "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<\n\
                    L898902C36UTO7408122<1204159ZE184226B<<<<<10";
        let record = MrzDecoder::new().decode_text(text).unwrap();
        assert_eq!(record.sex, Sex::Unspecified);
    }

    #[test]
    fn test_parse_mrz_date() {
        assert_eq!(parse_mrz_date("840102"), Some(date(1984, 1, 2)));
        assert_eq!(parse_mrz_date("201231"), Some(date(2020, 12, 31)));
        assert_eq!(parse_mrz_date("000101"), Some(date(2000, 1, 1)));
        assert_eq!(parse_mrz_date("500101"), Some(date(1950, 1, 1)));
        assert_eq!(parse_mrz_date("991340"), None);
        assert_eq!(parse_mrz_date("990230"), None);
        assert_eq!(parse_mrz_date("abc123"), None);
        assert_eq!(parse_mrz_date("84010"), None);
        assert_eq!(parse_mrz_date("<<<<<<"), None);
    }

    #[test]
    fn test_split_name() {
        assert_eq!(
            split_name("DE<LA<CRUZ<<MARIA<JOSE<<<<<<"),
            ("DE LA CRUZ".to_string(), "MARIA JOSE".to_string())
        );
        assert_eq!(split_name("MADONNA<<<<<<<"), ("MADONNA".to_string(), String::new()));
    }
}
