pub const FILLER: char = '<';
pub const TD3_LINE_LENGTH: usize = 44;

const DASHES: [char; 8] = ['-', '\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2015}', '\u{2212}'];

// Characters OCR engines commonly return for a trailing run of fillers
const FILLER_LOOKALIKES: [char; 2] = ['K', 'X'];

/// Repairs for characters OCR engines commonly get wrong in an MRZ.
pub struct FieldCorrection;

impl FieldCorrection {
    /// Remove whitespace, map dash-like characters to the filler, upper-case,
    /// and trim trailing filler look-alikes from short lines.
    pub fn normalize_line(line: &str) -> String {
        let cleaned: String = line
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| {
                if DASHES.contains(&c) {
                    FILLER
                } else {
                    c.to_ascii_uppercase()
                }
            })
            .collect();
        Self::trim_filler_artifacts(&cleaned)
    }

    pub fn trim_filler_artifacts(line: &str) -> String {
        if line.chars().count() < TD3_LINE_LENGTH {
            line.trim_end_matches(&FILLER_LOOKALIKES[..]).to_string()
        } else {
            line.to_string()
        }
    }

    /// Trim terminal artifacts, then pad with fillers or truncate to exactly one TD3 line.
    pub fn fit_line(line: &str) -> Vec<char> {
        let trimmed = Self::trim_filler_artifacts(line.trim_end());
        let mut chars: Vec<char> = trimmed.chars().take(TD3_LINE_LENGTH).collect();
        chars.resize(TD3_LINE_LENGTH, FILLER);
        chars
    }

    /// A three-letter code starting or ending in '1' almost always had an 'I' there.
    pub fn correct_country_code(code: &str) -> String {
        let mut chars: Vec<char> = code.chars().collect();
        if chars.len() == 3 {
            if chars[0] == '1' {
                chars[0] = 'I';
            }
            if chars[2] == '1' {
                chars[2] = 'I';
            }
        }
        chars.into_iter().collect()
    }
}
