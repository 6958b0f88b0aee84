//! ICAO Doc 9303 check digits: weights 7, 3, 1 repeating, sum modulo 10.

const WEIGHTS: [u32; 3] = [7, 3, 1];

/// Numeric value of an MRZ character; the filler and anything unexpected count as 0.
pub fn char_value(c: char) -> u32 {
    match c {
        '0'..='9' => c as u32 - '0' as u32,
        'A'..='Z' => c as u32 - 'A' as u32 + 10,
        _ => 0,
    }
}

pub fn check_digit(data: &str) -> u32 {
    data.chars()
        .zip(WEIGHTS.iter().cycle())
        .map(|(c, weight)| char_value(c) * weight)
        .sum::<u32>()
        % 10
}

/// A check position holding anything but a digit never verifies.
pub fn verify_check_digit(data: &str, check: char) -> bool {
    check.to_digit(10) == Some(check_digit(data))
}
