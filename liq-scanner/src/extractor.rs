//! Guide code extraction from raw scanner text
//!
//! Scanners emit either the bare guide code or a longer encoded barcode that
//! embeds it. Everything that is not an ASCII digit is dropped first, then
//! the length of the remaining digit string picks the decoding rule:
//!
//! | digits | guide code |
//! |---|---|
//! | 15 | `digits[1..12]` |
//! | 32 | `digits[18..29]` |
//! | other | the digit string itself |

/// Length of the short encoded barcode form
const SHORT_FORM_LEN: usize = 15;
const SHORT_FORM_RANGE: std::ops::Range<usize> = 1..12;

/// Length of the long encoded barcode form
const LONG_FORM_LEN: usize = 32;
const LONG_FORM_RANGE: std::ops::Range<usize> = 18..29;

/// Result of normalizing one raw scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Canonical guide code; empty when the input held no digits
    pub guide_code: String,
    /// Raw input with surrounding whitespace trimmed
    pub original_text: String,
    /// Number of digits found in the raw input
    pub source_digit_length: usize,
}

impl Extraction {
    /// True when no match should be attempted
    pub fn is_empty(&self) -> bool {
        self.guide_code.is_empty()
    }

    /// True when the code was cut out of a longer encoded form
    pub fn was_decoded(&self) -> bool {
        matches!(self.source_digit_length, SHORT_FORM_LEN | LONG_FORM_LEN)
    }
}

/// Normalize raw scanner text into a guide code
///
/// Never fails: malformed input degrades to passing the digits through, and
/// input without digits yields an empty code.
pub fn extract(raw: &str) -> Extraction {
    let original_text = raw.trim().to_string();
    let digits: String = original_text.chars().filter(|c| c.is_ascii_digit()).collect();

    // Digits are ASCII so byte ranges are char ranges
    let guide_code = match digits.len() {
        SHORT_FORM_LEN => digits[SHORT_FORM_RANGE].to_string(),
        LONG_FORM_LEN => digits[LONG_FORM_RANGE].to_string(),
        _ => digits.clone(),
    };

    Extraction {
        guide_code,
        original_text,
        source_digit_length: digits.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_code_passes_through() {
        let e = extract("12345678901");
        assert_eq!(e.guide_code, "12345678901");
        assert_eq!(e.source_digit_length, 11);
        assert!(!e.was_decoded());
    }

    #[test]
    fn test_fifteen_digit_form_drops_prefix_and_tail() {
        let e = extract("912345678901777");
        assert_eq!(e.guide_code, "12345678901");
        assert_eq!(e.source_digit_length, 15);
        assert!(e.was_decoded());
    }

    #[test]
    fn test_thirty_two_digit_form_takes_fixed_window() {
        let raw = format!("{}{}{}", "0".repeat(18), "98765432109", "555");
        assert_eq!(raw.len(), 32);
        let e = extract(&raw);
        assert_eq!(e.guide_code, "98765432109");
        assert_eq!(e.source_digit_length, 32);
    }

    #[test]
    fn test_non_digits_are_stripped_before_length_check() {
        // 15 digits once separators are removed
        let e = extract(" 9-1234-5678901-777 ");
        assert_eq!(e.guide_code, "12345678901");
        assert_eq!(e.original_text, "9-1234-5678901-777");
    }

    #[test]
    fn test_other_lengths_use_digits_verbatim() {
        let e = extract("012345678901X");
        assert_eq!(e.guide_code, "012345678901");
        assert_eq!(e.source_digit_length, 12);
    }

    #[test]
    fn test_no_digits_yields_empty_code() {
        let e = extract("  ABC-xyz ");
        assert!(e.is_empty());
        assert_eq!(e.source_digit_length, 0);

        assert!(extract("").is_empty());
    }

    #[test]
    fn test_non_ascii_digits_ignored() {
        // Arabic-Indic digits are not scanner output
        let e = extract("١٢٣12345678901");
        assert_eq!(e.guide_code, "12345678901");
    }

    #[test]
    fn test_every_fifteen_digit_input_uses_positions_one_to_twelve() {
        for seed in 0..50u64 {
            let digits: String = (0..15)
                .map(|i| char::from(b'0' + ((seed * 7 + i * 3) % 10) as u8))
                .collect();
            let e = extract(&format!("#{}#", digits));
            assert_eq!(e.guide_code, &digits[1..12]);
        }
    }

    #[test]
    fn test_every_thirty_two_digit_input_uses_positions_eighteen_to_twenty_nine() {
        for seed in 0..50u64 {
            let digits: String = (0..32)
                .map(|i| char::from(b'0' + ((seed * 5 + i * 7) % 10) as u8))
                .collect();
            let e = extract(&digits);
            assert_eq!(e.guide_code, &digits[18..29]);
        }
    }
}
