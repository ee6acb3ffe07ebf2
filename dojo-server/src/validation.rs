/// Input normalisation and validation shared by the account handlers
use once_cell::sync::Lazy;
use regex::Regex;

/// Loose e-mail shape check: something@domain.tld, no whitespace
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Failed to compile email regex")
});

/// Longest reason accepted on a graduation date-change request
pub const DATE_CHANGE_REASON_MAX: usize = 50;

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email.trim())
}

/// Normalise a Brazilian WhatsApp number.
///
/// Keeps only the digits; 11 digits become `(DD) DDDDD-DDDD`, 10 digits
/// become `(DD) DDDD-DDDD`, anything else is returned as bare digits.
pub fn format_whatsapp(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        11 => format!("({}) {}-{}", &digits[..2], &digits[2..7], &digits[7..]),
        10 => format!("({}) {}-{}", &digits[..2], &digits[2..6], &digits[6..]),
        _ => digits,
    }
}

/// Trimmed value, or `None` when blank
pub fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_format_whatsapp() {
        assert_eq!(format_whatsapp("11987654321"), "(11) 98765-4321");
        assert_eq!(format_whatsapp("(11) 3456-7890"), "(11) 3456-7890");
        assert_eq!(format_whatsapp("+55 11 98765 4321"), "5511987654321");
        assert_eq!(format_whatsapp("abc"), "");
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("ana@dojo.com"));
        assert!(is_valid_email("  ana.lima+bjj@dojo.com.br "));
        assert!(!is_valid_email("ana@dojo"));
        assert!(!is_valid_email("ana dojo@x.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank("  x "), Some("x"));
        assert_eq!(non_blank("   "), None);
    }

    proptest! {
        #[test]
        fn prop_formatted_number_keeps_digits(digits in "[0-9]{10,11}") {
            let formatted = format_whatsapp(&digits);
            let back: String = formatted.chars().filter(|c| c.is_ascii_digit()).collect();
            prop_assert_eq!(back, digits);
            prop_assert!(formatted.starts_with('('));
        }

        #[test]
        fn prop_formatting_is_idempotent(raw in "\\PC{0,20}") {
            let once = format_whatsapp(&raw);
            prop_assert_eq!(format_whatsapp(&once), once);
        }
    }
}
