//! Input checks for each conversation stage.

use std::sync::LazyLock;

use regex::Regex;

static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\-'a-zA-Z ]+$").unwrap());
static YES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^yes\b").unwrap());
static NO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^no\b").unwrap());

/// Reply to the display-name confirmation question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityReply {
    /// Confirms the proposed display name.
    Confirm,
    /// Rejects it; the applicant should type their name.
    Decline,
    /// Typed a name directly.
    Name(String),
    Unrecognized,
}

/// Letters, spaces, hyphens and apostrophes only.
pub fn is_name(text: &str) -> bool {
    NAME.is_match(text)
}

pub fn classify_identity(text: &str) -> IdentityReply {
    let text = text.trim();
    if NO.is_match(text) {
        IdentityReply::Decline
    } else if YES.is_match(text) {
        IdentityReply::Confirm
    } else if is_name(text) {
        IdentityReply::Name(text.to_string())
    } else {
        IdentityReply::Unrecognized
    }
}

/// ASCII digits only, surrounding whitespace ignored. Overflow is rejected.
pub fn parse_numeric(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// A positive whole amount. Zero cannot be priced.
pub fn parse_loan_amount(text: &str) -> Option<u64> {
    parse_numeric(text).filter(|amount| *amount > 0)
}

/// Age strictly between 0 and 130.
pub fn parse_age(text: &str) -> Option<u8> {
    parse_numeric(text)
        .filter(|age| *age > 0 && *age < 130)
        .and_then(|age| u8::try_from(age).ok())
}

/// A single attachment with a ".pdf" name.
pub fn is_pdf_name(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(".pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_shape() {
        assert!(is_name("Jo-Ann O'Brien"));
        assert!(is_name("Ada Lovelace"));
        assert!(!is_name("Jo123"));
        assert!(!is_name("J0hn$"));
        assert!(!is_name(""));
    }

    #[test]
    fn identity_replies() {
        assert_eq!(classify_identity("Yes"), IdentityReply::Confirm);
        assert_eq!(classify_identity("yes, that's me"), IdentityReply::Confirm);
        assert_eq!(classify_identity("No"), IdentityReply::Decline);
        assert_eq!(classify_identity("no thanks"), IdentityReply::Decline);
        assert_eq!(
            classify_identity("Nora Smith"),
            IdentityReply::Name("Nora Smith".into())
        );
        assert_eq!(
            classify_identity("Yesenia"),
            IdentityReply::Name("Yesenia".into())
        );
        assert_eq!(classify_identity("42!"), IdentityReply::Unrecognized);
    }

    #[test]
    fn loan_amount_is_digits_only() {
        assert_eq!(parse_loan_amount("45"), Some(45));
        assert_eq!(parse_loan_amount(" 1000 "), Some(1000));
        assert_eq!(parse_loan_amount("abc"), None);
        assert_eq!(parse_loan_amount("$100"), None);
        assert_eq!(parse_loan_amount("1,000"), None);
        assert_eq!(parse_loan_amount("-5"), None);
        assert_eq!(parse_loan_amount("0"), None);
        assert_eq!(parse_loan_amount("000"), None);
        assert_eq!(parse_loan_amount("99999999999999999999999"), None);
    }

    #[test]
    fn age_bounds_are_exclusive() {
        assert_eq!(parse_age("45"), Some(45));
        assert_eq!(parse_age("129"), Some(129));
        assert_eq!(parse_age("0"), None);
        assert_eq!(parse_age("130"), None);
        assert_eq!(parse_age("abc"), None);
    }

    #[test]
    fn pdf_names() {
        assert!(is_pdf_name("application.pdf"));
        assert!(is_pdf_name("APPLICATION.PDF"));
        assert!(!is_pdf_name("application.docx"));
    }
}
