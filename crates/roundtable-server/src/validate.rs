//! Input validation for the REST surface.
//!
//! Each function returns `None` when the input is acceptable and the
//! rejection message otherwise, so handlers can forward the message as
//! a 400 body.

use once_cell::sync::Lazy;
use regex::Regex;

pub const EMAIL_MAX_LEN: usize = 256;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;
pub const DISPLAY_NAME_MAX_LEN: usize = 64;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("valid email regex")
});

/// Join codes use the confusable-free uppercase alphabet only.
static ROOM_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-HJ-NP-Z2-9]{6}$").expect("valid code regex"));

/// Checks an already-lowercased, trimmed email.
pub fn validate_email(email: &str) -> Option<String> {
    if email.is_empty() {
        return Some("email is required".to_string());
    }
    if email.len() > EMAIL_MAX_LEN {
        return Some(format!("email must be at most {EMAIL_MAX_LEN} characters"));
    }
    if !EMAIL_RE.is_match(email) {
        return Some("invalid email format".to_string());
    }
    None
}

pub fn validate_registration_password(password: &str) -> Option<String> {
    if password.len() < PASSWORD_MIN_LEN {
        return Some(format!(
            "password must be at least {PASSWORD_MIN_LEN} characters"
        ));
    }
    if password.len() > PASSWORD_MAX_LEN {
        return Some(format!(
            "password must be at most {PASSWORD_MAX_LEN} characters"
        ));
    }
    None
}

/// Room passwords are optional; only the upper bound applies.
pub fn validate_room_password(password: &str) -> Option<String> {
    if password.len() > PASSWORD_MAX_LEN {
        return Some(format!(
            "password must be at most {PASSWORD_MAX_LEN} characters"
        ));
    }
    None
}

pub fn validate_display_name(display_name: &str) -> Option<String> {
    let trimmed = display_name.trim();
    if trimmed.is_empty() {
        return Some("display_name is required".to_string());
    }
    if trimmed.chars().count() > DISPLAY_NAME_MAX_LEN {
        return Some(format!(
            "display_name must be at most {DISPLAY_NAME_MAX_LEN} characters"
        ));
    }
    None
}

pub fn valid_room_code(code: &str) -> bool {
    ROOM_CODE_RE.is_match(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email_accepts_common_shapes() {
        for email in ["a@b.io", "user.name+tag@example.co.uk", "x_1%@d.org"] {
            assert!(validate_email(email).is_none(), "{email} should pass");
        }
    }

    #[test]
    fn test_validate_email_rejects_bad_input() {
        assert!(validate_email("").is_some());
        assert!(validate_email("not-an-email").is_some());
        assert!(validate_email("missing@tld").is_some());
        assert!(validate_email("@example.com").is_some());

        let oversized = format!("{}@example.com", "a".repeat(EMAIL_MAX_LEN));
        assert!(validate_email(&oversized).is_some());
    }

    #[test]
    fn test_validate_registration_password_bounds() {
        assert!(validate_registration_password("short").is_some());
        assert!(validate_registration_password("exactly8").is_none());
        assert!(validate_registration_password(&"x".repeat(128)).is_none());
        assert!(validate_registration_password(&"x".repeat(129)).is_some());
    }

    #[test]
    fn test_validate_display_name_trims_and_bounds() {
        assert!(validate_display_name("  ").is_some());
        assert!(validate_display_name("Merlin").is_none());
        assert!(validate_display_name(&"n".repeat(64)).is_none());
        assert!(validate_display_name(&"n".repeat(65)).is_some());
    }

    #[test]
    fn test_valid_room_code_enforces_alphabet() {
        assert!(valid_room_code("ABC234"));
        assert!(valid_room_code("ZZZZZZ"));
        // Confusables and wrong lengths are out.
        assert!(!valid_room_code("ABC12O"));
        assert!(!valid_room_code("abc234"));
        assert!(!valid_room_code("ABCD1I"));
        assert!(!valid_room_code("ABC23"));
        assert!(!valid_room_code("ABC2345"));
    }
}
