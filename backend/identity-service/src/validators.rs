use once_cell::sync::Lazy;
use regex::Regex;

/// Input validation utilities for the identity core

// Compile regex patterns once at startup
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    // This regex is hardcoded and validated - it is a compile-time constant in practice
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("hardcoded email regex is invalid - fix source code")
});

// E.164: leading +, 7 to 15 digits
static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+[0-9]{7,15}$").expect("hardcoded phone regex is invalid - fix source code")
});

/// Validate email format (RFC 5322 simplified)
pub fn validate_email(email: &str) -> bool {
    !email.is_empty() && email.len() <= 254 && EMAIL_REGEX.is_match(email)
}

/// Validate E.164 phone number format
pub fn validate_phone(phone: &str) -> bool {
    PHONE_REGEX.is_match(phone)
}

/// Validate password composition
/// - Minimum 6 characters
/// - At least one uppercase letter
/// - At least one lowercase letter
/// - At least one digit
pub fn validate_password(password: &str) -> bool {
    if password.len() < 6 {
        return false;
    }

    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    has_uppercase && has_lowercase && has_digit
}

/// Validate PIN shape: 4-8 digits. A PIN is a password with relaxed
/// composition rules applied at creation time; verification is shared.
pub fn validate_pin(pin: &str) -> bool {
    (4..=8).contains(&pin.len()) && pin.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(validate_email("user@example.com"));
        assert!(validate_email("test.user+tag@sub.example.co.uk"));
    }

    #[test]
    fn test_invalid_email() {
        assert!(!validate_email(""));
        assert!(!validate_email("not-an-email"));
        assert!(!validate_email("missing@tld"));
    }

    #[test]
    fn test_valid_phone() {
        assert!(validate_phone("+15551234567"));
        assert!(validate_phone("+442071838750"));
    }

    #[test]
    fn test_invalid_phone() {
        assert!(!validate_phone("15551234567"));
        assert!(!validate_phone("+1"));
        assert!(!validate_phone("+1555123456789012345"));
        assert!(!validate_phone("+1555 123456"));
    }

    #[test]
    fn test_password_composition() {
        assert!(validate_password("Temp123"));
        assert!(!validate_password("short"));
        assert!(!validate_password("alllowercase1"));
        assert!(!validate_password("ALLUPPERCASE1"));
        assert!(!validate_password("NoDigitsHere"));
    }

    #[test]
    fn test_pin_shape() {
        assert!(validate_pin("1234"));
        assert!(validate_pin("12345678"));
        assert!(!validate_pin("123"));
        assert!(!validate_pin("123456789"));
        assert!(!validate_pin("12a4"));
    }
}
