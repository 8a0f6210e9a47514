use validator::ValidationError;

/// Canonical form used for every email lookup and for storage
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// An address needs an `@` and a `.` somewhere after the last `@`
pub fn is_valid_email(email: &str) -> bool {
    match email.rsplit_once('@') {
        Some((_, domain)) => domain.contains('.'),
        None => false,
    }
}

/// Validates the email shape after normalization
pub fn validate_email_shape(email: &str) -> Result<(), ValidationError> {
    if is_valid_email(&normalize_email(email)) {
        return Ok(());
    }
    let mut error = ValidationError::new("invalid_email");
    error.message = Some(format!("'{}' is not a valid email address", email.trim()).into());
    Err(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("User@Example.COM"), "user@example.com");
        assert_eq!(normalize_email("  test@test.com  "), "test@test.com");
        assert_eq!(normalize_email(""), "");
    }

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("test.user@sub.example.com"));
        assert!(validate_email_shape(" A@B.com ").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email("noatsign.com"));
        assert!(!is_valid_email("user@nodomain"));
        assert!(!is_valid_email("dotted.name@nodomain"));
        assert!(!is_valid_email(""));
        assert!(validate_email_shape("user@nodomain").is_err());
    }
}
