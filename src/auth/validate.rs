use crate::error::{ApiError, ApiResult};

/// Deliberately permissive shape check: one `@`, a non-empty local part and
/// a dotted domain, no whitespace. Deliverability is the mail relay's
/// problem.
pub fn validate_email(email: &str) -> ApiResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    };
    if !valid {
        return Err(ApiError::Validation(format!("E-mail '{email}' is not valid")));
    }
    Ok(())
}

pub fn validate_length(string: &str, min: usize, max: usize, message: &str) -> ApiResult<()> {
    let length = string.chars().count();
    if length < min || length > max {
        return Err(ApiError::Validation(message.to_owned()));
    }
    Ok(())
}

pub fn validate_password_length(password: &str, min_length: usize) -> ApiResult<()> {
    if password.chars().count() < min_length {
        return Err(ApiError::Validation("Password is too short".to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(validate_email("user@gmail.com").is_ok());
        assert!(validate_email("first.last@mail.example.org").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        for email in [
            "",
            "user",
            "user@",
            "@gmail.com",
            "user-gmail.com",
            "user@gmail",
            "user@.com",
            "user@gmail.com.",
            "us er@gmail.com",
            "user@gma@il.com",
        ] {
            assert!(validate_email(email).is_err(), "accepted: {email}");
        }
    }

    #[test]
    fn length_bounds_are_inclusive() {
        assert!(validate_length("abc", 3, 25, "bad").is_ok());
        assert!(validate_length("ab", 3, 25, "bad").is_err());
        assert!(validate_length(&"a".repeat(25), 3, 25, "bad").is_ok());
        assert!(validate_length(&"a".repeat(26), 3, 25, "bad").is_err());
    }

    #[test]
    fn password_minimum() {
        assert!(validate_password_length("12345678", 8).is_ok());
        assert!(validate_password_length("1234567", 8).is_err());
    }
}
