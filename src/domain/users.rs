//! Account field rules.

use crate::domain::error::DomainError;

pub const USERNAME_MAX_CHARS: usize = 150;
pub const NAME_MAX_CHARS: usize = 150;
pub const PASSWORD_MIN_CHARS: usize = 8;

pub fn validate_username(username: &str) -> Result<String, DomainError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(
            "username",
            "This field is required.",
        ));
    }
    if trimmed.chars().count() > USERNAME_MAX_CHARS {
        return Err(DomainError::validation(
            "username",
            format!("Ensure this value has at most {USERNAME_MAX_CHARS} characters."),
        ));
    }
    if !trimmed
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(DomainError::validation(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_name(field: &'static str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.chars().count() > NAME_MAX_CHARS {
        return Err(DomainError::validation(
            field,
            format!("Ensure this value has at most {NAME_MAX_CHARS} characters."),
        ));
    }
    Ok(trimmed.to_string())
}

/// Email is optional; a present value needs a local part and a dotted domain.
pub fn validate_email(email: &str) -> Result<String, DomainError> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    let valid = match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if !valid {
        return Err(DomainError::validation(
            "email",
            "Enter a valid email address.",
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_new_password(
    field: &'static str,
    password: &str,
    confirmation: &str,
    username: &str,
) -> Result<(), DomainError> {
    if password != confirmation {
        return Err(DomainError::validation(
            field,
            "The two password fields didn't match.",
        ));
    }
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(DomainError::validation(
            field,
            format!(
                "This password is too short. It must contain at least {PASSWORD_MIN_CHARS} characters."
            ),
        ));
    }
    if password.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(DomainError::validation(
            field,
            "This password is entirely numeric.",
        ));
    }
    if !username.is_empty() && password.eq_ignore_ascii_case(username) {
        return Err(DomainError::validation(
            field,
            "The password is too similar to the username.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_allows_django_charset() {
        assert_eq!(validate_username(" leo.t+1@x_y-z ").expect("valid"), "leo.t+1@x_y-z");
        assert!(validate_username("with space").is_err());
        assert!(validate_username("").is_err());
    }

    #[test]
    fn email_is_optional_but_checked() {
        assert_eq!(validate_email("").expect("empty ok"), "");
        assert!(validate_email("reader@example.com").is_ok());
        assert!(validate_email("reader@localhost").is_err());
        assert!(validate_email("no-at-sign").is_err());
    }

    #[test]
    fn password_rules() {
        assert!(validate_new_password("password2", "s3cret-pass", "s3cret-pass", "leo").is_ok());
        assert!(validate_new_password("password2", "s3cret-pass", "other", "leo").is_err());
        assert!(validate_new_password("password2", "short", "short", "leo").is_err());
        assert!(validate_new_password("password2", "1234567890", "1234567890", "leo").is_err());
        assert!(validate_new_password("password2", "LeoTolstoy", "LeoTolstoy", "leotolstoy").is_err());
    }
}
