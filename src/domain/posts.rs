//! Post and comment field rules.

use crate::domain::error::DomainError;

/// Number of characters a post shows when rendered as a label.
pub const SHORT_TEXT_CHARS: usize = 15;

/// Upper bound for a comment body, in characters.
pub const COMMENT_MAX_CHARS: usize = 200;

/// Leading characters of a post body, cut on a char boundary.
pub fn short_text(text: &str) -> &str {
    match text.char_indices().nth(SHORT_TEXT_CHARS) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Normalise and validate a post body.
pub fn validate_post_text(text: &str) -> Result<String, DomainError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("text", "This field is required."));
    }
    Ok(trimmed.to_string())
}

/// Normalise and validate a comment body.
pub fn validate_comment_text(text: &str) -> Result<String, DomainError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("text", "This field is required."));
    }

    let length = trimmed.chars().count();
    if length > COMMENT_MAX_CHARS {
        return Err(DomainError::validation(
            "text",
            format!(
                "Ensure this value has at most {COMMENT_MAX_CHARS} characters (it has {length})."
            ),
        ));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_cuts_on_char_boundary() {
        assert_eq!(short_text("Привет, это длинный пост"), "Привет, это дли");
        assert_eq!(short_text("short"), "short");
    }

    #[test]
    fn blank_post_text_is_rejected() {
        assert!(validate_post_text("   \n").is_err());
        assert_eq!(validate_post_text("  hello ").expect("valid"), "hello");
    }

    #[test]
    fn comment_length_is_bounded() {
        let exact = "a".repeat(COMMENT_MAX_CHARS);
        assert!(validate_comment_text(&exact).is_ok());

        let long = "a".repeat(COMMENT_MAX_CHARS + 1);
        match validate_comment_text(&long) {
            Err(DomainError::Validation { field, .. }) => assert_eq!(field, "text"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
