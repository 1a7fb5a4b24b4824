//! Post-level invariants.

use super::error::DomainError;

/// Longest prefix of a post shown wherever a post is named in one line.
pub const TITLE_PREVIEW_CHARS: usize = 15;

/// Validate the body of a new post, returning the text to store.
pub fn validate_post_text(text: &str) -> Result<String, DomainError> {
    if text.trim().is_empty() {
        return Err(DomainError::validation("post text must not be empty"));
    }
    Ok(text.to_string())
}

/// Short single-line preview used in logs and page titles.
pub fn title_preview(text: &str) -> String {
    text.chars().take(TITLE_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_rejected() {
        let err = validate_post_text("   \n").expect_err("blank text rejected");
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn text_is_kept_verbatim() {
        let text = validate_post_text("  hello  ").expect("valid text");
        assert_eq!(text, "  hello  ");
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        assert_eq!(title_preview("Текст поста: автор 1"), "Текст поста: ав");
        assert_eq!(title_preview("short"), "short");
    }
}
