/// Maximum excerpt length in characters.
const EXCERPT_CHARS: usize = 200;

/// Derive a post excerpt from its content: the first 200 characters, with a
/// trailing ellipsis when the content is longer. Recomputed on every content
/// change, never edited directly.
pub fn derive(content: &str) -> String {
    let mut chars = content.char_indices();
    match chars.nth(EXCERPT_CHARS) {
        // Content fits entirely.
        None => content.to_string(),
        Some((byte_end, _)) => {
            let mut excerpt = content[..byte_end].to_string();
            excerpt.push_str("...");
            excerpt
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_unchanged() {
        let content = "a".repeat(50);
        assert_eq!(derive(&content), content);
    }

    #[test]
    fn exactly_200_chars_is_unchanged() {
        let content = "b".repeat(200);
        assert_eq!(derive(&content), content);
    }

    #[test]
    fn long_content_is_truncated_with_ellipsis() {
        let content = "c".repeat(250);
        let excerpt = derive(&content);
        assert_eq!(excerpt.len(), 203);
        assert_eq!(&excerpt[..200], &content[..200]);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        // 201 multibyte characters: must truncate to 200 chars cleanly
        let content = "é".repeat(201);
        let excerpt = derive(&content);
        assert_eq!(excerpt.chars().count(), 203);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn empty_content_stays_empty() {
        assert_eq!(derive(""), "");
    }
}
