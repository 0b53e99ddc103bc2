//! Small text helpers shared by config and the remote clients.

/// Normalize optional text by trimming whitespace and dropping empties.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_drops_blank_values() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("  \t ".to_string())), None);
        assert_eq!(
            normalize_text_option(Some(" key-123 ".to_string())),
            Some("key-123".to_string())
        );
    }

    #[test]
    fn is_http_url_requires_scheme() {
        assert!(is_http_url("https://plume-demo.example.com"));
        assert!(is_http_url("http://localhost:9000"));
        assert!(!is_http_url("plume-demo.example.com"));
        assert!(!is_http_url("wss://plume-demo.example.com"));
    }

    #[test]
    fn compact_text_caps_length() {
        let long = "x".repeat(400);
        assert_eq!(compact_text(&long).chars().count(), 180);
    }
}
