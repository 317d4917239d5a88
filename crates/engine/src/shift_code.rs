//! Shift code normalization at the edit boundary.

/// Maximum length of a shift code, in characters.
pub const MAX_SHIFT_CODE_LEN: usize = 3;

/// Normalize user input into a shift code: trimmed, upper-cased, truncated
/// to [`MAX_SHIFT_CODE_LEN`] characters. Empty means "cleared".
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .flat_map(char::to_uppercase)
        .take(MAX_SHIFT_CODE_LEN)
        .collect()
}

/// Display form of a projected value.
pub fn display(value: &str) -> &str {
    if value.is_empty() { "(cleared)" } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_uppercases_and_truncates() {
        assert_eq!(normalize("m"), "M");
        assert_eq!(normalize(" lic "), "LIC");
        assert_eq!(normalize("noche"), "NOC");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_normalize_is_char_aware() {
        assert_eq!(normalize("ñañ"), "ÑAÑ");
        assert_eq!(normalize("ßx"), "SSX");
    }

    #[test]
    fn test_display_cleared() {
        assert_eq!(display(""), "(cleared)");
        assert_eq!(display("T"), "T");
    }
}
