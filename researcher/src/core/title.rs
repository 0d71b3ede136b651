//! Filename-safe report titles.

use std::sync::LazyLock;

use regex::Regex;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{Alphabetic}\p{N}\s-]").expect("valid title regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Strip everything but alphanumerics, whitespace and hyphens, then collapse
/// whitespace runs into single underscores.
///
/// Returns `None` when nothing filename-safe is left.
pub fn sanitize_title(title: &str) -> Option<String> {
    let stripped = UNSAFE_CHARS.replace_all(title, "");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), "_");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_joins_words() {
        assert_eq!(sanitize_title("A/B: Report?").as_deref(), Some("AB_Report"));
    }

    #[test]
    fn keeps_hyphens_and_collapses_runs() {
        assert_eq!(
            sanitize_title("  Rust \t vs\n\nGo - 2024  ").as_deref(),
            Some("Rust_vs_Go_-_2024")
        );
    }

    #[test]
    fn drops_underscores_and_keeps_unicode_letters() {
        assert_eq!(sanitize_title("über_alles").as_deref(), Some("überalles"));
    }

    #[test]
    fn punctuation_only_is_rejected() {
        assert_eq!(sanitize_title("?!/:*"), None);
        assert_eq!(sanitize_title("   "), None);
        assert_eq!(sanitize_title(""), None);
    }
}
