//! Path-safe name sanitization.
//!
//! Panel assets and display directories are named after user data, so every
//! name that lands on disk goes through [`sanitize`] first.

/// Name used when sanitization leaves nothing behind.
const EMPTY_NAME: &str = "empty";

/// Lower-case a name and replace every non-alphanumeric character with `_`.
///
/// # Examples
///
/// ```
/// use trellis_common::sanitize;
///
/// assert_eq!(sanitize("Life Exp"), "life_exp");
/// assert_eq!(sanitize("a/b.c"), "a_b_c");
/// assert_eq!(sanitize(""), "empty");
/// ```
pub fn sanitize(raw: &str) -> String {
    let safe: String = raw
        .chars()
        .flat_map(char::to_lowercase)
        .map(|ch| if ch.is_alphanumeric() { ch } else { '_' })
        .collect();
    if safe.is_empty() {
        EMPTY_NAME.to_string()
    } else {
        safe
    }
}

/// Build a file stem from a row's key values.
///
/// Each value is sanitized on its own, then the parts are joined with `_`.
///
/// # Examples
///
/// ```
/// use trellis_common::sanitize_key;
///
/// assert_eq!(sanitize_key(&["Belgium", "Europe"]), "belgium_europe");
/// assert_eq!(sanitize_key(&["A B"]), sanitize_key(&["a_b"]));
/// ```
pub fn sanitize_key<S: AsRef<str>>(parts: &[S]) -> String {
    if parts.is_empty() {
        return EMPTY_NAME.to_string();
    }
    parts
        .iter()
        .map(|part| sanitize(part.as_ref()))
        .collect::<Vec<_>>()
        .join("_")
}

/// Lower-cased file extension of a path or URL, ignoring any query string
/// or fragment.
///
/// # Examples
///
/// ```
/// use trellis_common::extension_of;
///
/// assert_eq!(extension_of("plots/a.PNG").as_deref(), Some("png"));
/// assert_eq!(extension_of("https://x.org/a.svg?v=2").as_deref(), Some("svg"));
/// assert_eq!(extension_of("README"), None);
/// ```
pub fn extension_of(reference: &str) -> Option<String> {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_unicode_letters() {
        assert_eq!(sanitize("Côte d'Ivoire"), "côte_d_ivoire");
    }

    #[test]
    fn test_replaces_each_character() {
        assert_eq!(sanitize("a  b"), "a__b");
        assert_eq!(sanitize("x-1"), "x_1");
    }

    #[test]
    fn test_never_emits_hyphens() {
        assert_eq!(sanitize("missing-panel"), "missing_panel");
        assert!(!sanitize_key(&["a-b", "--"]).contains('-'));
    }

    #[test]
    fn test_key_of_no_parts_is_stable() {
        let empty: [&str; 0] = [];
        assert_eq!(sanitize_key(&empty), "empty");
    }

    #[test]
    fn test_key_parts_are_joined() {
        assert_eq!(sanitize_key(&["Asia", "2007"]), "asia_2007");
    }
}
