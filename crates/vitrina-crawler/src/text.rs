//! Small string normalizers shared by the crawler and the extractors.

/// Maximum length of platform identifiers (SKU, product id, category id, unit, price type).
pub const SHORT_ID_LEN: usize = 12;
/// Maximum length of a brand name.
pub const BRAND_LEN: usize = 64;
/// Maximum length of a category name.
pub const CATEGORY_NAME_LEN: usize = 128;

/// Collapses runs of whitespace into single spaces, `None` when nothing is left.
pub fn normalize_whitespace(text: &str) -> Option<String> {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Keeps at most `max` characters.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Turns any identifier-like value into a trimmed short id.
pub fn coerce_short_id(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(truncate(trimmed, SHORT_ID_LEN))
    }
}

pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Last non-empty path segment of a URL (or of a bare path), ignoring query and fragment.
pub fn last_path_segment(url: &str) -> Option<&str> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let path = without_fragment.split('?').next().unwrap_or(without_fragment);
    let path = match path.find("://") {
        Some(scheme_end) => {
            let rest = &path[scheme_end + 3..];
            rest.find('/').map(|idx| &rest[idx..]).unwrap_or("")
        }
        None => path,
    };
    path.split('/').filter(|s| !s.is_empty()).last()
}
