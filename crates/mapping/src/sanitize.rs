use std::path::PathBuf;

/// Clean a path typed or pasted by an operator.
///
/// Trims whitespace and a trailing CR, strips one pair of matching quotes,
/// turns backslashes into forward slashes and drops trailing separators.
pub fn sanitize_path(raw: &str) -> Option<PathBuf> {
    let mut text = raw.trim_end_matches(['\r', '\n']).trim();

    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            text = text[1..text.len() - 1].trim();
            break;
        }
    }

    let mut normalized = text.replace('\\', "/");
    while normalized.len() > 1 && normalized.ends_with('/') && !normalized.ends_with(":/") {
        normalized.pop();
    }

    if normalized.is_empty() {
        return None;
    }
    Some(PathBuf::from(normalized))
}
