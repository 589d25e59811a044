//! Helpers for trimming data before it goes into log lines and span fields.

use std::path::Path;

/// Returns only the filename component of a path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips userinfo and every query parameter except `v` and `list` from a URL.
///
/// Unparseable input is replaced entirely.
pub fn redact_url(raw: &str) -> String {
    let Ok(mut url) = reqwest::Url::parse(raw.trim()) else {
        return "<invalid url>".to_string();
    };
    let _ = url.set_username("");
    let _ = url.set_password(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k == "v" || k == "list")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.to_string()
}

/// Shortens collaborator output to at most `max_chars` characters.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
