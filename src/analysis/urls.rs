//! URL extraction from email bodies.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).unwrap());

/// Extract all `http(s)://` URLs from a body.
///
/// Set-deduplicated (a URL appearing twice contributes once) and returned in
/// sorted order so probing is deterministic.
pub fn extract_urls(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let unique: BTreeSet<String> = URL_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', ')']))
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect();

    unique.into_iter().collect()
}
