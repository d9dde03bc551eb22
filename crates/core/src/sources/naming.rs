//! Output file naming.

use once_cell::sync::Lazy;
use regex_lite::Regex;

const MAX_FILENAME_LEN: usize = 200;

static URL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^https?://(?:www\.)?([^/?#]+)(/[^?#]*)?").ok());

static VIDEO_ID_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?:[?&]v=|youtu\.be/|/shorts/|/embed/)([A-Za-z0-9_-]{6,})").ok()
});

/// Keeps alphanumerics, `-` and `_`; spaces become `_`.
///
/// Falls back to `fallback` when nothing usable remains.
pub fn sanitize_filename(text: &str, fallback: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let safe: String = kept
        .trim()
        .replace(' ', "_")
        .chars()
        .take(MAX_FILENAME_LEN)
        .collect();

    if safe.is_empty() {
        fallback.to_string()
    } else {
        safe
    }
}

/// `https://www.example.com/docs/intro?x=1` -> `example_com_docs_intro`.
pub fn filename_from_url(url: &str) -> String {
    let Some(caps) = URL_RE.as_ref().and_then(|re| re.captures(url)) else {
        return "webpage".to_string();
    };

    let domain = caps
        .get(1)
        .map(|m| m.as_str().replace(['.', ':'], "_"))
        .unwrap_or_default();
    let path = caps
        .get(2)
        .map(|m| m.as_str().trim_matches('/').replace('/', "_"))
        .unwrap_or_default();

    let name = if path.is_empty() {
        domain
    } else {
        format!("{}_{}", domain, path)
    };
    sanitize_filename(&name, "webpage")
}

/// Video ID of a YouTube watch, short or embed URL.
pub fn youtube_video_id(url: &str) -> Option<String> {
    VIDEO_ID_RE
        .as_ref()
        .and_then(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
