//! Tracking/redirect links attached to published content.

use base64::Engine;
use regex_lite::Regex;

/// Reduce a name to `[A-Za-z0-9_-]`, with whitespace turned into underscores.
pub fn tracking_slug(name: &str) -> String {
    // Pattern is a literal and always compiles.
    let strip = Regex::new(r"[^\w\s-]").map(|re| re.replace_all(name, "").into_owned());
    let cleaned = strip.unwrap_or_else(|_| name.to_string());
    cleaned
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Build the link published alongside an item.
///
/// With a base URL: `{base}/?track={slug}&dest={base64(destination)}`.
/// Without one, the destination link is used as is.
pub fn tracking_link(base_url: Option<&str>, name: &str, destination: &str) -> String {
    match base_url.map(str::trim).filter(|b| !b.is_empty()) {
        Some(base) => {
            let dest = base64::engine::general_purpose::STANDARD.encode(destination.as_bytes());
            format!(
                "{}/?track={}&dest={}",
                base.trim_end_matches('/'),
                urlencoding::encode(&tracking_slug(name)),
                urlencoding::encode(&dest)
            )
        }
        None => destination.to_string(),
    }
}
