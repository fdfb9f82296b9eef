//! URL validation and scheme normalisation.

use log::warn;

use crate::config::MAX_URL_LENGTH;

/// Validates a URL and adds an `https://` prefix when no scheme was given.
///
/// Rejects URLs longer than `MAX_URL_LENGTH`, URLs that don't parse, URLs
/// without a host, and schemes other than http/https. Logs a warning and
/// returns `None` for anything rejected.
pub fn validate_and_normalize_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    if url.len() > MAX_URL_LENGTH {
        warn!(
            "Rejecting URL exceeding maximum length ({} > {}): {}...",
            url.len(),
            MAX_URL_LENGTH,
            url.chars().take(50).collect::<String>()
        );
        return None;
    }

    let normalized = if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };

    if normalized.len() > MAX_URL_LENGTH {
        warn!(
            "Rejecting normalized URL exceeding maximum length ({} > {})",
            normalized.len(),
            MAX_URL_LENGTH
        );
        return None;
    }

    match url::Url::parse(&normalized) {
        Ok(parsed) => match parsed.scheme() {
            "http" | "https" if parsed.host_str().is_some_and(|h| !h.is_empty()) => {
                Some(normalized)
            }
            "http" | "https" => {
                warn!("Rejecting URL without host: {url}");
                None
            }
            _ => {
                warn!("Rejecting unsupported scheme for URL: {url}");
                None
            }
        },
        Err(_) => {
            warn!("Rejecting invalid URL: {url}");
            None
        }
    }
}

/// Syntactic URL check used before any network work happens.
pub fn validate_url(url: &str) -> bool {
    validate_and_normalize_url(url).is_some()
}
