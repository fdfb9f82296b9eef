//! URL canonicalisation.
//!
//! The canonical string is the cache and dedup key for archived posts, so two
//! raw URLs for the same post must canonicalise to the same string.

use std::sync::LazyLock;

use regex::Regex;

use crate::error_handling::ArchiveError;

use super::definitions::{
    definition_for, definition_for_host, param_listed, GLOBAL_TRACKING_PARAMS, SHORTENER_DOMAINS,
};
use super::detect::parse_target;
use super::types::Platform;

/// X status paths. Handles are case-insensitive and `/i/web/status/<id>`
/// carries no handle at all.
static X_STATUS_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^/(?:(?P<handle>[A-Za-z0-9_]{1,15})/status(?:es)?|i/web/status)/(?P<id>\d+)(?P<rest>/.*)?$",
    )
    .unwrap_or_else(|e| panic!("invalid status pattern: {e}"))
});

/// Rewrites an X status path to `/<lowercase handle>/status/<id>`, or
/// `/i/status/<id>` when the handle is unknown.
fn canonical_x_path(path: &str) -> Option<String> {
    let caps = X_STATUS_PATH.captures(path)?;
    let handle = caps
        .name("handle")
        .map_or_else(|| "i".to_string(), |m| m.as_str().to_ascii_lowercase());
    let rest = caps.name("rest").map_or("", |m| m.as_str());
    Some(format!("/{handle}/status/{}{rest}", &caps["id"]))
}

/// Whether the URL points at a link shortener whose target is unknown.
pub fn is_shortened_url(url: &str) -> bool {
    parse_target(url)
        .map(|t| SHORTENER_DOMAINS.contains(&t.host.as_str()))
        .unwrap_or(false)
}

/// Canonicalises a post URL.
///
/// Applies, in order: https scheme, `www.` stripping, mobile/legacy host
/// rewrites, X status path normalisation, fragment removal, tracking-parameter removal (global plus
/// platform-specific), optional query sorting and trailing-slash removal.
/// Shortened URLs are returned unchanged.
///
/// # Errors
///
/// Returns an `INVALID_URL` error when the input is not a valid http(s) URL.
pub fn canonicalize_url(url: &str, platform: Option<Platform>) -> Result<String, ArchiveError> {
    let target = parse_target(url).ok_or_else(|| ArchiveError::invalid_url(url))?;

    if SHORTENER_DOMAINS.contains(&target.host.as_str()) {
        return Ok(target.url.to_string());
    }

    let def = match platform {
        Some(p) => definition_for(p),
        None => definition_for_host(&target.host),
    };

    let mut host = target.host.clone();
    let mut path = target.url.path().to_string();
    let mut pairs: Vec<(String, String)> = target
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if let Some(def) = def {
        if def.host_rewrites.contains(&host.as_str()) {
            if let Some(canonical) = def.canonical_host {
                host = canonical.to_string();
            }
        }

        // youtu.be/<id> has a known target, unlike the shorteners above.
        if def.platform == Platform::YouTube && host == "youtu.be" {
            let id = path.trim_matches('/').to_string();
            host = "youtube.com".to_string();
            path = "/watch".to_string();
            pairs.retain(|(k, _)| k != "v");
            pairs.insert(0, ("v".to_string(), id));
        }

        if def.platform == Platform::X {
            if let Some(rewritten) = canonical_x_path(&path) {
                path = rewritten;
            }
        }
    }

    pairs.retain(|(k, _)| {
        !param_listed(GLOBAL_TRACKING_PARAMS, k)
            && !def.is_some_and(|d| param_listed(d.tracking_params, k))
    });

    if def.is_some_and(|d| d.sort_query) {
        pairs.sort();
    }

    let trimmed_path = path.trim_end_matches('/');
    let port = target
        .url
        .port()
        .map(|p| format!(":{p}"))
        .unwrap_or_default();

    let mut canonical = format!("https://{host}{port}{trimmed_path}");
    if !pairs.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter())
            .finish();
        canonical.push('?');
        canonical.push_str(&query);
    }
    Ok(canonical)
}
