//! Platform detection and post-id extraction.

use url::Url;

use super::definitions::{definition_for, definition_for_host, PlatformDefinition};
use super::types::{Platform, PlatformDetectionResult};
use super::validate::validate_and_normalize_url;

/// Confidence reported when a full URL pattern matched.
pub const CONFIDENCE_URL_MATCH: f64 = 1.0;
/// Confidence reported when only a path pattern matched.
pub const CONFIDENCE_PATH_MATCH: f64 = 0.9;
/// Confidence reported when only the domain matched.
pub const CONFIDENCE_DOMAIN_MATCH: f64 = 0.8;

/// A parsed URL split into the pieces the pattern table is matched against.
pub(crate) struct ParsedTarget {
    pub url: Url,
    /// Lowercased host with any leading `www.` removed.
    pub host: String,
    /// `path` or `path?query`.
    pub path_and_query: String,
}

pub(crate) fn parse_target(raw: &str) -> Option<ParsedTarget> {
    let normalized = validate_and_normalize_url(raw)?;
    let url = Url::parse(&normalized).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    let path_and_query = match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    };
    Some(ParsedTarget {
        url,
        host,
        path_and_query,
    })
}

fn detect_with_definition(
    target: &ParsedTarget,
    def: &PlatformDefinition,
) -> PlatformDetectionResult {
    let full = target.url.as_str();
    if let Some(pattern) = def.url_patterns.iter().find(|p| p.is_match(full)) {
        return PlatformDetectionResult {
            platform: def.platform,
            confidence: CONFIDENCE_URL_MATCH,
            matched_pattern: pattern.as_str().to_string(),
        };
    }
    if let Some(pattern) = def
        .path_patterns
        .iter()
        .find(|p| p.is_match(&target.path_and_query))
    {
        return PlatformDetectionResult {
            platform: def.platform,
            confidence: CONFIDENCE_PATH_MATCH,
            matched_pattern: pattern.as_str().to_string(),
        };
    }
    let domain = def
        .domains
        .iter()
        .find(|d| target.host == **d || target.host.ends_with(&format!(".{d}")))
        .copied()
        .unwrap_or_default();
    PlatformDetectionResult {
        platform: def.platform,
        confidence: CONFIDENCE_DOMAIN_MATCH,
        matched_pattern: domain.to_string(),
    }
}

/// Detects the platform a URL belongs to, with a confidence score.
///
/// Returns `None` when the URL does not parse or no platform's domain matches.
pub fn detect_platform_with_confidence(url: &str) -> Option<PlatformDetectionResult> {
    let target = parse_target(url)?;
    let def = definition_for_host(&target.host)?;
    Some(detect_with_definition(&target, def))
}

/// Detects the platform a URL belongs to.
pub fn detect_platform(url: &str) -> Option<Platform> {
    detect_platform_with_confidence(url).map(|r| r.platform)
}

/// Extracts the platform-specific post identifier from a URL.
///
/// When `platform` is `None` it is detected from the URL first.
pub fn extract_post_id(url: &str, platform: Option<Platform>) -> Option<String> {
    let target = parse_target(url)?;
    let def = match platform {
        Some(p) => definition_for(p)?,
        None => definition_for_host(&target.host)?,
    };
    def.post_id_patterns.iter().find_map(|pattern| {
        pattern
            .captures(&target.path_and_query)
            .and_then(|caps| caps.name("id"))
            .map(|m| m.as_str().to_string())
    })
}
