//! Platform detection, URL validation and canonicalisation.
//!
//! The canonical URL produced here is the cache and dedup key used by the
//! orchestrator.

mod canonicalize;
mod definitions;
mod detect;
mod shortener;
mod types;
mod validate;

pub use canonicalize::{canonicalize_url, is_shortened_url};
pub use detect::{
    detect_platform, detect_platform_with_confidence, extract_post_id, CONFIDENCE_DOMAIN_MATCH,
    CONFIDENCE_PATH_MATCH, CONFIDENCE_URL_MATCH,
};
pub use shortener::ShortUrlExpander;
pub use types::{Platform, PlatformDetectionResult};
pub use validate::{validate_and_normalize_url, validate_url};
