//! CSS selector parsing.

use scraper::Selector;

use crate::error_handling::{ArchiveError, ErrorCode};

/// Parses a CSS selector, reporting failure as a `PARSE_ERROR` instead of
/// panicking. `context` names the caller for the error message.
pub fn parse_selector(selector_str: &str, context: &str) -> Result<Selector, ArchiveError> {
    Selector::parse(selector_str).map_err(|e| {
        ArchiveError::new(
            ErrorCode::ParseError,
            format!("Invalid CSS selector '{selector_str}' in {context}: {e}"),
        )
    })
}
