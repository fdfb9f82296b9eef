//! Small shared utilities.
//!
//! This module provides:
//! - A fixed-capacity ring buffer for bounded logs
//! - Text sanitization for logs and file names
//! - CSS selector parsing
//! - Duration helpers

mod ring_buffer;
pub mod sanitize;
mod selector;

use std::time::Duration;

pub use ring_buffer::RingBuffer;
pub use selector::parse_selector;

/// Converts a duration to whole milliseconds, saturating at `u64::MAX`.
pub fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
