//! Platform identifiers and detection results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter as EnumIterMacro;

/// Social platforms the archiver knows how to recognise and canonicalise.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIterMacro,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    X,
    Threads,
    LinkedIn,
    TikTok,
    YouTube,
    Reddit,
    Pinterest,
    Bluesky,
    Mastodon,
    Substack,
    Tumblr,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::X => "x",
            Platform::Threads => "threads",
            Platform::LinkedIn => "linkedin",
            Platform::TikTok => "tiktok",
            Platform::YouTube => "youtube",
            Platform::Reddit => "reddit",
            Platform::Pinterest => "pinterest",
            Platform::Bluesky => "bluesky",
            Platform::Mastodon => "mastodon",
            Platform::Substack => "substack",
            Platform::Tumblr => "tumblr",
        }
    }

    /// Human-readable platform name for notes and log lines.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::X => "X",
            Platform::Threads => "Threads",
            Platform::LinkedIn => "LinkedIn",
            Platform::TikTok => "TikTok",
            Platform::YouTube => "YouTube",
            Platform::Reddit => "Reddit",
            Platform::Pinterest => "Pinterest",
            Platform::Bluesky => "Bluesky",
            Platform::Mastodon => "Mastodon",
            Platform::Substack => "Substack",
            Platform::Tumblr => "Tumblr",
        }
    }

    /// Whether archived content from this platform is embedded by reference
    /// (an iframe / player link) rather than downloaded.
    pub fn embeds_by_reference(&self) -> bool {
        matches!(self, Platform::YouTube)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "facebook" | "fb" => Ok(Platform::Facebook),
            "instagram" | "ig" => Ok(Platform::Instagram),
            "x" | "twitter" => Ok(Platform::X),
            "threads" => Ok(Platform::Threads),
            "linkedin" => Ok(Platform::LinkedIn),
            "tiktok" => Ok(Platform::TikTok),
            "youtube" => Ok(Platform::YouTube),
            "reddit" => Ok(Platform::Reddit),
            "pinterest" => Ok(Platform::Pinterest),
            "bluesky" | "bsky" => Ok(Platform::Bluesky),
            "mastodon" => Ok(Platform::Mastodon),
            "substack" => Ok(Platform::Substack),
            "tumblr" => Ok(Platform::Tumblr),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

/// Outcome of matching a URL against the platform table.
///
/// `confidence` is `1.0` for a full URL-pattern match, `0.9` for a path-only
/// match and `0.8` when only the domain matched.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformDetectionResult {
    pub platform: Platform,
    pub confidence: f64,
    pub matched_pattern: String,
}
