//! Post data exchanged with the collaborators.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Gif,
    Audio,
    Document,
}

impl MediaType {
    /// File extension used when the source URL doesn't carry one.
    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaType::Image => "jpg",
            MediaType::Video => "mp4",
            MediaType::Gif => "gif",
            MediaType::Audio => "mp3",
            MediaType::Document => "pdf",
        }
    }
}

/// A media reference inside a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    /// Remote URL, or a local path once downloaded.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl MediaItem {
    pub fn new(media_type: MediaType, url: impl Into<String>) -> Self {
        Self {
            media_type,
            url: url.into(),
            thumbnail_url: None,
            alt_text: None,
            width: None,
            height: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    /// Handle without a leading `@`.
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<u64>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostContent {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

/// A fetched post, as returned by the scraping backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostData {
    pub platform: Platform,
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub content: PostContent,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    #[serde(default)]
    pub metadata: PostMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_post: Option<Box<PostData>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedded_archives: Vec<PostData>,
    /// Outbound links found in the body.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    /// Untouched upstream payload, used for best-effort enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl PostData {
    pub fn new(platform: Platform, id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            platform,
            id: id.into(),
            url: url.into(),
            author: Author::default(),
            content: PostContent::default(),
            media: Vec::new(),
            metadata: PostMetadata::default(),
            quoted_post: None,
            embedded_archives: Vec::new(),
            links: Vec::new(),
            raw: None,
        }
    }
}

/// A media item stored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaResult {
    pub original_url: String,
    pub local_path: PathBuf,
    pub media_type: MediaType,
    pub size_bytes: u64,
}

/// A rendered note: front matter plus body, and the full text written to disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub front_matter: BTreeMap<String, serde_json::Value>,
    pub body: String,
    pub content: String,
}

impl Document {
    /// Whether the rendered content mentions `needle` (e.g. a local media path).
    pub fn references(&self, needle: &str) -> bool {
        self.content.contains(needle)
    }
}
