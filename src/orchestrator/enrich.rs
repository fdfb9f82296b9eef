//! Best-effort post enrichment: author details and outbound links.
//!
//! Failures here are cosmetic. Callers log them and carry on.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use serde_json::Value;

use super::cache::AvatarCache;
use crate::error_handling::{ArchiveError, ErrorCode};
use crate::models::PostData;
use crate::utils::parse_selector;

static URL_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"'\)\]]+"#)
        .unwrap_or_else(|e| panic!("invalid link pattern: {e}"))
});

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

fn first_str<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
}

fn first_u64(obj: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| {
        let v = obj.get(*k)?;
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| s.replace(',', "").parse().ok()))
    })
}

/// Fills missing author fields from the raw upstream payload and resolves
/// the avatar through the shared cache.
///
/// Only empty fields are filled; values the backend already mapped win.
pub async fn enrich_author(post: &mut PostData, avatars: &AvatarCache) -> Result<(), ArchiveError> {
    if let Some(raw) = &post.raw {
        let author = ["author", "user", "owner"]
            .iter()
            .find_map(|k| raw.get(*k))
            .filter(|v| !v.is_null());
        if let Some(author) = author {
            if !author.is_object() {
                return Err(ArchiveError::new(
                    ErrorCode::ParseError,
                    format!("Author payload for {} is not an object", post.url),
                ));
            }
            let a = &mut post.author;
            if a.name.is_empty() {
                if let Some(name) = first_str(author, &["display_name", "name", "full_name"]) {
                    a.name = name.to_string();
                }
            }
            if a.handle.is_empty() {
                if let Some(handle) = first_str(author, &["handle", "username", "screen_name"]) {
                    a.handle = handle.trim_start_matches('@').to_string();
                }
            }
            if a.avatar.is_none() {
                a.avatar = first_str(
                    author,
                    &["avatar", "avatar_url", "profile_image_url", "profile_pic_url"],
                )
                .map(str::to_string);
            }
            if a.followers.is_none() {
                a.followers = first_u64(author, &["followers", "followers_count", "follower_count"]);
            }
            if !a.verified {
                a.verified = ["verified", "is_verified", "is_blue_verified"]
                    .iter()
                    .any(|k| author.get(*k).and_then(Value::as_bool).unwrap_or(false));
            }
            if a.bio.is_none() {
                a.bio = first_str(author, &["bio", "description", "biography"]).map(str::to_string);
            }
        }
    }

    if post.author.handle.is_empty() {
        return Ok(());
    }
    if let Some(avatar) = post.author.avatar.clone() {
        avatars.insert(post.platform, &post.author.handle, avatar).await;
    } else {
        post.author.avatar = avatars.get(post.platform, &post.author.handle).await;
    }
    Ok(())
}

/// Outbound links in the post body: anchors when HTML is present, otherwise
/// URLs found in the text. Deduplicated in first-seen order; the post's own
/// URL is left out.
pub fn extract_links(post: &PostData) -> Result<Vec<String>, ArchiveError> {
    let candidates: Vec<String> = match post.content.html.as_deref() {
        Some(html) if !html.trim().is_empty() => {
            let selector = parse_selector("a[href]", "link extraction")?;
            let document = Html::parse_fragment(html);
            document
                .select(&selector)
                .filter_map(|a| a.value().attr("href"))
                .map(str::to_string)
                .collect()
        }
        _ => URL_IN_TEXT
            .find_iter(&post.content.text)
            .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION).to_string())
            .collect(),
    };

    let mut seen = HashSet::new();
    Ok(candidates
        .into_iter()
        .filter(|l| l.starts_with("http://") || l.starts_with("https://"))
        .filter(|l| l != &post.url)
        .filter(|l| seen.insert(l.clone()))
        .collect())
}

/// Appends `found` to the post's links, skipping duplicates.
pub fn merge_links(post: &mut PostData, found: Vec<String>) {
    for link in found {
        if !post.links.contains(&link) {
            post.links.push(link);
        }
    }
}
