//! Locating downloadable media inside a post tree.

use crate::models::{MediaItem, PostData};

/// Where a media item lives in the post tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSlot {
    Primary(usize),
    Quoted(usize),
    Embedded { archive: usize, index: usize },
}

fn downloadable(owner: &PostData, item: &MediaItem) -> bool {
    !owner.platform.embeds_by_reference()
        && (item.url.starts_with("http://") || item.url.starts_with("https://"))
}

/// Every media item that needs downloading: the post's own, the quoted
/// post's, and each embedded archive's. Posts embedded by reference and
/// items that are already local are skipped.
pub fn collect_media(post: &PostData) -> Vec<(MediaSlot, MediaItem)> {
    let mut found = Vec::new();
    for (i, item) in post.media.iter().enumerate() {
        if downloadable(post, item) {
            found.push((MediaSlot::Primary(i), item.clone()));
        }
    }
    if let Some(quoted) = &post.quoted_post {
        for (i, item) in quoted.media.iter().enumerate() {
            if downloadable(quoted, item) {
                found.push((MediaSlot::Quoted(i), item.clone()));
            }
        }
    }
    for (a, archive) in post.embedded_archives.iter().enumerate() {
        for (i, item) in archive.media.iter().enumerate() {
            if downloadable(archive, item) {
                found.push((MediaSlot::Embedded { archive: a, index: i }, item.clone()));
            }
        }
    }
    found
}

/// Points the item at `slot` to its local copy. Returns false if the slot no
/// longer exists.
pub fn set_local_path(post: &mut PostData, slot: MediaSlot, local: &str) -> bool {
    let item = match slot {
        MediaSlot::Primary(i) => post.media.get_mut(i),
        MediaSlot::Quoted(i) => post.quoted_post.as_mut().and_then(|q| q.media.get_mut(i)),
        MediaSlot::Embedded { archive, index } => post
            .embedded_archives
            .get_mut(archive)
            .and_then(|a| a.media.get_mut(index)),
    };
    match item {
        Some(item) => {
            item.url = local.to_string();
            true
        }
        None => false,
    }
}
