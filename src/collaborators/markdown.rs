//! Markdown note rendering.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::DocumentConverter;
use crate::models::{Document, MediaResult, MediaType, PostData};

/// Renders a post as front matter plus a markdown body.
///
/// A template, when given, is the body with `{{author}}`, `{{handle}}`,
/// `{{platform}}`, `{{url}}`, `{{content}}`, `{{media}}` and `{{links}}`
/// substituted. There are no conditionals or loops.
#[derive(Debug, Default, Clone)]
pub struct MarkdownConverter;

impl MarkdownConverter {
    pub fn new() -> Self {
        Self
    }
}

fn media_markdown(post: &PostData) -> String {
    if post.platform.embeds_by_reference() {
        return format!(
            "<iframe src=\"https://www.youtube.com/embed/{}\" allowfullscreen></iframe>",
            post.id
        );
    }
    post.media
        .iter()
        .map(|m| match m.media_type {
            MediaType::Image | MediaType::Gif => {
                format!("![{}]({})", m.alt_text.as_deref().unwrap_or(""), m.url)
            }
            MediaType::Video => format!("[video]({})", m.url),
            MediaType::Audio => format!("[audio]({})", m.url),
            MediaType::Document => format!("[document]({})", m.url),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn links_markdown(post: &PostData) -> String {
    post.links
        .iter()
        .map(|l| format!("- <{l}>"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn default_body(post: &PostData) -> String {
    let mut sections = Vec::new();
    let who = if post.author.handle.is_empty() {
        post.author.name.clone()
    } else {
        format!("{} (@{})", post.author.name, post.author.handle)
    };
    sections.push(format!("# {who} on {}", post.platform.display_name()));
    if !post.content.text.trim().is_empty() {
        sections.push(post.content.text.trim().to_string());
    }
    let media = media_markdown(post);
    if !media.is_empty() {
        sections.push(format!("## Media\n\n{media}"));
    }
    if let Some(quoted) = &post.quoted_post {
        let quoted_text = quoted
            .content
            .text
            .lines()
            .map(|l| format!("> {l}"))
            .collect::<Vec<_>>()
            .join("\n");
        let quoted_media = media_markdown(quoted);
        let mut block = format!("## Quoted post\n\n> **{}**\n{quoted_text}", quoted.author.name);
        if !quoted_media.is_empty() {
            block.push_str("\n\n");
            block.push_str(&quoted_media);
        }
        sections.push(block);
    }
    for embedded in &post.embedded_archives {
        sections.push(format!(
            "## Embedded: {}\n\n{}\n\n{}",
            embedded.url,
            embedded.content.text.trim(),
            media_markdown(embedded)
        ));
    }
    let links = links_markdown(post);
    if !links.is_empty() {
        sections.push(format!("## Links\n\n{links}"));
    }
    sections.push(format!("[Original post]({})", post.url));
    sections.join("\n\n")
}

fn apply_template(template: &str, post: &PostData) -> String {
    template
        .replace("{{author}}", &post.author.name)
        .replace("{{handle}}", &post.author.handle)
        .replace("{{platform}}", post.platform.display_name())
        .replace("{{url}}", &post.url)
        .replace("{{content}}", post.content.text.trim())
        .replace("{{media}}", &media_markdown(post))
        .replace("{{links}}", &links_markdown(post))
}

fn front_matter(post: &PostData, media: &[MediaResult]) -> BTreeMap<String, serde_json::Value> {
    let mut fm = BTreeMap::new();
    fm.insert("platform".into(), json!(post.platform.as_str()));
    fm.insert("url".into(), json!(post.url));
    fm.insert("post_id".into(), json!(post.id));
    fm.insert("author".into(), json!(post.author.name));
    if !post.author.handle.is_empty() {
        fm.insert("author_handle".into(), json!(post.author.handle));
    }
    if let Some(avatar) = &post.author.avatar {
        fm.insert("author_avatar".into(), json!(avatar));
    }
    if let Some(followers) = post.author.followers {
        fm.insert("author_followers".into(), json!(followers));
    }
    if post.author.verified {
        fm.insert("author_verified".into(), json!(true));
    }
    if let Some(published) = post.metadata.timestamp {
        fm.insert("published".into(), json!(published.to_rfc3339()));
    }
    for (key, value) in [
        ("likes", post.metadata.likes),
        ("comments", post.metadata.comments),
        ("shares", post.metadata.shares),
        ("views", post.metadata.views),
    ] {
        if let Some(v) = value {
            fm.insert(key.into(), json!(v));
        }
    }
    fm.insert("archived".into(), json!(Utc::now().to_rfc3339()));
    if !media.is_empty() {
        let files: Vec<String> = media
            .iter()
            .map(|m| m.local_path.display().to_string())
            .collect();
        fm.insert("media".into(), json!(files));
    }
    fm
}

fn render(doc: &Document) -> String {
    let mut out = String::from("---\n");
    for (key, value) in &doc.front_matter {
        // JSON scalars and flow arrays are valid YAML.
        out.push_str(&format!("{key}: {value}\n"));
    }
    out.push_str("---\n\n");
    out.push_str(&doc.body);
    out.push('\n');
    out
}

#[async_trait]
impl DocumentConverter for MarkdownConverter {
    async fn convert(
        &self,
        post: &PostData,
        template: Option<&str>,
        media: &[MediaResult],
    ) -> anyhow::Result<Document> {
        let body = match template {
            Some(t) if !t.trim().is_empty() => apply_template(t, post),
            _ => default_body(post),
        };
        let mut doc = Document {
            front_matter: front_matter(post, media),
            body,
            content: String::new(),
        };
        self.update_full_document(&mut doc)?;
        Ok(doc)
    }

    fn update_full_document(&self, doc: &mut Document) -> anyhow::Result<()> {
        doc.content = render(doc);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaItem;
    use crate::platform::Platform;

    fn post() -> PostData {
        let mut post = PostData::new(Platform::X, "123", "https://x.com/user/status/123");
        post.author.name = "User".into();
        post.author.handle = "user".into();
        post.content.text = "hello world".into();
        post.media = vec![MediaItem::new(MediaType::Image, "media/x/123/user-1.jpg")];
        post
    }

    #[tokio::test]
    async fn test_default_rendering() {
        let doc = MarkdownConverter::new().convert(&post(), None, &[]).await.unwrap();
        assert!(doc.content.starts_with("---\n"));
        assert!(doc.content.contains("platform: \"x\""));
        assert!(doc.body.contains("# User (@user) on X"));
        assert!(doc.references("![](media/x/123/user-1.jpg)"));
        assert!(doc.body.ends_with("[Original post](https://x.com/user/status/123)"));
    }

    #[tokio::test]
    async fn test_template_substitution() {
        let doc = MarkdownConverter::new()
            .convert(&post(), Some("{{author}} said: {{content}}"), &[])
            .await
            .unwrap();
        assert_eq!(doc.body, "User said: hello world");
    }

    #[tokio::test]
    async fn test_update_rerenders_front_matter() {
        let converter = MarkdownConverter::new();
        let mut doc = converter.convert(&post(), None, &[]).await.unwrap();
        doc.front_matter
            .insert("processing_time_ms".into(), json!(42));
        converter.update_full_document(&mut doc).unwrap();
        assert!(doc.content.contains("processing_time_ms: 42\n"));
    }

    #[tokio::test]
    async fn test_youtube_is_embedded() {
        let p = PostData::new(Platform::YouTube, "dQw4w9WgXcQ", "https://youtube.com/watch?v=dQw4w9WgXcQ");
        let doc = MarkdownConverter::new().convert(&p, None, &[]).await.unwrap();
        assert!(doc.body.contains("youtube.com/embed/dQw4w9WgXcQ"));
    }
}
