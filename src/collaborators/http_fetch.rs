//! Scraping backend client.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use super::{FetchClient, FetchOptions, ProgressFn};
use crate::config::HEADER_RATE_LIMIT_RESET;
use crate::error_handling::{
    categorize_reqwest_error, map_http_status_to_error, parse_retry_after, ArchiveError, ErrorCode,
};
use crate::models::PostData;
use crate::platform::detect_platform;

#[derive(Serialize)]
struct ArchiveRequest<'a> {
    url: &'a str,
    options: &'a FetchOptions,
}

/// Talks to the scraping backend over HTTP.
///
/// Sends `POST <base>/api/archive` with `{url, options}` and expects the post
/// either as the response body or under a `data` key.
pub struct HttpFetchClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpFetchClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/archive", self.base_url)
    }
}

/// Pulls a human-readable message out of an error body, if there is one.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(json) => ["error", "message", "detail"]
            .iter()
            .find_map(|k| json.get(*k).and_then(|v| v.as_str()))
            .map(str::to_string),
        Err(_) => Some(trimmed.chars().take(200).collect()),
    }
}

#[async_trait]
impl FetchClient for HttpFetchClient {
    async fn archive_post(
        &self,
        url: &str,
        options: &FetchOptions,
        on_progress: Option<ProgressFn>,
    ) -> anyhow::Result<PostData> {
        let platform = detect_platform(url);
        if let Some(report) = &on_progress {
            report(10, "Requesting post from backend");
        }

        let mut request = self
            .client
            .post(self.endpoint())
            .json(&ArchiveRequest { url, options });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| categorize_reqwest_error(e, platform))?;

        let status = response.status();
        if !status.is_success() {
            let header = |name: &str| {
                response
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            let retry_after = parse_retry_after(
                header(reqwest::header::RETRY_AFTER.as_str()).as_deref(),
                header(HEADER_RATE_LIMIT_RESET).as_deref(),
                Utc::now(),
            );
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            log::debug!("Backend returned {} for {}", status.as_u16(), url);
            return Err(map_http_status_to_error(
                status.as_u16(),
                platform,
                retry_after,
                message.as_deref(),
            )
            .into());
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| categorize_reqwest_error(e, platform))?;
        let payload = match json.get("data") {
            Some(data) if data.is_object() => data.clone(),
            _ => json,
        };
        let mut post: PostData = serde_json::from_value(payload.clone()).map_err(|e| {
            ArchiveError::new(
                ErrorCode::ParseError,
                format!("Backend returned an unexpected post shape: {e}"),
            )
            .with_cause(e)
        })?;
        if post.raw.is_none() {
            post.raw = Some(payload);
        }

        if let Some(report) = &on_progress {
            report(100, "Post fetched");
        }
        Ok(post)
    }
}
