//! Short-link expansion.
//!
//! Shortened URLs (t.co, bit.ly, ...) hide the post they point at, so they
//! are expanded by following redirects before canonicalisation. Redirects are
//! followed by hand on a client with automatic redirects disabled so the hop
//! count stays bounded and the chain is visible.

use std::collections::HashMap;

use reqwest::Url;
use tokio::sync::RwLock;

use super::canonicalize::is_shortened_url;
use crate::config::MAX_REDIRECT_HOPS;
use crate::error_handling::{categorize_reqwest_error, ArchiveError};

/// Follows short-link redirects, caching the final URL per input.
pub struct ShortUrlExpander {
    client: reqwest::Client,
    max_hops: usize,
    cache: RwLock<HashMap<String, String>>,
}

impl ShortUrlExpander {
    /// `client` must have redirects disabled, or only one hop is ever seen.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            max_hops: MAX_REDIRECT_HOPS,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops.max(1);
        self
    }

    /// Expands `url` if it is a known short link; any other URL is returned
    /// unchanged without a request.
    ///
    /// # Errors
    ///
    /// Returns a categorised network error when a hop fails, or
    /// `INVALID_URL` when a `Location` header cannot be resolved.
    pub async fn expand(&self, url: &str) -> Result<String, ArchiveError> {
        if !is_shortened_url(url) {
            return Ok(url.to_string());
        }
        self.expand_cached(url).await
    }

    async fn expand_cached(&self, url: &str) -> Result<String, ArchiveError> {
        if let Some(hit) = self.cache.read().await.get(url) {
            return Ok(hit.clone());
        }
        let (final_url, chain) = self.resolve(url).await?;
        log::debug!(
            "Expanded {} -> {} in {} hop(s)",
            url,
            final_url,
            chain.len().saturating_sub(1)
        );
        self.cache
            .write()
            .await
            .insert(url.to_string(), final_url.clone());
        Ok(final_url)
    }

    /// Follows redirects from `start_url` for at most `max_hops` requests.
    ///
    /// Returns the final URL and every URL requested along the way.
    pub async fn resolve(&self, start_url: &str) -> Result<(String, Vec<String>), ArchiveError> {
        let mut chain: Vec<String> = Vec::new();
        let mut current = start_url.to_string();

        for _ in 0..self.max_hops {
            chain.push(current.clone());
            let resp = self
                .client
                .get(&current)
                .send()
                .await
                .map_err(|e| categorize_reqwest_error(e, None))?;

            let status = resp.status();
            if !status.is_redirection() || status.as_u16() == 304 {
                break;
            }
            let Some(loc) = resp.headers().get(reqwest::header::LOCATION) else {
                log::warn!(
                    "Redirect status {} for {} but no Location header",
                    status.as_u16(),
                    current
                );
                break;
            };
            let loc = loc.to_str().unwrap_or_default();
            let next = Url::parse(loc)
                .or_else(|_| Url::parse(&current).and_then(|base| base.join(loc)))
                .map_err(|_| ArchiveError::invalid_url(loc))?;
            current = next.to_string();
        }
        Ok((current, chain))
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }
}
