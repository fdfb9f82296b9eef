//! HTTP client initialization.

use std::time::Duration;

use reqwest::ClientBuilder;

use crate::config::Config;
use crate::error_handling::InitializationError;

/// Client for backend and media requests: configured timeout and user agent,
/// redirects followed by reqwest's default policy.
///
/// # Errors
///
/// Returns `InitializationError::HttpClientError` if the client cannot be built.
pub fn init_client(config: &Config) -> Result<reqwest::Client, InitializationError> {
    let client = ClientBuilder::new()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(config.user_agent.clone())
        .build()?;
    Ok(client)
}

/// Client for short-link expansion. Redirects are disabled so the expander
/// can follow and count them itself.
///
/// # Errors
///
/// Returns `InitializationError::HttpClientError` if the client cannot be built.
pub fn init_redirect_client(config: &Config) -> Result<reqwest::Client, InitializationError> {
    let client = ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(config.user_agent.clone())
        .build()?;
    Ok(client)
}
