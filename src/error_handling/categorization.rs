//! Error categorization.
//!
//! Turns transport-level failures into `ArchiveError`s with the right code.

use super::http_status::map_http_status_to_error;
use super::types::{ArchiveError, ErrorCode};
use crate::platform::Platform;

/// Categorizes a `reqwest::Error` into an `ArchiveError`.
///
/// Status errors go through `map_http_status_to_error`; otherwise the error
/// kind decides: timeouts become `TIMEOUT_ERROR`, connect/request failures
/// `NETWORK_ERROR`, decode/body failures `PARSE_ERROR`.
pub fn categorize_reqwest_error(error: reqwest::Error, platform: Option<Platform>) -> ArchiveError {
    let message = error.to_string();

    let categorized = if let Some(status) = error.status() {
        map_http_status_to_error(status.as_u16(), platform, None, None)
    } else if error.is_timeout() {
        ArchiveError::timeout(message)
    } else if error.is_connect() || error.is_request() {
        ArchiveError::network(message)
    } else if error.is_redirect() {
        ArchiveError::new(ErrorCode::HttpError, message)
    } else if error.is_decode() || error.is_body() {
        ArchiveError::new(ErrorCode::ParseError, message)
    } else if error.is_builder() {
        ArchiveError::internal(message)
    } else {
        ArchiveError::network(message)
    };

    categorized.with_cause(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_connect_failure_is_network_error() {
        // Nothing listens on port 1.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let err = client.get("http://127.0.0.1:1/").send().await.unwrap_err();
        let categorized = categorize_reqwest_error(err, None);
        assert!(matches!(
            categorized.code(),
            ErrorCode::NetworkError | ErrorCode::TimeoutError
        ));
        assert!(categorized.is_retryable());
        assert!(categorized.cause().is_some());
    }

    #[tokio::test]
    async fn test_status_error_uses_status_mapping() {
        use httptest::{matchers::*, responders::*, Expectation, Server};

        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/gone"))
                .respond_with(status_code(404)),
        );
        let err = reqwest::get(server.url("/gone").to_string())
            .await
            .unwrap()
            .error_for_status()
            .unwrap_err();
        let categorized = categorize_reqwest_error(err, None);
        assert_eq!(categorized.code(), ErrorCode::NotFound);
        assert!(!categorized.is_retryable());
    }
}
