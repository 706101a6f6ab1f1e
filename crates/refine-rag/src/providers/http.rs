//! HTTP error classification shared by the provider clients

use reqwest::{header::RETRY_AFTER, Response, StatusCode};
use std::time::Duration;

use crate::error::{Error, Result};

/// Which call failed, to pick the fatal error variant
#[derive(Debug, Clone, Copy)]
pub(crate) enum CallKind {
    Embedding,
    Completion,
}

impl CallKind {
    fn fatal(self, message: String) -> Error {
        match self {
            Self::Embedding => Error::Embedding(message),
            Self::Completion => Error::Llm(message),
        }
    }
}

/// Map a send failure: connect and timeout problems are retryable
pub(crate) fn send_error(kind: CallKind, err: reqwest::Error) -> Error {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        Error::transient(format!("{:?} request failed: {}", kind, err))
    } else {
        kind.fatal(format!("request failed: {}", err))
    }
}

/// Pass successful responses through, classify the rest
pub(crate) async fn check_status(kind: CallKind, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();

    Err(classify_status(kind, status, &body, retry_after))
}

pub(crate) fn classify_status(
    kind: CallKind,
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
) -> Error {
    let message = format!("HTTP {} - {}", status, body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS {
        Error::RateLimit {
            message,
            retry_after,
        }
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        Error::transient(message)
    } else {
        kind.fatal(message)
    }
}

/// Parse a JSON body, mapping decode failures to the fatal variant
pub(crate) async fn json_body<T: serde::de::DeserializeOwned>(
    kind: CallKind,
    response: Response,
) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| kind.fatal(format!("failed to parse response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        let err = classify_status(
            CallKind::Completion,
            StatusCode::TOO_MANY_REQUESTS,
            "slow down",
            Some(Duration::from_secs(7)),
        );
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));

        let err = classify_status(CallKind::Embedding, StatusCode::SERVICE_UNAVAILABLE, "", None);
        assert!(matches!(err, Error::TransientNetwork(_)));

        let err = classify_status(CallKind::Embedding, StatusCode::BAD_REQUEST, "bad", None);
        assert!(matches!(err, Error::Embedding(_)));

        let err = classify_status(CallKind::Completion, StatusCode::UNAUTHORIZED, "", None);
        assert!(matches!(err, Error::Llm(_)));
    }
}
