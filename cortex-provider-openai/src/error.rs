//! HTTP status / transport error mapping to [`cortex_core::error::ModelError`].

use cortex_core::error::ModelError;

/// Map a non-2xx HTTP response to a [`ModelError`].
///
/// Reference: <https://platform.openai.com/docs/guides/error-codes>
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> ModelError {
    match status.as_u16() {
        401 | 403 => ModelError::AuthFailed(body.to_string()),
        429 => ModelError::RateLimited,
        500 | 502 | 503 => ModelError::RequestFailed(format!("service unavailable: {body}")),
        _ => ModelError::RequestFailed(format!("HTTP {status}: {body}")),
    }
}

/// Map a [`reqwest::Error`] to a [`ModelError`].
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ModelError {
    if err.is_timeout() {
        ModelError::RequestFailed("request timed out".to_string())
    } else {
        ModelError::RequestFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_auth_failed() {
        let err = map_http_status(reqwest::StatusCode::UNAUTHORIZED, "Invalid API key");
        assert!(matches!(err, ModelError::AuthFailed(_)));
    }

    #[test]
    fn too_many_requests_maps_to_rate_limited() {
        let err = map_http_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded");
        assert!(matches!(err, ModelError::RateLimited));
        assert!(err.is_retryable());
    }

    #[test]
    fn server_error_maps_to_request_failed() {
        let err = map_http_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        assert!(matches!(err, ModelError::RequestFailed(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn unknown_status_maps_to_request_failed() {
        let err = map_http_status(reqwest::StatusCode::IM_A_TEAPOT, "teapot");
        assert!(matches!(err, ModelError::RequestFailed(_)));
    }
}
