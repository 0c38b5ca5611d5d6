//! HTTP status / transport error mapping to [`cortex_core::error::ModelError`].

use cortex_core::error::ModelError;

/// Map a non-2xx HTTP response to a [`ModelError`].
///
/// `cortex_core::error::ModelError` carries a narrower variant set than
/// Anthropic's actual failure modes (no distinct "model not found" or
/// "overloaded" cases) — see `DESIGN.md` for how each status collapses.
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> ModelError {
    match status.as_u16() {
        401 | 403 => ModelError::AuthFailed(body.to_string()),
        429 => ModelError::RateLimited,
        // 529 is Anthropic's overloaded status; both it and 5xx are transient.
        500..=599 => ModelError::RequestFailed(format!("service unavailable: HTTP {status}: {body}")),
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
        let err = map_http_status(reqwest::StatusCode::UNAUTHORIZED, "bad key");
        assert!(matches!(err, ModelError::AuthFailed(_)));
    }

    #[test]
    fn too_many_requests_maps_to_rate_limited() {
        let err = map_http_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(err, ModelError::RateLimited));
    }

    #[test]
    fn overloaded_maps_to_request_failed() {
        let err = map_http_status(reqwest::StatusCode::from_u16(529).unwrap(), "overloaded");
        assert!(matches!(err, ModelError::RequestFailed(_)));
    }

    #[test]
    fn not_found_maps_to_request_failed() {
        let err = map_http_status(reqwest::StatusCode::NOT_FOUND, "no such model");
        assert!(matches!(err, ModelError::RequestFailed(_)));
    }
}
