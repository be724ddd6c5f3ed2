//! Response decoding and status mapping.
//!
//! The API answers either `{"success": true, "data": ...}` or the bare
//! payload; errors carry `{"error": "..."}`.

use reqwest::StatusCode;
use rigor_core::ApiError;
use serde::de::DeserializeOwned;
use serde::Deserialize;

const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Decode a success body, unwrapping the `data` envelope if present
pub(crate) fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str::<Envelope<T>>(body)
        .map(Envelope::into_inner)
        .map_err(|e| ApiError::InvalidResponse(format!("{e}: {}", preview(body))))
}

/// Human-readable detail from an error body
pub(crate) fn error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .unwrap_or_else(|| preview(body))
}

/// Map a non-success status to the collaborator error taxonomy
pub(crate) fn status_error(status: StatusCode, body: &str, what: &str) -> ApiError {
    let detail = error_detail(body);
    if status == StatusCode::NOT_FOUND {
        ApiError::NotFound(format!("{what}: {detail}"))
    } else if status.is_server_error() {
        ApiError::Network(format!("{what}: server returned {status}: {detail}"))
    } else {
        ApiError::InvalidResponse(format!("{what}: unexpected status {status}: {detail}"))
    }
}

/// Map a transport failure
pub(crate) fn transport_error(err: &reqwest::Error, what: &str) -> ApiError {
    if err.is_decode() {
        ApiError::InvalidResponse(format!("{what}: {err}"))
    } else {
        ApiError::Network(format!("{what}: {err}"))
    }
}

fn preview(body: &str) -> String {
    if body.chars().count() > BODY_PREVIEW_CHARS {
        let truncated: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        format!("{truncated}...")
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigor_core::{RunId, SubmitResponse};

    #[test]
    fn unwraps_data_envelope_and_bare_bodies() {
        let wrapped: SubmitResponse =
            decode_body(r#"{"success": true, "data": {"run_id": 5, "status": "queued"}}"#)
                .unwrap();
        let bare: SubmitResponse = decode_body(r#"{"run_id": 5, "status": "queued"}"#).unwrap();
        assert_eq!(wrapped, SubmitResponse::Accepted { run_id: RunId(5) });
        assert_eq!(bare, wrapped);
    }

    #[test]
    fn undecodable_body_is_invalid_response() {
        let err = decode_body::<SubmitResponse>("<html>oops</html>").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(msg) if msg.contains("<html>")));
    }

    #[test]
    fn status_mapping() {
        let not_found = status_error(StatusCode::NOT_FOUND, r#"{"error": "File not found"}"#, "delete");
        assert_eq!(not_found, ApiError::NotFound("delete: File not found".into()));

        let unavailable = status_error(StatusCode::SERVICE_UNAVAILABLE, "", "poll");
        assert!(unavailable.is_retryable());

        let teapot = status_error(StatusCode::IM_A_TEAPOT, "{}", "save");
        assert!(matches!(teapot, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        assert_eq!(error_detail(&body).len(), BODY_PREVIEW_CHARS + 3);
    }
}
