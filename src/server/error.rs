//! API error handling

use crate::error::VoxgateError;
use crate::language::Messages;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// API error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    /// Internal description, kept when `message` was localized.
    pub detail: Option<String>,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_request".to_string(),
            message: msg.into(),
            detail: None,
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "unavailable".to_string(),
            message: msg.into(),
            detail: None,
        }
    }

    /// A failed transcription, with `message` in the request's language.
    pub fn for_transcription(err: VoxgateError, messages: &Messages) -> Self {
        let message = err.user_message(messages).to_string();
        Self::localized(err, message)
    }

    /// A failed synthesis, with `message` in the request's language.
    pub fn for_synthesis(err: VoxgateError, messages: &Messages) -> Self {
        let message = messages.synthesis_failed.clone();
        Self::localized(err, message)
    }

    /// Request validation errors keep their own text; they are for the caller.
    fn localized(err: VoxgateError, message: String) -> Self {
        if matches!(err, VoxgateError::InvalidRequest { .. }) {
            return Self::from(err);
        }
        let mut api = Self::from(err);
        api.detail = Some(std::mem::replace(&mut api.message, message));
        api
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = json!({
            "code": self.code,
            "message": self.message,
            "status": self.status.as_u16()
        });
        if let Some(detail) = self.detail {
            error["detail"] = json!(detail);
        }
        let body = Json(json!({ "error": error }));
        (self.status, body).into_response()
    }
}

impl From<VoxgateError> for ApiError {
    fn from(err: VoxgateError) -> Self {
        let status = match &err {
            VoxgateError::InvalidRequest { .. }
            | VoxgateError::ConfigFileNotFound { .. }
            | VoxgateError::ConfigInvalidValue { .. }
            | VoxgateError::Config(_) => StatusCode::BAD_REQUEST,
            VoxgateError::InputTooShort { .. }
            | VoxgateError::CorruptAudio { .. }
            | VoxgateError::ConversionFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            VoxgateError::ArtifactUnavailable { .. }
            | VoxgateError::UnknownArtifact { .. }
            | VoxgateError::Download { .. }
            | VoxgateError::EngineLoadFailed { .. }
            | VoxgateError::NoEngineAvailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        } else {
            tracing::warn!(error = %err, "request rejected");
        }
        Self {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
            detail: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                VoxgateError::InvalidRequest {
                    message: "x".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                VoxgateError::CorruptAudio {
                    message: "x".to_string(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                VoxgateError::NoEngineAvailable {
                    language: "fi".to_string(),
                    attempts: 3,
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                VoxgateError::InferenceFailed {
                    engine: "e".to_string(),
                    message: "x".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_code_carried_over() {
        let err = ApiError::from(VoxgateError::ConversionFailed {
            message: "ffmpeg exited 1".to_string(),
        });
        assert_eq!(err.code, "conversion_failed");
        assert!(err.message.contains("ffmpeg exited 1"));
    }

    #[test]
    fn test_transcription_error_is_localized() {
        let err = ApiError::for_transcription(
            VoxgateError::CorruptAudio {
                message: "Invalid data found when processing input".to_string(),
            },
            &Messages::finnish(),
        );
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, "unsupported_or_corrupt_audio");
        assert_eq!(err.message, "Äänitiedosto on viallinen.");
        assert!(err.detail.unwrap().contains("Invalid data found"));
    }

    #[test]
    fn test_synthesis_error_is_localized() {
        let err = ApiError::for_synthesis(
            VoxgateError::NoEngineAvailable {
                language: "fi".to_string(),
                attempts: 3,
            },
            &Messages::finnish(),
        );
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.message, "Puhesynteesi epäonnistui.");
    }

    #[test]
    fn test_invalid_request_keeps_its_text() {
        let err = ApiError::for_synthesis(
            VoxgateError::InvalidRequest {
                message: "text is empty".to_string(),
            },
            &Messages::finnish(),
        );
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("text is empty"));
        assert!(err.detail.is_none());
    }
}
