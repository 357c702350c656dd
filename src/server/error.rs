use crate::utils::error::{ErrorCategory, FormError};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

impl FormError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FormError::NotFound { .. } => StatusCode::NOT_FOUND,
            FormError::UnsupportedLanguage { .. } => StatusCode::BAD_REQUEST,
            FormError::InvalidFieldValue { .. } | FormError::IncompleteForm { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => match self.category() {
                ErrorCategory::ExternalService => StatusCode::BAD_GATEWAY,
                ErrorCategory::Input => StatusCode::BAD_REQUEST,
                ErrorCategory::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<JsonRejection> for FormError {
    fn from(rejection: JsonRejection) -> Self {
        FormError::InvalidRequest {
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("❌ {} ({:?})", self, self.severity());
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let mut body = json!({
            "error": {
                "code": self.code(),
                "message": self.user_friendly_message(),
                "suggestion": self.recovery_suggestion(),
            }
        });
        if let FormError::IncompleteForm { fields } = &self {
            body["error"]["fields"] = json!(fields);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(FormError::not_found("Form", "x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            FormError::UnsupportedLanguage { code: "zz".into() }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            FormError::invalid_field("email", "bad").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            FormError::IncompleteForm { fields: vec!["uci".into()] }.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            FormError::TranslationError { message: "down".into() }.status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            FormError::InvalidRequest { message: "x".into() }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            FormError::ConfigError { message: "x".into() }.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
