use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::{
    auth::{extractors::AuthError, jwt::TokenError},
    policy::PolicyError,
    store::StoreError,
    validation::FieldError,
};

/// Every way a request can be rejected.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("storage unavailable")]
    StorageUnavailable(#[source] anyhow::Error),
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a [FieldError]>,
}

impl AppError {
    /// Machine-readable category carried in the `error` field of the body.
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Auth(AuthError::MissingCredential) => "missing_credential",
            AppError::Auth(AuthError::Token(e)) => match e {
                TokenError::InvalidSignature => "invalid_signature",
                TokenError::Expired => "expired",
                TokenError::Malformed(_) => "malformed",
                TokenError::Signing(_) | TokenError::Lifetime => "internal",
            },
            AppError::Policy(e) => match e {
                PolicyError::Unauthenticated => "missing_credential",
                PolicyError::Forbidden { .. } => "forbidden",
                PolicyError::NotEnrolled { .. } => "not_enrolled",
                PolicyError::MalformedResourceReference(_) => "malformed_resource_reference",
                PolicyError::StorageUnavailable(_) => "storage_unavailable",
            },
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Validation(_) => "validation_failed",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::StorageUnavailable(_) => "storage_unavailable",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.category() {
            "missing_credential"
            | "malformed"
            | "malformed_resource_reference"
            | "validation_failed" => StatusCode::BAD_REQUEST,
            "invalid_signature" | "expired" | "invalid_credentials" => StatusCode::UNAUTHORIZED,
            "forbidden" | "not_enrolled" => StatusCode::FORBIDDEN,
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = ?self, category = self.category(), "request failed");
        }
        let details = match &self {
            AppError::Validation(fields) => Some(fields.as_slice()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.category(),
            message: self.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AppError::NotFound("record"),
            StoreError::Conflict(constraint) => {
                AppError::Conflict(format!("duplicate value violates {constraint}"))
            }
            StoreError::MissingReference => AppError::NotFound("referenced record"),
            StoreError::Unavailable(e) => AppError::StorageUnavailable(e),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Auth(AuthError::Token(e))
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::Validation(vec![FieldError {
            field: "body",
            constraint: e.body_text(),
        }])
    }
}

impl From<MultipartRejection> for AppError {
    fn from(e: MultipartRejection) -> Self {
        AppError::Validation(vec![FieldError {
            field: "body",
            constraint: e.body_text(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn denial_and_bad_input_map_to_different_statuses() {
        let forbidden = AppError::from(PolicyError::Forbidden {
            required: crate::auth::claims::Role::Admin,
        });
        let not_enrolled = AppError::from(PolicyError::NotEnrolled {
            course_id: Uuid::new_v4(),
        });
        let missing = AppError::from(AuthError::MissingCredential);
        let invalid = AppError::Validation(vec![]);

        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(not_enrolled.status(), StatusCode::FORBIDDEN);
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_ne!(forbidden.category(), invalid.category());
    }

    #[test]
    fn storage_faults_are_server_errors_not_not_found() {
        let unavailable = AppError::from(StoreError::Unavailable(anyhow::anyhow!("down")));
        assert_eq!(unavailable.category(), "storage_unavailable");
        assert_eq!(unavailable.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let missing = AppError::from(StoreError::NotFound);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn token_errors_keep_their_category() {
        assert_eq!(AppError::from(TokenError::Expired).category(), "expired");
        assert_eq!(
            AppError::from(TokenError::InvalidSignature).category(),
            "invalid_signature"
        );
        assert_eq!(
            AppError::from(TokenError::Malformed("x".into())).category(),
            "malformed"
        );
    }
}
