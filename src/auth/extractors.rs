use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderValue},
};
use thiserror::Error;
use tracing::warn;

use super::{
    claims::Principal,
    jwt::{JwtKeys, TokenError},
};
use crate::error::AppError;

pub const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer credential")]
    MissingCredential,
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Returns the credential following the `Bearer ` prefix.
///
/// Absent headers, non-ASCII values, values shorter than the prefix and
/// values with a different scheme all yield `MissingCredential`.
pub fn bearer_token(header: Option<&HeaderValue>) -> Result<&str, AuthError> {
    let raw = header
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingCredential)?;
    let token = raw
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .ok_or(AuthError::MissingCredential)?;
    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}

/// Resolves the Authorization header into a verified Principal. No storage
/// access happens here.
pub fn resolve_principal(
    header: Option<&HeaderValue>,
    keys: &JwtKeys,
) -> Result<Principal, AuthError> {
    let token = bearer_token(header)?;
    Ok(keys.verify(token)?)
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        resolve_principal(parts.headers.get(AUTHORIZATION), &keys).map_err(|e| {
            warn!(error = %e, path = %parts.uri.path(), "credential rejected");
            AppError::Auth(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::claims::Role, config::AppConfig};
    use uuid::Uuid;

    fn header(v: &str) -> HeaderValue {
        HeaderValue::from_str(v).expect("header value")
    }

    #[test]
    fn short_or_foreign_headers_are_missing_credentials() {
        for raw in ["", "B", "Bearer", "Bearer ", "Bearer    ", "Basic abc", "bearer abc"] {
            let h = header(raw);
            assert!(
                matches!(bearer_token(Some(&h)), Err(AuthError::MissingCredential)),
                "header {raw:?}"
            );
        }
        assert!(matches!(bearer_token(None), Err(AuthError::MissingCredential)));
    }

    #[test]
    fn non_ascii_header_is_missing_credential() {
        let h = HeaderValue::from_bytes(b"Bearer \xff\xfe").expect("opaque bytes");
        assert!(matches!(bearer_token(Some(&h)), Err(AuthError::MissingCredential)));
    }

    #[test]
    fn bearer_token_strips_prefix() {
        let h = header("Bearer abc.def.ghi");
        assert_eq!(bearer_token(Some(&h)).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn resolve_principal_round_trips_through_codec() {
        let keys = JwtKeys::new(&AppConfig::ephemeral().jwt);
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id, Role::User).expect("issue");
        let h = header(&format!("Bearer {token}"));
        let principal = resolve_principal(Some(&h), &keys).expect("resolve");
        assert_eq!(principal.user_id, user_id);
        assert_eq!(principal.role, Role::User);
    }

    #[test]
    fn resolve_principal_surfaces_codec_failure() {
        let keys = JwtKeys::new(&AppConfig::ephemeral().jwt);
        let h = header("Bearer not-a-token");
        assert!(matches!(
            resolve_principal(Some(&h), &keys),
            Err(AuthError::Token(TokenError::Malformed(_)))
        ));
    }
}
