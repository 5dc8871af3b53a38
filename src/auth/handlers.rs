use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::{Principal, Role},
        dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest},
        password::{hash_password, password_constraint, verify_password},
        repo_types::{NewUser, User},
    },
    error::AppError,
    policy,
    state::AppState,
    store::StoreError,
    validation::{is_valid_email, Violations},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).delete(delete_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let Json(mut payload) = payload?;
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();

    let mut errors = Violations::new();
    if errors.required("email", &payload.email) {
        errors.check("email", is_valid_email(&payload.email), "email");
    }
    errors.required("username", &payload.username);
    if let Some(constraint) = password_constraint(&payload.password) {
        errors.push("password", constraint);
    }
    let role = match payload.role.as_deref().map(str::trim) {
        None | Some("") => Role::default(),
        Some(raw) => raw.parse::<Role>().unwrap_or_else(|e| {
            errors.push("role", e.to_string());
            Role::default()
        }),
    };
    if !errors.is_empty() {
        warn!("registration rejected by validation");
    }
    errors.finish()?;

    if state.users.find_user_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::Conflict("email already registered".into()));
    }
    if state
        .users
        .find_user_by_username(&payload.username)
        .await?
        .is_some()
    {
        warn!(username = %payload.username, "username already taken");
        return Err(AppError::Conflict("username already taken".into()));
    }

    let password_hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        AppError::Internal(e.into())
    })?;

    let user = state
        .users
        .create_user(NewUser {
            email: payload.email,
            username: payload.username,
            password_hash,
            role,
        })
        .await
        .map_err(|e| match e {
            // lost a race with a concurrent registration
            StoreError::Conflict(_) => AppError::Conflict("email or username already taken".into()),
            other => other.into(),
        })?;

    info!(user_id = %user.id, email = %user.email, role = %user.role, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(mut payload) = payload?;
    payload.email = payload.email.trim().to_lowercase();

    let mut errors = Violations::new();
    if errors.required("email", &payload.email) {
        errors.check("email", is_valid_email(&payload.email), "email");
    }
    errors.required("password", &payload.password);
    errors.finish()?;

    let user = match state.users.find_user_by_email(&payload.email).await? {
        Some(u) if u.is_active() => u,
        _ => {
            warn!(email = %payload.email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        }
    };

    let ok = verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!(error = %e, user_id = %user.id, "verify_password failed");
        AppError::Internal(e.into())
    })?;
    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = state.jwt.issue(user.id, user.role)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<PublicUser>, AppError> {
    policy::AUTHENTICATED
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;

    Ok(Json(active_user(&state, principal.user_id).await?.into()))
}

/// Loads the account behind a token; soft-deleted accounts are `NotFound`.
pub(crate) async fn active_user(state: &AppState, user_id: Uuid) -> Result<User, AppError> {
    match state.users.find_user(user_id).await? {
        Some(user) if user.is_active() => Ok(user),
        _ => Err(AppError::NotFound("user")),
    }
}

#[instrument(skip(state))]
pub async fn delete_me(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<StatusCode, AppError> {
    policy::AUTHENTICATED
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;

    state
        .users
        .soft_delete_user(principal.user_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => AppError::NotFound("user"),
            other => other.into(),
        })?;
    info!(user_id = %principal.user_id, "user soft-deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_never_contains_password_hash() {
        let user = crate::auth::repo_types::User {
            id: uuid::Uuid::new_v4(),
            email: "test@example.com".into(),
            username: "tester".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::User,
            created_at: time::OffsetDateTime::now_utc(),
            deleted_at: None,
        };
        let raw = serde_json::to_string(&user).unwrap();
        assert!(!raw.contains("argon2"));

        let public: PublicUser = user.into();
        let json = serde_json::to_string(&public).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("\"role\":\"user\""));
    }
}
