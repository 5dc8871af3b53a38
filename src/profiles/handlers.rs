use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, info, instrument};

use super::repo_types::{Profile, ProfileFields};
use crate::{
    auth::{claims::Principal, handlers::active_user},
    courses::handlers::discard_upload,
    error::AppError,
    policy,
    state::AppState,
    store::StoreError,
    uploads::{FormData, MAX_UPLOAD_BYTES},
    validation::Violations,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(get_profile)
                .post(create_profile)
                .put(update_profile)
                .delete(delete_profile),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn profile_form(form: &FormData) -> Result<ProfileFields, AppError> {
    let mut errors = Violations::new();
    let first_name = form.text_or_empty("first_name");
    let last_name = form.text_or_empty("last_name");
    let phone = form.text_or_empty("phone");
    let address = form.text_or_empty("address");
    errors.required("first_name", &first_name);
    errors.required("last_name", &last_name);
    errors.required("phone", &phone);
    errors.required("address", &address);
    errors.finish()?;
    Ok(ProfileFields {
        first_name,
        last_name,
        phone,
        address,
        avatar: None,
    })
}

async fn save_avatar(state: &AppState, form: &mut FormData) -> Result<Option<String>, AppError> {
    let Some(file) = form.take_file("avatar") else {
        return Ok(None);
    };
    let path = state.uploads.save("avatar", file).await.map_err(|e| {
        error!(error = %e, "avatar upload failed");
        AppError::Internal(e)
    })?;
    Ok(Some(path))
}

#[instrument(skip(state, multipart))]
pub async fn create_profile(
    State(state): State<AppState>,
    principal: Principal,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    policy::AUTHENTICATED
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;

    active_user(&state, principal.user_id).await?;
    if state.profiles.find_profile(principal.user_id).await?.is_some() {
        return Err(AppError::Conflict("profile already exists".into()));
    }

    let mut form = FormData::read(multipart?).await?;
    let mut fields = profile_form(&form)?;
    fields.avatar = save_avatar(&state, &mut form).await?;

    let avatar = fields.avatar.clone();
    let profile = match state.profiles.create_profile(principal.user_id, fields).await {
        Ok(p) => p,
        Err(e) => {
            discard_upload(&state, avatar.as_deref()).await;
            return Err(match e {
                StoreError::Conflict(_) => AppError::Conflict("profile already exists".into()),
                StoreError::MissingReference => AppError::NotFound("user"),
                other => other.into(),
            });
        }
    };

    info!(profile_id = %profile.id, user_id = %principal.user_id, "profile created");
    Ok((StatusCode::CREATED, Json(profile)))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Profile>, AppError> {
    policy::AUTHENTICATED
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;

    state
        .profiles
        .find_profile(principal.user_id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("profile"))
}

#[instrument(skip(state, multipart))]
pub async fn update_profile(
    State(state): State<AppState>,
    principal: Principal,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Profile>, AppError> {
    policy::AUTHENTICATED
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;

    let existing = state
        .profiles
        .find_profile(principal.user_id)
        .await?
        .ok_or(AppError::NotFound("profile"))?;

    let mut form = FormData::read(multipart?).await?;
    let mut fields = profile_form(&form)?;
    fields.avatar = existing.avatar.clone();

    let mut replaced = None;
    if let Some(path) = save_avatar(&state, &mut form).await? {
        replaced = existing.avatar.clone();
        fields.avatar = Some(path);
    }

    let new_avatar = fields.avatar.clone();
    let profile = match state.profiles.update_profile(principal.user_id, fields).await {
        Ok(p) => p,
        Err(e) => {
            if new_avatar != existing.avatar {
                discard_upload(&state, new_avatar.as_deref()).await;
            }
            return Err(match e {
                StoreError::NotFound => AppError::NotFound("profile"),
                other => other.into(),
            });
        }
    };
    discard_upload(&state, replaced.as_deref()).await;

    info!(profile_id = %profile.id, "profile updated");
    Ok(Json(profile))
}

#[instrument(skip(state))]
pub async fn delete_profile(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<StatusCode, AppError> {
    policy::AUTHENTICATED
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;

    let existing = state
        .profiles
        .find_profile(principal.user_id)
        .await?
        .ok_or(AppError::NotFound("profile"))?;
    state
        .profiles
        .delete_profile(principal.user_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => AppError::NotFound("profile"),
            other => other.into(),
        })?;
    discard_upload(&state, existing.avatar.as_deref()).await;

    info!(user_id = %principal.user_id, "profile deleted");
    Ok(StatusCode::NO_CONTENT)
}
