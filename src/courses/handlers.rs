use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::repo_types::{Course, CourseFields};
use crate::{
    auth::claims::Principal,
    error::AppError,
    policy::{self, parse_resource_id},
    state::AppState,
    store::StoreError,
    uploads::{FormData, MAX_UPLOAD_BYTES},
    validation::{parse_price, Violations},
};

pub fn course_routes() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses))
        .route("/course", post(create_course))
        .route(
            "/course/:id",
            get(get_course).put(update_course).delete(delete_course),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Validated text fields of a course form; the image is handled separately.
fn course_form(form: &FormData) -> Result<CourseFields, AppError> {
    let mut errors = Violations::new();
    let name = form.text_or_empty("name");
    let description = form.text_or_empty("description");
    errors.required("name", &name);
    errors.required("description", &description);
    let price = parse_price(form.text("price"), 0.0, &mut errors);
    errors.finish()?;
    Ok(CourseFields {
        name,
        description,
        price,
        image: None,
    })
}

#[instrument(skip(state))]
pub async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>, AppError> {
    Ok(Json(state.courses.list_courses().await?))
}

#[instrument(skip(state))]
pub async fn get_course(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Course>, AppError> {
    let id = parse_resource_id(&raw_id)?;
    state
        .courses
        .find_course(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("course"))
}

#[instrument(skip(state, multipart))]
pub async fn create_course(
    State(state): State<AppState>,
    principal: Principal,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Course>), AppError> {
    policy::ADMIN_ONLY
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;

    let mut form = FormData::read(multipart?).await?;
    let mut fields = course_form(&form)?;

    if let Some(file) = form.take_file("image") {
        let path = state.uploads.save("course", file).await.map_err(|e| {
            error!(error = %e, "course image upload failed");
            AppError::Internal(e)
        })?;
        fields.image = Some(path);
    }

    let image = fields.image.clone();
    let course = match state.courses.create_course(principal.user_id, fields).await {
        Ok(c) => c,
        Err(e) => {
            discard_upload(&state, image.as_deref()).await;
            return Err(match e {
                StoreError::MissingReference => AppError::NotFound("user"),
                other => other.into(),
            });
        }
    };

    info!(course_id = %course.id, owner_id = %principal.user_id, "course created");
    Ok((StatusCode::CREATED, Json(course)))
}

#[instrument(skip(state, multipart))]
pub async fn update_course(
    State(state): State<AppState>,
    principal: Principal,
    Path(raw_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Course>, AppError> {
    policy::ADMIN_ONLY
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;
    let id = parse_resource_id(&raw_id)?;

    let existing = state
        .courses
        .find_course(id)
        .await?
        .ok_or(AppError::NotFound("course"))?;

    let mut form = FormData::read(multipart?).await?;
    let mut fields = course_form(&form)?;
    fields.image = existing.image.clone();

    let mut replaced = None;
    if let Some(file) = form.take_file("image") {
        let path = state.uploads.save("course", file).await.map_err(|e| {
            error!(error = %e, "course image upload failed");
            AppError::Internal(e)
        })?;
        replaced = existing.image.clone();
        fields.image = Some(path);
    }

    let new_image = fields.image.clone();
    let course = match state.courses.update_course(id, fields).await {
        Ok(c) => c,
        Err(e) => {
            if replaced.is_some() {
                discard_upload(&state, new_image.as_deref()).await;
            }
            return Err(match e {
                StoreError::NotFound => AppError::NotFound("course"),
                other => other.into(),
            });
        }
    };
    discard_upload(&state, replaced.as_deref()).await;

    info!(course_id = %course.id, "course updated");
    Ok(Json(course))
}

#[instrument(skip(state))]
pub async fn delete_course(
    State(state): State<AppState>,
    principal: Principal,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, AppError> {
    policy::ADMIN_ONLY
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;
    let id = parse_resource_id(&raw_id)?;

    let existing = state
        .courses
        .find_course(id)
        .await?
        .ok_or(AppError::NotFound("course"))?;
    // lesson rows go with the course; their videos have to be removed here
    let videos: Vec<String> = state
        .lessons
        .list_lessons(id)
        .await?
        .into_iter()
        .filter_map(|l| l.video)
        .collect();

    state.courses.delete_course(id).await.map_err(|e| match e {
        StoreError::NotFound => AppError::NotFound("course"),
        other => other.into(),
    })?;
    discard_upload(&state, existing.image.as_deref()).await;
    for video in &videos {
        discard_upload(&state, Some(video)).await;
    }

    info!(course_id = %id, videos = videos.len(), "course deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Loads a course referenced by content or enrollment routes.
pub(crate) async fn require_course(state: &AppState, id: Uuid) -> Result<Course, AppError> {
    state
        .courses
        .find_course(id)
        .await?
        .ok_or(AppError::NotFound("course"))
}

/// Best-effort removal of a file that is no longer referenced.
pub(crate) async fn discard_upload(state: &AppState, path: Option<&str>) {
    if let Some(path) = path {
        if let Err(e) = state.uploads.remove(path).await {
            warn!(error = %e, path, "failed to remove stale upload");
        }
    }
}
