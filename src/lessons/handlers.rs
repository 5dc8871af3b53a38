use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{error, info, instrument};

use super::repo_types::{Lesson, LessonFields};
use crate::{
    auth::claims::Principal,
    courses::handlers::{discard_upload, require_course},
    error::AppError,
    policy::{self, parse_resource_id},
    state::AppState,
    store::StoreError,
    uploads::{FormData, MAX_UPLOAD_BYTES},
    validation::{optional_id, required_id, Violations},
};

pub fn lesson_routes() -> Router<AppState> {
    Router::new()
        .route("/lesson", post(create_lesson))
        .route("/lesson/:id", put(update_lesson).delete(delete_lesson))
        .route("/course/:id/lessons", get(list_course_lessons))
        .route("/course/:id/lessons/:lesson_id", get(get_course_lesson))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn lesson_store_error(e: StoreError) -> AppError {
    match e {
        StoreError::NotFound => AppError::NotFound("lesson"),
        StoreError::MissingReference => AppError::NotFound("course"),
        other => other.into(),
    }
}

#[instrument(skip(state, multipart))]
pub async fn create_lesson(
    State(state): State<AppState>,
    principal: Principal,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Lesson>), AppError> {
    policy::ADMIN_ONLY
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;

    let mut form = FormData::read(multipart?).await?;
    let mut errors = Violations::new();
    let name = form.text_or_empty("name");
    let description = form.text_or_empty("description");
    errors.required("name", &name);
    errors.required("description", &description);
    let course_id = required_id(&mut errors, "course_id", form.text("course_id"));
    errors.finish()?;
    let Some(course_id) = course_id else {
        return Err(AppError::NotFound("course"));
    };
    require_course(&state, course_id).await?;

    let mut video = None;
    if let Some(file) = form.take_file("video") {
        video = Some(state.uploads.save("lesson", file).await.map_err(|e| {
            error!(error = %e, "lesson video upload failed");
            AppError::Internal(e)
        })?);
    }

    let fields = LessonFields {
        course_id,
        name,
        description,
        video: video.clone(),
    };
    let lesson = match state.lessons.create_lesson(fields).await {
        Ok(l) => l,
        Err(e) => {
            discard_upload(&state, video.as_deref()).await;
            return Err(lesson_store_error(e));
        }
    };

    info!(lesson_id = %lesson.id, course_id = %lesson.course_id, "lesson created");
    Ok((StatusCode::CREATED, Json(lesson)))
}

/// Partial update: blank fields keep their current value.
#[instrument(skip(state, multipart))]
pub async fn update_lesson(
    State(state): State<AppState>,
    principal: Principal,
    Path(raw_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Lesson>, AppError> {
    policy::ADMIN_ONLY
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;
    let id = parse_resource_id(&raw_id)?;
    let existing = state
        .lessons
        .find_lesson(id)
        .await?
        .ok_or(AppError::NotFound("lesson"))?;

    let mut form = FormData::read(multipart?).await?;
    let mut errors = Violations::new();
    let course_id = optional_id(&mut errors, "course_id", form.text("course_id"));
    errors.finish()?;

    let mut fields = LessonFields::from(&existing);
    if let Some(name) = form.text("name") {
        fields.name = name.to_string();
    }
    if let Some(description) = form.text("description") {
        fields.description = description.to_string();
    }
    if let Some(course_id) = course_id {
        require_course(&state, course_id).await?;
        fields.course_id = course_id;
    }

    let mut replaced = None;
    if let Some(file) = form.take_file("video") {
        let path = state.uploads.save("lesson", file).await.map_err(|e| {
            error!(error = %e, "lesson video upload failed");
            AppError::Internal(e)
        })?;
        replaced = existing.video.clone();
        fields.video = Some(path);
    }

    let new_video = fields.video.clone();
    let lesson = match state.lessons.update_lesson(id, fields).await {
        Ok(l) => l,
        Err(e) => {
            if new_video != existing.video {
                discard_upload(&state, new_video.as_deref()).await;
            }
            return Err(lesson_store_error(e));
        }
    };
    discard_upload(&state, replaced.as_deref()).await;

    info!(lesson_id = %lesson.id, "lesson updated");
    Ok(Json(lesson))
}

#[instrument(skip(state))]
pub async fn delete_lesson(
    State(state): State<AppState>,
    principal: Principal,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, AppError> {
    policy::ADMIN_ONLY
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;
    let id = parse_resource_id(&raw_id)?;
    let existing = state
        .lessons
        .find_lesson(id)
        .await?
        .ok_or(AppError::NotFound("lesson"))?;

    state.lessons.delete_lesson(id).await.map_err(lesson_store_error)?;
    discard_upload(&state, existing.video.as_deref()).await;

    info!(lesson_id = %id, "lesson deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_course_lessons(
    State(state): State<AppState>,
    principal: Principal,
    Path(raw_course): Path<String>,
) -> Result<Json<Vec<Lesson>>, AppError> {
    let access = policy::ENROLLED
        .authorize(Some(&principal), Some(&raw_course), state.enrollments.as_ref())
        .await?;
    let course_id = match access.course_id {
        Some(id) => id,
        None => parse_resource_id(&raw_course)?,
    };

    require_course(&state, course_id).await?;
    Ok(Json(state.lessons.list_lessons(course_id).await?))
}

#[instrument(skip(state))]
pub async fn get_course_lesson(
    State(state): State<AppState>,
    principal: Principal,
    Path((raw_course, raw_lesson)): Path<(String, String)>,
) -> Result<Json<Lesson>, AppError> {
    policy::ENROLLED
        .authorize(Some(&principal), Some(&raw_course), state.enrollments.as_ref())
        .await?;
    let course_id = parse_resource_id(&raw_course)?;
    let lesson_id = parse_resource_id(&raw_lesson)?;

    match state.lessons.find_lesson(lesson_id).await? {
        Some(lesson) if lesson.course_id == course_id => Ok(Json(lesson)),
        _ => Err(AppError::NotFound("lesson")),
    }
}
