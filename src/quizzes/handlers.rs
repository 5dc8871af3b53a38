use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::{dto::QuizPayload, repo_types::Quiz};
use crate::{
    auth::claims::Principal,
    courses::handlers::require_course,
    error::AppError,
    policy::{self, parse_resource_id},
    state::AppState,
    store::StoreError,
};

pub fn quiz_routes() -> Router<AppState> {
    Router::new()
        .route("/quiz", post(create_quiz))
        .route("/quiz/:id", put(update_quiz).delete(delete_quiz))
        .route("/course/:id/quizzes", get(list_course_quizzes))
        .route("/course/:id/quizzes/:quiz_id", get(get_course_quiz))
}

fn quiz_store_error(e: StoreError) -> AppError {
    match e {
        StoreError::NotFound => AppError::NotFound("quiz"),
        StoreError::MissingReference => AppError::NotFound("course"),
        other => other.into(),
    }
}

/// Loads a quiz and checks it hangs off the addressed course.
pub(crate) async fn quiz_in_course(
    state: &AppState,
    raw_course: &str,
    raw_quiz: &str,
) -> Result<Quiz, AppError> {
    let course_id = parse_resource_id(raw_course)?;
    let quiz_id = parse_resource_id(raw_quiz)?;
    match state.quizzes.find_quiz(quiz_id).await? {
        Some(quiz) if quiz.course_id == course_id => Ok(quiz),
        _ => Err(AppError::NotFound("quiz")),
    }
}

#[instrument(skip(state, payload))]
pub async fn create_quiz(
    State(state): State<AppState>,
    principal: Principal,
    payload: Result<Json<QuizPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Quiz>), AppError> {
    policy::ADMIN_ONLY
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;

    let Json(payload) = payload?;
    let fields = payload.validate()?;
    require_course(&state, fields.course_id).await?;

    let quiz = state
        .quizzes
        .create_quiz(fields)
        .await
        .map_err(quiz_store_error)?;

    info!(quiz_id = %quiz.id, course_id = %quiz.course_id, "quiz created");
    Ok((StatusCode::CREATED, Json(quiz)))
}

#[instrument(skip(state, payload))]
pub async fn update_quiz(
    State(state): State<AppState>,
    principal: Principal,
    Path(raw_id): Path<String>,
    payload: Result<Json<QuizPayload>, JsonRejection>,
) -> Result<Json<Quiz>, AppError> {
    policy::ADMIN_ONLY
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;
    let id = parse_resource_id(&raw_id)?;
    if state.quizzes.find_quiz(id).await?.is_none() {
        return Err(AppError::NotFound("quiz"));
    }

    let Json(payload) = payload?;
    let fields = payload.validate()?;
    require_course(&state, fields.course_id).await?;

    let quiz = state
        .quizzes
        .update_quiz(id, fields)
        .await
        .map_err(quiz_store_error)?;

    info!(quiz_id = %quiz.id, "quiz updated");
    Ok(Json(quiz))
}

#[instrument(skip(state))]
pub async fn delete_quiz(
    State(state): State<AppState>,
    principal: Principal,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, AppError> {
    policy::ADMIN_ONLY
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;
    let id = parse_resource_id(&raw_id)?;

    state.quizzes.delete_quiz(id).await.map_err(quiz_store_error)?;

    info!(quiz_id = %id, "quiz deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_course_quizzes(
    State(state): State<AppState>,
    principal: Principal,
    Path(raw_course): Path<String>,
) -> Result<Json<Vec<Quiz>>, AppError> {
    let access = policy::ENROLLED
        .authorize(Some(&principal), Some(&raw_course), state.enrollments.as_ref())
        .await?;
    let course_id = match access.course_id {
        Some(id) => id,
        None => parse_resource_id(&raw_course)?,
    };

    require_course(&state, course_id).await?;
    Ok(Json(state.quizzes.list_quizzes(course_id).await?))
}

#[instrument(skip(state))]
pub async fn get_course_quiz(
    State(state): State<AppState>,
    principal: Principal,
    Path((raw_course, raw_quiz)): Path<(String, String)>,
) -> Result<Json<Quiz>, AppError> {
    policy::ENROLLED
        .authorize(Some(&principal), Some(&raw_course), state.enrollments.as_ref())
        .await?;
    Ok(Json(quiz_in_course(&state, &raw_course, &raw_quiz).await?))
}
