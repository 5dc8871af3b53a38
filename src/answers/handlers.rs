use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::{dto::AnswerPayload, repo_types::Answer};
use crate::{
    auth::claims::Principal,
    error::AppError,
    policy::{self, parse_resource_id},
    quizzes::handlers::quiz_in_course,
    state::AppState,
    store::StoreError,
};

pub fn answer_routes() -> Router<AppState> {
    Router::new()
        .route("/answer", post(create_answer))
        .route("/answer/:id", put(update_answer).delete(delete_answer))
        .route(
            "/course/:id/quizzes/:quiz_id/answers",
            get(list_quiz_answers),
        )
}

fn answer_store_error(e: StoreError) -> AppError {
    match e {
        StoreError::NotFound => AppError::NotFound("answer"),
        StoreError::MissingReference => AppError::NotFound("quiz"),
        other => other.into(),
    }
}

#[instrument(skip(state, payload))]
pub async fn create_answer(
    State(state): State<AppState>,
    principal: Principal,
    payload: Result<Json<AnswerPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Answer>), AppError> {
    policy::ADMIN_ONLY
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;

    let Json(payload) = payload?;
    let fields = payload.validate()?;
    if state.quizzes.find_quiz(fields.quiz_id).await?.is_none() {
        return Err(AppError::NotFound("quiz"));
    }

    let answer = state
        .answers
        .create_answer(fields)
        .await
        .map_err(answer_store_error)?;

    info!(answer_id = %answer.id, quiz_id = %answer.quiz_id, "answer created");
    Ok((StatusCode::CREATED, Json(answer)))
}

#[instrument(skip(state, payload))]
pub async fn update_answer(
    State(state): State<AppState>,
    principal: Principal,
    Path(raw_id): Path<String>,
    payload: Result<Json<AnswerPayload>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    policy::ADMIN_ONLY
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;
    let id = parse_resource_id(&raw_id)?;
    if state.answers.find_answer(id).await?.is_none() {
        return Err(AppError::NotFound("answer"));
    }

    let Json(payload) = payload?;
    let fields = payload.validate()?;
    if state.quizzes.find_quiz(fields.quiz_id).await?.is_none() {
        return Err(AppError::NotFound("quiz"));
    }

    let answer = state
        .answers
        .update_answer(id, fields)
        .await
        .map_err(answer_store_error)?;

    info!(answer_id = %answer.id, "answer updated");
    Ok(Json(answer))
}

#[instrument(skip(state))]
pub async fn delete_answer(
    State(state): State<AppState>,
    principal: Principal,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, AppError> {
    policy::ADMIN_ONLY
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;
    let id = parse_resource_id(&raw_id)?;

    state
        .answers
        .delete_answer(id)
        .await
        .map_err(answer_store_error)?;

    info!(answer_id = %id, "answer deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_quiz_answers(
    State(state): State<AppState>,
    principal: Principal,
    Path((raw_course, raw_quiz)): Path<(String, String)>,
) -> Result<Json<Vec<Answer>>, AppError> {
    policy::ENROLLED
        .authorize(Some(&principal), Some(&raw_course), state.enrollments.as_ref())
        .await?;
    let quiz = quiz_in_course(&state, &raw_course, &raw_quiz).await?;
    Ok(Json(state.answers.list_answers(quiz.id).await?))
}
