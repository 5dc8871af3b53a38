use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::{
    repo::EnrollmentError,
    repo_types::{Enrollment, EnrollmentWithCourse, Student},
};
use crate::{
    auth::{claims::Principal, handlers::active_user},
    error::AppError,
    policy::{self, parse_resource_id},
    state::AppState,
    store::StoreError,
};

pub fn enrollment_routes() -> Router<AppState> {
    Router::new()
        .route("/course/:id/enroll", post(enroll).delete(unenroll))
        .route("/course/:id/students", get(list_students))
        .route("/enrollments", get(list_my_enrollments))
}

#[derive(Debug, Serialize)]
pub struct CourseStudents {
    pub course_id: uuid::Uuid,
    pub course: String,
    pub students: Vec<Student>,
}

#[instrument(skip(state))]
pub async fn enroll(
    State(state): State<AppState>,
    principal: Principal,
    Path(raw_id): Path<String>,
) -> Result<(StatusCode, Json<Enrollment>), AppError> {
    policy::AUTHENTICATED
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;
    let course_id = parse_resource_id(&raw_id)?;

    active_user(&state, principal.user_id).await?;
    if state.courses.find_course(course_id).await?.is_none() {
        return Err(AppError::NotFound("course"));
    }

    let enrollment = state
        .enrollments
        .create_enrollment(principal.user_id, course_id)
        .await
        .map_err(|e| match e {
            EnrollmentError::AlreadyEnrolled => {
                warn!(user_id = %principal.user_id, %course_id, "duplicate enrollment");
                AppError::Conflict("already enrolled in this course".into())
            }
            EnrollmentError::NotEnrolled => AppError::NotFound("enrollment"),
            // course removed between the lookup and the insert
            EnrollmentError::Store(StoreError::MissingReference) => AppError::NotFound("course"),
            EnrollmentError::Store(e) => e.into(),
        })?;

    info!(user_id = %principal.user_id, %course_id, "enrolled");
    Ok((StatusCode::CREATED, Json(enrollment)))
}

#[instrument(skip(state))]
pub async fn unenroll(
    State(state): State<AppState>,
    principal: Principal,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, AppError> {
    policy::AUTHENTICATED
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;
    let course_id = parse_resource_id(&raw_id)?;

    state
        .enrollments
        .delete_enrollment(principal.user_id, course_id)
        .await
        .map_err(|e| match e {
            EnrollmentError::NotEnrolled | EnrollmentError::AlreadyEnrolled => {
                AppError::NotFound("enrollment")
            }
            EnrollmentError::Store(e) => e.into(),
        })?;

    info!(user_id = %principal.user_id, %course_id, "unenrolled");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_my_enrollments(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<EnrollmentWithCourse>>, AppError> {
    policy::AUTHENTICATED
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;
    let items = state.enrollments.list_for_user(principal.user_id).await?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn list_students(
    State(state): State<AppState>,
    principal: Principal,
    Path(raw_id): Path<String>,
) -> Result<Json<CourseStudents>, AppError> {
    policy::ADMIN_ONLY
        .authorize(Some(&principal), None, state.enrollments.as_ref())
        .await?;
    let course_id = parse_resource_id(&raw_id)?;

    let course = state
        .courses
        .find_course(course_id)
        .await?
        .ok_or(AppError::NotFound("course"))?;
    let students = state
        .enrollments
        .list_for_course(course_id)
        .await?
        .into_iter()
        .map(|e| e.student)
        .collect();

    Ok(Json(CourseStudents {
        course_id,
        course: course.name,
        students,
    }))
}
