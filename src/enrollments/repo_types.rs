use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::courses::repo_types::Course;

/// Join record authorizing a user to read a course's protected content.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// An enrollment of the current user together with its course.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentWithCourse {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub course: Course,
}

/// Enrolled user's public fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Student {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
}

/// An enrollment in a course together with the enrolled user.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentWithUser {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub student: Student,
}
