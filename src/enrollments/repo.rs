use async_trait::async_trait;
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Enrollment, EnrollmentWithCourse, EnrollmentWithUser, Student};
use crate::{
    courses::repo_types::Course,
    store::{PgStore, StoreError},
};

#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("already enrolled in this course")]
    AlreadyEnrolled,
    #[error("not enrolled in this course")]
    NotEnrolled,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persisted many-to-many relation between users and courses.
///
/// At most one row exists per `(user_id, course_id)`. The existence check in
/// `create_enrollment` only produces the friendly error; the unique index is
/// what keeps concurrent enrolls from producing two rows.
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn exists(&self, user_id: Uuid, course_id: Uuid) -> Result<bool, StoreError>;
    async fn create_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Enrollment, EnrollmentError>;
    async fn delete_enrollment(&self, user_id: Uuid, course_id: Uuid)
        -> Result<(), EnrollmentError>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<EnrollmentWithCourse>, StoreError>;
    async fn list_for_course(&self, course_id: Uuid)
        -> Result<Vec<EnrollmentWithUser>, StoreError>;
}

#[derive(Debug, FromRow)]
struct EnrollmentCourseRow {
    id: Uuid,
    user_id: Uuid,
    course_id: Uuid,
    created_at: OffsetDateTime,
    owner_id: Option<Uuid>,
    name: String,
    description: String,
    price: f64,
    image: Option<String>,
    course_created_at: OffsetDateTime,
    course_updated_at: OffsetDateTime,
}

impl From<EnrollmentCourseRow> for EnrollmentWithCourse {
    fn from(r: EnrollmentCourseRow) -> Self {
        Self {
            enrollment: Enrollment {
                id: r.id,
                user_id: r.user_id,
                course_id: r.course_id,
                created_at: r.created_at,
            },
            course: Course {
                id: r.course_id,
                owner_id: r.owner_id,
                name: r.name,
                description: r.description,
                price: r.price,
                image: r.image,
                created_at: r.course_created_at,
                updated_at: r.course_updated_at,
            },
        }
    }
}

#[derive(Debug, FromRow)]
struct EnrollmentUserRow {
    id: Uuid,
    user_id: Uuid,
    course_id: Uuid,
    created_at: OffsetDateTime,
    username: String,
    email: String,
}

impl From<EnrollmentUserRow> for EnrollmentWithUser {
    fn from(r: EnrollmentUserRow) -> Self {
        Self {
            enrollment: Enrollment {
                id: r.id,
                user_id: r.user_id,
                course_id: r.course_id,
                created_at: r.created_at,
            },
            student: Student {
                user_id: r.user_id,
                username: r.username,
                email: r.email,
            },
        }
    }
}

#[async_trait]
impl EnrollmentStore for PgStore {
    async fn exists(&self, user_id: Uuid, course_id: Uuid) -> Result<bool, StoreError> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(self.pool())
        .await?;
        Ok(found)
    }

    async fn create_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Enrollment, EnrollmentError> {
        if self.exists(user_id, course_id).await? {
            return Err(EnrollmentError::AlreadyEnrolled);
        }
        let inserted = sqlx::query_as::<_, Enrollment>(
            r#"
            INSERT INTO enrollments (user_id, course_id)
            VALUES ($1, $2)
            RETURNING id, user_id, course_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(self.pool())
        .await;

        match inserted.map_err(StoreError::from) {
            Ok(enrollment) => Ok(enrollment),
            Err(StoreError::Conflict(_)) => Err(EnrollmentError::AlreadyEnrolled),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<(), EnrollmentError> {
        let done = sqlx::query("DELETE FROM enrollments WHERE user_id = $1 AND course_id = $2")
            .bind(user_id)
            .bind(course_id)
            .execute(self.pool())
            .await
            .map_err(StoreError::from)?;
        if done.rows_affected() == 0 {
            return Err(EnrollmentError::NotEnrolled);
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<EnrollmentWithCourse>, StoreError> {
        let rows = sqlx::query_as::<_, EnrollmentCourseRow>(
            r#"
            SELECT e.id, e.user_id, e.course_id, e.created_at,
                   c.owner_id, c.name, c.description, c.price, c.image,
                   c.created_at AS course_created_at, c.updated_at AS course_updated_at
              FROM enrollments e
              JOIN courses c ON c.id = e.course_id
             WHERE e.user_id = $1
             ORDER BY e.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_for_course(
        &self,
        course_id: Uuid,
    ) -> Result<Vec<EnrollmentWithUser>, StoreError> {
        let rows = sqlx::query_as::<_, EnrollmentUserRow>(
            r#"
            SELECT e.id, e.user_id, e.course_id, e.created_at, u.username, u.email
              FROM enrollments e
              JOIN users u ON u.id = e.user_id
             WHERE e.course_id = $1 AND u.deleted_at IS NULL
             ORDER BY e.created_at ASC
            "#,
        )
        .bind(course_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
