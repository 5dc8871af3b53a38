use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{Course, CourseFields};
use crate::store::{PgStore, StoreError};

const COURSE_COLUMNS: &str =
    "id, owner_id, name, description, price, image, created_at, updated_at";

#[async_trait]
pub trait CourseRepo: Send + Sync {
    async fn create_course(&self, owner_id: Uuid, fields: CourseFields)
        -> Result<Course, StoreError>;
    async fn list_courses(&self) -> Result<Vec<Course>, StoreError>;
    async fn find_course(&self, id: Uuid) -> Result<Option<Course>, StoreError>;
    async fn update_course(&self, id: Uuid, fields: CourseFields) -> Result<Course, StoreError>;
    /// Removes the course together with its content and enrollments.
    async fn delete_course(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
impl CourseRepo for PgStore {
    async fn create_course(
        &self,
        owner_id: Uuid,
        fields: CourseFields,
    ) -> Result<Course, StoreError> {
        let course = sqlx::query_as::<_, Course>(&format!(
            r#"
            INSERT INTO courses (owner_id, name, description, price, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COURSE_COLUMNS}
            "#
        ))
        .bind(owner_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price)
        .bind(&fields.image)
        .fetch_one(self.pool())
        .await?;
        Ok(course)
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        let rows = sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses ORDER BY created_at ASC"
        ))
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn find_course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        let course = sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(course)
    }

    async fn update_course(&self, id: Uuid, fields: CourseFields) -> Result<Course, StoreError> {
        let course = sqlx::query_as::<_, Course>(&format!(
            r#"
            UPDATE courses
               SET name = $2, description = $3, price = $4, image = $5, updated_at = now()
             WHERE id = $1
            RETURNING {COURSE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price)
        .bind(&fields.image)
        .fetch_one(self.pool())
        .await?;
        Ok(course)
    }

    async fn delete_course(&self, id: Uuid) -> Result<(), StoreError> {
        let done = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
