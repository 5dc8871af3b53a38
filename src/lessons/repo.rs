use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{Lesson, LessonFields};
use crate::store::{PgStore, StoreError};

const LESSON_COLUMNS: &str = "id, course_id, name, description, video, created_at, updated_at";

#[async_trait]
pub trait LessonRepo: Send + Sync {
    /// `MissingReference` when the course does not exist.
    async fn create_lesson(&self, fields: LessonFields) -> Result<Lesson, StoreError>;
    async fn find_lesson(&self, id: Uuid) -> Result<Option<Lesson>, StoreError>;
    async fn list_lessons(&self, course_id: Uuid) -> Result<Vec<Lesson>, StoreError>;
    async fn update_lesson(&self, id: Uuid, fields: LessonFields) -> Result<Lesson, StoreError>;
    async fn delete_lesson(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
impl LessonRepo for PgStore {
    async fn create_lesson(&self, fields: LessonFields) -> Result<Lesson, StoreError> {
        let lesson = sqlx::query_as::<_, Lesson>(&format!(
            r#"
            INSERT INTO lessons (course_id, name, description, video)
            VALUES ($1, $2, $3, $4)
            RETURNING {LESSON_COLUMNS}
            "#
        ))
        .bind(fields.course_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.video)
        .fetch_one(self.pool())
        .await?;
        Ok(lesson)
    }

    async fn find_lesson(&self, id: Uuid) -> Result<Option<Lesson>, StoreError> {
        let lesson = sqlx::query_as::<_, Lesson>(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(lesson)
    }

    async fn list_lessons(&self, course_id: Uuid) -> Result<Vec<Lesson>, StoreError> {
        let rows = sqlx::query_as::<_, Lesson>(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE course_id = $1 ORDER BY created_at ASC"
        ))
        .bind(course_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn update_lesson(&self, id: Uuid, fields: LessonFields) -> Result<Lesson, StoreError> {
        let lesson = sqlx::query_as::<_, Lesson>(&format!(
            r#"
            UPDATE lessons
               SET course_id = $2, name = $3, description = $4, video = $5, updated_at = now()
             WHERE id = $1
            RETURNING {LESSON_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(fields.course_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.video)
        .fetch_one(self.pool())
        .await?;
        Ok(lesson)
    }

    async fn delete_lesson(&self, id: Uuid) -> Result<(), StoreError> {
        let done = sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
