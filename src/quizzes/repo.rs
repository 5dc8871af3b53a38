use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{Quiz, QuizFields};
use crate::store::{PgStore, StoreError};

const QUIZ_COLUMNS: &str = "id, course_id, name, description, created_at, updated_at";

#[async_trait]
pub trait QuizRepo: Send + Sync {
    /// `MissingReference` when the course does not exist.
    async fn create_quiz(&self, fields: QuizFields) -> Result<Quiz, StoreError>;
    async fn find_quiz(&self, id: Uuid) -> Result<Option<Quiz>, StoreError>;
    async fn list_quizzes(&self, course_id: Uuid) -> Result<Vec<Quiz>, StoreError>;
    async fn update_quiz(&self, id: Uuid, fields: QuizFields) -> Result<Quiz, StoreError>;
    /// Removes the quiz and its answers.
    async fn delete_quiz(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
impl QuizRepo for PgStore {
    async fn create_quiz(&self, fields: QuizFields) -> Result<Quiz, StoreError> {
        let quiz = sqlx::query_as::<_, Quiz>(&format!(
            r#"
            INSERT INTO quizzes (course_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING {QUIZ_COLUMNS}
            "#
        ))
        .bind(fields.course_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .fetch_one(self.pool())
        .await?;
        Ok(quiz)
    }

    async fn find_quiz(&self, id: Uuid) -> Result<Option<Quiz>, StoreError> {
        let quiz = sqlx::query_as::<_, Quiz>(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(quiz)
    }

    async fn list_quizzes(&self, course_id: Uuid) -> Result<Vec<Quiz>, StoreError> {
        let rows = sqlx::query_as::<_, Quiz>(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE course_id = $1 ORDER BY created_at ASC"
        ))
        .bind(course_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn update_quiz(&self, id: Uuid, fields: QuizFields) -> Result<Quiz, StoreError> {
        let quiz = sqlx::query_as::<_, Quiz>(&format!(
            r#"
            UPDATE quizzes
               SET course_id = $2, name = $3, description = $4, updated_at = now()
             WHERE id = $1
            RETURNING {QUIZ_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(fields.course_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .fetch_one(self.pool())
        .await?;
        Ok(quiz)
    }

    async fn delete_quiz(&self, id: Uuid) -> Result<(), StoreError> {
        let done = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
