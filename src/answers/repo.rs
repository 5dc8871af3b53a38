use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{Answer, AnswerFields};
use crate::store::{PgStore, StoreError};

const ANSWER_COLUMNS: &str = "id, quiz_id, content, created_at, updated_at";

#[async_trait]
pub trait AnswerRepo: Send + Sync {
    /// `MissingReference` when the quiz does not exist.
    async fn create_answer(&self, fields: AnswerFields) -> Result<Answer, StoreError>;
    async fn find_answer(&self, id: Uuid) -> Result<Option<Answer>, StoreError>;
    async fn list_answers(&self, quiz_id: Uuid) -> Result<Vec<Answer>, StoreError>;
    async fn update_answer(&self, id: Uuid, fields: AnswerFields) -> Result<Answer, StoreError>;
    async fn delete_answer(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
impl AnswerRepo for PgStore {
    async fn create_answer(&self, fields: AnswerFields) -> Result<Answer, StoreError> {
        let answer = sqlx::query_as::<_, Answer>(&format!(
            r#"
            INSERT INTO answers (quiz_id, content)
            VALUES ($1, $2)
            RETURNING {ANSWER_COLUMNS}
            "#
        ))
        .bind(fields.quiz_id)
        .bind(&fields.content)
        .fetch_one(self.pool())
        .await?;
        Ok(answer)
    }

    async fn find_answer(&self, id: Uuid) -> Result<Option<Answer>, StoreError> {
        let answer = sqlx::query_as::<_, Answer>(&format!(
            "SELECT {ANSWER_COLUMNS} FROM answers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(answer)
    }

    async fn list_answers(&self, quiz_id: Uuid) -> Result<Vec<Answer>, StoreError> {
        let rows = sqlx::query_as::<_, Answer>(&format!(
            "SELECT {ANSWER_COLUMNS} FROM answers WHERE quiz_id = $1 ORDER BY created_at ASC"
        ))
        .bind(quiz_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn update_answer(&self, id: Uuid, fields: AnswerFields) -> Result<Answer, StoreError> {
        let answer = sqlx::query_as::<_, Answer>(&format!(
            r#"
            UPDATE answers
               SET quiz_id = $2, content = $3, updated_at = now()
             WHERE id = $1
            RETURNING {ANSWER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(fields.quiz_id)
        .bind(&fields.content)
        .fetch_one(self.pool())
        .await?;
        Ok(answer)
    }

    async fn delete_answer(&self, id: Uuid) -> Result<(), StoreError> {
        let done = sqlx::query("DELETE FROM answers WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
