use serde::Deserialize;

use super::repo_types::AnswerFields;
use crate::{
    error::AppError,
    validation::{required_id, Violations},
};

/// Body of `POST /answer` and `PUT /answer/:id`.
#[derive(Debug, Deserialize)]
pub struct AnswerPayload {
    #[serde(default)]
    pub content: String,
    pub quiz_id: Option<String>,
}

impl AnswerPayload {
    pub fn validate(self) -> Result<AnswerFields, AppError> {
        let mut errors = Violations::new();
        let content = self.content.trim().to_string();
        errors.required("content", &content);
        let quiz_id = required_id(&mut errors, "quiz_id", self.quiz_id.as_deref());
        errors.finish()?;
        Ok(AnswerFields {
            quiz_id: quiz_id.ok_or(AppError::NotFound("quiz"))?,
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_quiz_reference_is_a_field_error() {
        let payload: AnswerPayload =
            serde_json::from_str(r#"{"content":"42","quiz_id":"not-a-uuid"}"#).unwrap();
        let Err(AppError::Validation(fields)) = payload.validate() else {
            panic!("expected validation error");
        };
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "quiz_id");
        assert_eq!(fields[0].constraint, "uuid");
    }
}
