use serde::Deserialize;

use super::repo_types::QuizFields;
use crate::{
    error::AppError,
    validation::{required_id, Violations},
};

/// Body of `POST /quiz` and `PUT /quiz/:id`.
#[derive(Debug, Deserialize)]
pub struct QuizPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Kept as text so a malformed id is reported as a field error.
    pub course_id: Option<String>,
}

impl QuizPayload {
    pub fn validate(self) -> Result<QuizFields, AppError> {
        let mut errors = Violations::new();
        let name = self.name.trim().to_string();
        let description = self.description.trim().to_string();
        errors.required("name", &name);
        errors.required("description", &description);
        let course_id = required_id(&mut errors, "course_id", self.course_id.as_deref());
        errors.finish()?;
        Ok(QuizFields {
            course_id: course_id.ok_or(AppError::NotFound("course"))?,
            name,
            description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn collects_every_missing_field() {
        let payload: QuizPayload = serde_json::from_str("{}").unwrap();
        let Err(AppError::Validation(fields)) = payload.validate() else {
            panic!("expected validation error");
        };
        let names: Vec<_> = fields.iter().map(|f| f.field).collect();
        assert_eq!(names, vec!["name", "description", "course_id"]);
    }

    #[test]
    fn trims_and_parses_course_reference() {
        let id = Uuid::new_v4();
        let payload: QuizPayload = serde_json::from_value(serde_json::json!({
            "name": "  Week 1 ",
            "description": "warm-up",
            "course_id": id.to_string(),
        }))
        .unwrap();
        let fields = payload.validate().unwrap();
        assert_eq!(fields.name, "Week 1");
        assert_eq!(fields.course_id, id);
    }
}
