use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Lesson {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    pub description: String,
    pub video: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct LessonFields {
    pub course_id: Uuid,
    pub name: String,
    pub description: String,
    pub video: Option<String>,
}

impl From<&Lesson> for LessonFields {
    fn from(l: &Lesson) -> Self {
        Self {
            course_id: l.course_id,
            name: l.name.clone(),
            description: l.description.clone(),
            video: l.video.clone(),
        }
    }
}
