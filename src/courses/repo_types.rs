use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Course {
    pub id: Uuid,
    pub owner_id: Option<Uuid>, // instructor; nulled if the account row goes away
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Writable course columns, used for both insert and full update.
#[derive(Debug, Clone)]
pub struct CourseFields {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image: Option<String>,
}
