use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{Profile, ProfileFields};
use crate::store::{PgStore, StoreError};

const PROFILE_COLUMNS: &str =
    "id, user_id, first_name, last_name, phone, address, avatar, created_at, updated_at";

/// Profiles are keyed by their owner; each user has at most one.
#[async_trait]
pub trait ProfileRepo: Send + Sync {
    /// `Conflict` when the user already has a profile.
    async fn create_profile(&self, user_id: Uuid, fields: ProfileFields)
        -> Result<Profile, StoreError>;
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError>;
    async fn update_profile(&self, user_id: Uuid, fields: ProfileFields)
        -> Result<Profile, StoreError>;
    async fn delete_profile(&self, user_id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
impl ProfileRepo for PgStore {
    async fn create_profile(
        &self,
        user_id: Uuid,
        fields: ProfileFields,
    ) -> Result<Profile, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            r#"
            INSERT INTO profiles (user_id, first_name, last_name, phone, address, avatar)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.phone)
        .bind(&fields.address)
        .bind(&fields.avatar)
        .fetch_one(self.pool())
        .await?;
        Ok(profile)
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(profile)
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        fields: ProfileFields,
    ) -> Result<Profile, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            r#"
            UPDATE profiles
               SET first_name = $2, last_name = $3, phone = $4, address = $5,
                   avatar = $6, updated_at = now()
             WHERE user_id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.phone)
        .bind(&fields.address)
        .bind(&fields.avatar)
        .fetch_one(self.pool())
        .await?;
        Ok(profile)
    }

    async fn delete_profile(&self, user_id: Uuid) -> Result<(), StoreError> {
        let done = sqlx::query("DELETE FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
