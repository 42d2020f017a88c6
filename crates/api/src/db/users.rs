//! User repository.

use certprep_core::{Email, UserId};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::PgPool;

use super::{Page, RepositoryError};
use crate::models::User;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    display_name: Option<String>,
    attributes: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            display_name: row.display_name,
            attributes: row.attributes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const USER_COLUMNS: &str = "id, email, display_name, attributes, created_at, updated_at";

/// Profile changes requested by the user.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    /// `Some(None)` clears the display name.
    pub display_name: Option<Option<String>>,
    /// Shallow-merged into the stored attributes.
    pub attributes: Option<Map<String, Value>>,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert the user on first sight, or refresh the email from the latest claims.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_from_identity(
        &self,
        id: &UserId,
        email: &Email,
    ) -> Result<User, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO certprep.user AS u (id, email)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE
                SET email = EXCLUDED.email,
                    updated_at = CASE WHEN u.email = EXCLUDED.email
                                      THEN u.updated_at ELSE NOW() END
            RETURNING {USER_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(email.as_str())
            .fetch_one(self.pool)
            .await?;

        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM certprep.user WHERE id = $1");

        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    /// Apply a profile update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_profile(
        &self,
        id: &UserId,
        update: ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let set_display_name = update.display_name.is_some();
        let display_name = update.display_name.flatten();
        let patch = Value::Object(update.attributes.unwrap_or_default());

        let sql = format!(
            r"
            UPDATE certprep.user
            SET display_name = CASE WHEN $2 THEN $3 ELSE display_name END,
                attributes = attributes || $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(set_display_name)
            .bind(display_name)
            .bind(patch)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// List users, newest first, optionally filtered by email substring.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        email_contains: Option<&str>,
        page: Page,
    ) -> Result<Vec<User>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {USER_COLUMNS}
            FROM certprep.user
            WHERE ($1::TEXT IS NULL OR strpos(email, lower($1)) > 0)
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "
        );

        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email_contains)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM certprep.user")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
