use sqlx::PgPool;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;

use super::repo_types::{IdType, User};

const USER_COLUMNS: &str = "id, email, name, last_name, password_hash, role, active, \
     id_type, id_number, birth_date, password_changed_at, \
     reset_token_hash, reset_token_expires_at, created_at";

/// Candidate record for insertion. Fields arrive already normalized and
/// validated; the password is already hashed and the plaintext confirmation
/// never reaches this layer.
#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub last_name: String,
    pub password_hash: String,
    pub id_type: IdType,
    pub id_number: String,
    pub birth_date: Date,
}

fn conflict_from(err: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(ref db) = err {
        if db.code().as_deref() == Some("23505") {
            return match db.constraint() {
                Some("users_email_key") => {
                    ApiError::Conflict("This email is already registered".into())
                }
                Some("users_identity_document") => {
                    ApiError::Conflict("This ID is already registered".into())
                }
                _ => ApiError::Conflict("Duplicate value".into()),
            };
        }
    }
    err.into()
}

impl User {
    /// Active-only lookup used by every ordinary flow. Deactivated accounts
    /// behave as if they do not exist.
    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND active = TRUE"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    /// Active-only lookup by id; see `find_by_email`.
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND active = TRUE"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Admin accessor: sees deactivated records too.
    pub async fn find_by_id_any_status(
        db: &PgPool,
        id: Uuid,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Admin listing, any status.
    pub async fn list(db: &PgPool, limit: i64, offset: i64) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }

    pub async fn create(db: &PgPool, new: &NewUser) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, name, last_name, password_hash, id_type, id_number, birth_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.email)
        .bind(&new.name)
        .bind(&new.last_name)
        .bind(&new.password_hash)
        .bind(new.id_type)
        .bind(&new.id_number)
        .bind(new.birth_date)
        .fetch_one(db)
        .await
        .map_err(conflict_from)
    }

    /// Replaces the secret and stamps the change one second in the past, so a
    /// token signed immediately afterwards still reads as issued after the
    /// change. Any outstanding reset token dies with the old password.
    pub async fn update_password(
        db: &PgPool,
        id: Uuid,
        new_hash: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET password_hash = $2, \
             password_changed_at = now() - interval '1 second', \
             reset_token_hash = NULL, reset_token_expires_at = NULL \
             WHERE id = $1 AND active = TRUE \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(new_hash)
        .fetch_optional(db)
        .await
    }

    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET reset_token_hash = $2, reset_token_expires_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn clear_reset_token(db: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET reset_token_hash = NULL, reset_token_expires_at = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Single-statement consumption: the secret swap, the reset-field clear
    /// and the expiry check are one atomic write, so a concurrent second
    /// consumer of the same token observes `None`. `None` does not say
    /// whether the token was wrong, expired or never existed.
    pub async fn consume_reset_token(
        db: &PgPool,
        token_hash: &str,
        new_password_hash: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET password_hash = $2, \
             password_changed_at = now() - interval '1 second', \
             reset_token_hash = NULL, reset_token_expires_at = NULL \
             WHERE reset_token_hash = $1 AND reset_token_expires_at > now() AND active = TRUE \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(token_hash)
        .bind(new_password_hash)
        .fetch_optional(db)
        .await
    }

    /// Soft delete: the record stays, ordinary lookups stop seeing it.
    pub async fn deactivate(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Admin hard delete.
    pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whitelisted self-service profile update; absent fields keep their
    /// current value.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        last_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
             name = COALESCE($2, name), \
             last_name = COALESCE($3, last_name), \
             email = COALESCE($4, email) \
             WHERE id = $1 AND active = TRUE \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(last_name)
        .bind(email)
        .fetch_optional(db)
        .await
        .map_err(conflict_from)
    }
}
