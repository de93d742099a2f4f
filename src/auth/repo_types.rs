use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Authorization role, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
    Superadmin,
}

impl Default for Role {
    fn default() -> Self {
        Self::User
    }
}

/// Identity document kind; drives the format rule on `id_number`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "id_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IdType {
    NationalId,
    Passport,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 hash, never exposed in JSON
    pub role: Role,
    #[serde(skip_serializing)]
    pub active: bool,
    pub id_type: IdType,
    pub id_number: String,
    pub birth_date: Date,
    #[serde(skip_serializing)]
    pub password_changed_at: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl User {
    /// True when the password was changed after the token with issuance time
    /// `token_iat` (unix seconds) was signed. Such tokens are dead: the
    /// password change is the only session-invalidation mechanism we have.
    pub fn changed_password_after(&self, token_iat: i64) -> bool {
        match self.password_changed_at {
            Some(changed_at) => changed_at.unix_timestamp() > token_iat,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    fn user_changed_at(changed_at: Option<OffsetDateTime>) -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            name: "ada".into(),
            last_name: "lovelace".into(),
            password_hash: "$argon2id$fake".into(),
            role: Role::default(),
            active: true,
            id_type: IdType::Passport,
            id_number: "AB123456".into(),
            birth_date: Date::from_calendar_date(1990, Month::June, 1).unwrap(),
            password_changed_at: changed_at,
            reset_token_hash: None,
            reset_token_expires_at: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn never_changed_password_never_invalidates() {
        let user = user_changed_at(None);
        assert!(!user.changed_password_after(0));
    }

    #[test]
    fn token_issued_before_change_is_stale() {
        let now = OffsetDateTime::now_utc();
        let user = user_changed_at(Some(now));
        // token signed one hour before the change
        assert!(user.changed_password_after(now.unix_timestamp() - 3600));
        // token signed after the change is fine
        assert!(!user.changed_password_after(now.unix_timestamp() + 10));
    }

    #[test]
    fn one_second_skew_keeps_fresh_tokens_valid() {
        // update_password stores now() - 1s, so a token signed in the same
        // instant as the change still reads as issued after it
        let now = OffsetDateTime::now_utc();
        let user = user_changed_at(Some(now - time::Duration::seconds(1)));
        assert!(!user.changed_password_after(now.unix_timestamp()));
    }

    #[test]
    fn secret_fields_never_serialize() {
        let mut user = user_changed_at(Some(OffsetDateTime::now_utc()));
        user.reset_token_hash = Some("deadbeef".into());
        user.reset_token_expires_at = Some(OffsetDateTime::now_utc());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("reset_token"));
        assert!(!json.contains("deadbeef"));
        assert!(json.contains("a@x.com"));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Superadmin).unwrap(), "\"superadmin\"");
        assert_eq!(serde_json::to_string(&IdType::NationalId).unwrap(), "\"national_id\"");
    }
}
