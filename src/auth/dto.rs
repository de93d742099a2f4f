use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::{IdType, Role, User};

/// Request body for signup. Role is never accepted from the client; every
/// signup starts as a plain user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub birth_date: Date,
    pub id_type: IdType,
    pub id_number: String,
}

/// Request body for login. Fields are optional so that a missing one is our
/// 400 with a message, not a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub password_current: String,
    pub password: String,
    pub password_confirm: String,
}

/// Public part of the user returned to clients. Built from a `User`, so
/// secret material cannot end up here by construction.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub id_type: IdType,
    pub id_number: String,
    pub birth_date: Date,
    pub created_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            role: user.role,
            id_type: user.id_type,
            id_number: user.id_number.clone(),
            birth_date: user.birth_date,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserData {
    pub user: PublicUser,
}

/// Success envelope carrying a fresh bearer token.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub status: &'static str,
    pub token: String,
    pub data: UserData,
}

/// Success envelope for acknowledgements without a token.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub status: &'static str,
    pub message: &'static str,
}
