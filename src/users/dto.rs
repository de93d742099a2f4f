use serde::{Deserialize, Serialize};

use crate::auth::dto::{PublicUser, UserData};

/// Self-service profile update. Password fields are listed only so their
/// presence can be rejected with a pointer to the password route.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub status: &'static str,
    pub data: UserData,
}

#[derive(Debug, Serialize)]
pub struct UsersData {
    pub users: Vec<PublicUser>,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub status: &'static str,
    pub results: usize,
    pub data: UsersData,
}
