use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{PublicUser, UserData},
        extractors::{require_role, AuthUser},
        repo_types::{Role, User},
        validate,
    },
    error::ApiError,
    state::AppState,
};

use super::dto::{ListQuery, UpdateMeRequest, UserResponse, UsersData, UsersResponse};

const ADMIN_ROLES: &[Role] = &[Role::Admin, Role::Superadmin];

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).patch(update_me).delete(delete_me))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user).delete(delete_user))
}

fn user_envelope(user: &User) -> Json<UserResponse> {
    Json(UserResponse {
        status: "success",
        data: UserData {
            user: PublicUser::from(user),
        },
    })
}

#[instrument(skip(user))]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    user_envelope(&user)
}

#[instrument(skip(state, user, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(mut payload): Json<UpdateMeRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if payload.password.is_some() || payload.password_confirm.is_some() {
        return Err(ApiError::BadRequest(
            "Cannot update password from this route. Please use /me/password".into(),
        ));
    }

    if let Some(name) = payload.name.as_mut() {
        *name = name.trim().to_lowercase();
        validate::validate_name("name", name)?;
    }
    if let Some(last_name) = payload.last_name.as_mut() {
        *last_name = last_name.trim().to_lowercase();
        validate::validate_name("last name", last_name)?;
    }
    if let Some(email) = payload.email.as_mut() {
        *email = email.trim().to_lowercase();
        if !validate::is_valid_email(email) {
            return Err(ApiError::Validation("Please provide a valid email".into()));
        }
    }

    let updated = User::update_profile(
        &state.db,
        user.id,
        payload.name.as_deref(),
        payload.last_name.as_deref(),
        payload.email.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("No user found with that ID".into()))?;

    info!(user_id = %updated.id, "profile updated");
    Ok(user_envelope(&updated))
}

#[instrument(skip(state, user))]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<StatusCode, ApiError> {
    User::deactivate(&state.db, user.id).await?;
    info!(user_id = %user.id, "account deactivated");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, admin))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(admin): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<UsersResponse>, ApiError> {
    require_role(&admin, ADMIN_ROLES)?;
    let limit = query.limit.clamp(1, 500);
    let users = User::list(&state.db, limit, query.offset.max(0)).await?;
    let users: Vec<PublicUser> = users.iter().map(PublicUser::from).collect();
    Ok(Json(UsersResponse {
        status: "success",
        results: users.len(),
        data: UsersData { users },
    }))
}

#[instrument(skip(state, admin))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(admin): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    require_role(&admin, ADMIN_ROLES)?;
    // admin path: deactivated accounts are visible here
    let user = User::find_by_id_any_status(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user found with that ID".into()))?;
    Ok(user_envelope(&user))
}

#[instrument(skip(state, admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(admin): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_role(&admin, ADMIN_ROLES)?;
    let deleted = User::delete(&state.db, id).await?;
    if !deleted {
        return Err(ApiError::NotFound("No user found with that ID".into()));
    }
    info!(user_id = %id, admin_id = %admin.id, "user hard-deleted");
    Ok(StatusCode::NO_CONTENT)
}
