use axum::{
    extract::{FromRef, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{patch, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    error::ApiError,
    ratelimit::sensitive_key,
    state::AppState,
};

use super::{
    cookie,
    dto::{
        AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest,
        MessageResponse, PublicUser, ResetPasswordRequest, SignupRequest, UserData,
    },
    extractors::{AuthUser, ClientIp},
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo::NewUser,
    repo_types::User,
    reset,
    validate::{validate_new_password, validate_signup},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password/:token", patch(reset_password))
}

pub fn password_routes() -> Router<AppState> {
    Router::new().route("/me/password", patch(change_password))
}

/// Signs a token for `user` and builds the success envelope plus the
/// mirroring HTTP-only cookie. The public view strips all secret fields.
fn issue_session(state: &AppState, user: &User, status: StatusCode) -> Result<Response, ApiError> {
    let keys = JwtKeys::from_ref(state);
    let token = keys.sign(user.id)?;
    let cookie = cookie::jwt_cookie(&token, keys.expires, state.config.cookie_secure);
    let body = Json(AuthResponse {
        status: "success",
        token,
        data: UserData {
            user: PublicUser::from(user),
        },
    });
    Ok((status, [(header::SET_COOKIE, cookie)], body).into_response())
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(mut payload): Json<SignupRequest>,
) -> Result<Response, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    state
        .sensitive_limiter
        .check(&sensitive_key(ip, &payload.email))?;

    payload.name = payload.name.trim().to_lowercase();
    payload.last_name = payload.last_name.trim().to_lowercase();
    payload.id_number = payload.id_number.trim().to_uppercase();
    validate_signup(&payload)?;

    let password_hash = hash_password(&payload.password)?;
    // role defaults to plain user, active to true; neither is client-settable
    let user = User::create(
        &state.db,
        &NewUser {
            email: payload.email,
            name: payload.name,
            last_name: payload.last_name,
            password_hash,
            id_type: payload.id_type,
            id_number: payload.id_number,
            birth_date: payload.birth_date,
        },
    )
    .await?;

    info!(user_id = %user.id, email = %user.email, "user signed up");
    issue_session(&state, &user, StatusCode::CREATED)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let (email, password) = match (payload.email, payload.password) {
        (Some(e), Some(p)) if !e.is_empty() && !p.is_empty() => (e.trim().to_lowercase(), p),
        _ => {
            return Err(ApiError::BadRequest(
                "Please provide email and password!".into(),
            ))
        }
    };
    state.sensitive_limiter.check(&sensitive_key(ip, &email))?;

    // Unknown email and wrong password take the same exit.
    let user = match User::find_by_email(&state.db, &email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "login for unknown or inactive account");
            return Err(ApiError::InvalidCredentials);
        }
    };
    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    info!(user_id = %user.id, "user logged in");
    issue_session(&state, &user, StatusCode::OK)
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    state.sensitive_limiter.check(&sensitive_key(ip, &email))?;

    // Policy: the missing-account case is an explicit 404. For a uniform
    // anti-enumeration acknowledgement, return the success message here too.
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("There is no user with that email address".into()))?;

    let (raw_token, token_hash) = reset::generate();
    User::set_reset_token(&state.db, user.id, &token_hash, reset::expiry()).await?;

    let reset_url = format!(
        "{}/api/v1/auth/reset-password/{}",
        state.config.public_url, raw_token
    );
    let message = format!(
        "You requested a password reset.\n\
         Submit a PATCH request with your new password and passwordConfirm to:\n\
         {}\n\n\
         If you didn't request this, please ignore this email.",
        reset_url
    );

    match state
        .mailer
        .send(
            &user.email,
            "Your password reset token (valid for 10 min)",
            &message,
        )
        .await
    {
        Ok(()) => {
            info!(user_id = %user.id, "reset token sent");
            Ok(Json(MessageResponse {
                status: "success",
                message: "Token sent to email!",
            }))
        }
        Err(e) => {
            // The token is undeliverable; leave no dangling reset state behind.
            error!(error = %e, user_id = %user.id, "reset email failed, clearing token");
            if let Err(clear_err) = User::clear_reset_token(&state.db, user.id).await {
                error!(error = %clear_err, user_id = %user.id, "failed to clear reset token");
            }
            Err(ApiError::Delivery)
        }
    }
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Response, ApiError> {
    state.sensitive_limiter.check(&sensitive_key(ip, ""))?;
    validate_new_password(&payload.password, &payload.password_confirm)?;

    let token_hash = reset::hash_token(&token);
    let new_hash = hash_password(&payload.password)?;
    let user = User::consume_reset_token(&state.db, &token_hash, &new_hash)
        .await?
        .ok_or(ApiError::InvalidOrExpiredToken)?;

    info!(user_id = %user.id, "password reset via token");
    // auto-login with a fresh token
    issue_session(&state, &user, StatusCode::OK)
}

#[instrument(skip(state, user, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    AuthUser(user): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Response, ApiError> {
    state
        .sensitive_limiter
        .check(&sensitive_key(ip, &user.email))?;

    if !verify_password(&payload.password_current, &user.password_hash)? {
        warn!(user_id = %user.id, "password change with wrong current password");
        return Err(ApiError::InvalidCredentials);
    }
    validate_new_password(&payload.password, &payload.password_confirm)?;

    let new_hash = hash_password(&payload.password)?;
    let user = User::update_password(&state.db, user.id, &new_hash)
        .await?
        .ok_or(ApiError::Unauthenticated(
            "Invalid or expired session. Please log in again.",
        ))?;

    info!(user_id = %user.id, "password changed");
    // every earlier token is now stale; hand back a fresh one
    issue_session(&state, &user, StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_response_serializes_to_envelope() {
        let json = serde_json::to_value(MessageResponse {
            status: "success",
            message: "Token sent to email!",
        })
        .unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "Token sent to email!");
    }
}
