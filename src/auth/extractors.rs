use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{request::Parts, Extensions, HeaderMap},
};
use tracing::warn;

use crate::{error::ApiError, state::AppState};

use super::{
    jwt::JwtKeys,
    repo_types::{Role, User},
};

// One message for every token failure mode (bad signature, expiry, stale
// password, missing or deactivated user), so a caller cannot probe which
// case it hit. Only the plainly-visible absence of the header differs.
const NOT_LOGGED_IN: &str = "You are not logged in! Please log in to get access.";
const SESSION_INVALID: &str = "Invalid or expired session. Please log in again.";

/// Authenticates the request: bearer token → verified claims → live user →
/// stale-password check. Yields the full resolved record for downstream
/// handlers.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthenticated(NOT_LOGGED_IN))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthenticated(NOT_LOGGED_IN))?;

        // Signature and expiry are checked before any claim is trusted.
        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            ApiError::Unauthenticated(SESSION_INVALID)
        })?;

        // Active-only lookup: a deactivated account is an unauthenticated one.
        let user = User::find_by_id(&state.db, claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token subject no longer exists or is inactive");
                ApiError::Unauthenticated(SESSION_INVALID)
            })?;

        if user.changed_password_after(claims.iat as i64) {
            warn!(user_id = %user.id, "token issued before last password change");
            return Err(ApiError::Unauthenticated(SESSION_INVALID));
        }

        Ok(AuthUser(user))
    }
}

/// Static per-route role check: 403 unless the authenticated role is in the
/// allow-set.
pub fn require_role(user: &User, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        warn!(user_id = %user.id, role = ?user.role, "role not permitted");
        Err(ApiError::Forbidden)
    }
}

/// Caller's network address for rate-limit keys: first X-Forwarded-For hop
/// when present (we sit behind a proxy in production), else the socket peer.
pub fn client_ip_from_parts(headers: &HeaderMap, extensions: &Extensions) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip_from_parts(
            &parts.headers,
            &parts.extensions,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Month, OffsetDateTime};
    use uuid::Uuid;

    use crate::auth::repo_types::IdType;

    fn user_with_role(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            name: "ada".into(),
            last_name: "lovelace".into(),
            password_hash: "$argon2id$fake".into(),
            role,
            active: true,
            id_type: IdType::Passport,
            id_number: "AB123456".into(),
            birth_date: Date::from_calendar_date(1990, Month::June, 1).unwrap(),
            password_changed_at: None,
            reset_token_hash: None,
            reset_token_expires_at: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn role_gate_admits_allowed_roles_only() {
        let admin = user_with_role(Role::Admin);
        require_role(&admin, &[Role::Admin, Role::Superadmin]).expect("admin allowed");

        let user = user_with_role(Role::User);
        let err = require_role(&user, &[Role::Admin, Role::Superadmin]).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
    }

    #[test]
    fn forwarded_header_wins_over_socket_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4321))));
        let ip = client_ip_from_parts(&headers, &extensions);
        assert_eq!(ip, "203.0.113.9".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn falls_back_to_socket_peer_then_unspecified() {
        let headers = HeaderMap::new();
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 5], 4321))));
        assert_eq!(
            client_ip_from_parts(&headers, &extensions),
            "192.168.1.5".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            client_ip_from_parts(&HeaderMap::new(), &Extensions::new()),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
    }

    #[test]
    fn garbage_forwarded_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "not-an-ip".parse().unwrap());
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 2], 1))));
        assert_eq!(
            client_ip_from_parts(&headers, &extensions),
            "10.0.0.2".parse::<IpAddr>().unwrap()
        );
    }
}
