//! Caller identity and client keys.
//!
//! Token handling happens in front of this server. The gateway forwards
//! the authenticated user's ID in [`USER_ID_HEADER`], which is resolved
//! against the store on each request.

use actix_web::HttpRequest;
use geoinfo_database::Store;
use geoinfo_incident_models::{ProfessionalProfile, RoleKind, User};

use crate::error::ApiError;

/// Header carrying the authenticated user's ID.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// The calling user, if the request names one.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] if the header is malformed or names
/// an unknown or inactive user.
pub async fn caller(req: &HttpRequest, store: &dyn Store) -> Result<Option<User>, ApiError> {
    let Some(value) = req.headers().get(USER_ID_HEADER) else {
        return Ok(None);
    };
    let id: i64 = value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("Malformed {USER_ID_HEADER} header")))?;

    match store.user(id).await? {
        Some(user) if user.active => Ok(Some(user)),
        Some(_) => Err(ApiError::Unauthorized(format!("User {id} is inactive"))),
        None => Err(ApiError::Unauthorized(format!("Unknown user {id}"))),
    }
}

/// The calling user, who must hold `role`.
///
/// # Errors
///
/// * [`ApiError::Unauthorized`] if the request names no valid user
/// * [`ApiError::Forbidden`] if the user has another role
pub async fn require(
    req: &HttpRequest,
    store: &dyn Store,
    role: RoleKind,
) -> Result<User, ApiError> {
    let user = caller(req, store)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?;
    let kind = user.role.kind();
    if kind != role {
        return Err(ApiError::Forbidden(format!(
            "Role {kind} may not use this endpoint, {role} required"
        )));
    }
    Ok(user)
}

/// The calling professional and their attachment.
///
/// # Errors
///
/// As [`require`] with [`RoleKind::Professional`].
pub async fn professional(
    req: &HttpRequest,
    store: &dyn Store,
) -> Result<(User, ProfessionalProfile), ApiError> {
    let user = require(req, store, RoleKind::Professional).await?;
    let profile = user
        .professional()
        .cloned()
        .ok_or_else(|| ApiError::Forbidden("Missing professional profile".to_string()))?;
    Ok((user, profile))
}

/// Key used to rate-limit a client: the first `X-Forwarded-For` entry,
/// else `X-Real-IP`, else the peer address.
#[must_use]
pub fn client_key(req: &HttpRequest) -> String {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    header("X-Forwarded-For")
        .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
        .filter(|v| !v.is_empty())
        .or_else(|| header("X-Real-IP").map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
        .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use actix_web::test::TestRequest;

    use super::*;

    fn peer() -> SocketAddr {
        "192.168.1.9:5000".parse().unwrap()
    }

    #[test]
    fn forwarded_for_wins() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", " 41.250.1.2, 10.0.0.1"))
            .insert_header(("X-Real-IP", "10.0.0.7"))
            .peer_addr(peer())
            .to_http_request();
        assert_eq!(client_key(&req), "41.250.1.2");
    }

    #[test]
    fn real_ip_then_peer() {
        let req = TestRequest::default()
            .insert_header(("X-Real-IP", "10.0.0.7"))
            .peer_addr(peer())
            .to_http_request();
        assert_eq!(client_key(&req), "10.0.0.7");

        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", ""))
            .peer_addr(peer())
            .to_http_request();
        assert_eq!(client_key(&req), "192.168.1.9");
    }
}
