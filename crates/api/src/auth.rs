//! Caller identity supplied by the authentication gateway.
//!
//! The gateway in front of this service authenticates the caller and forwards
//! the result as headers. Handlers take [`Authenticated`] to receive the
//! resulting [`Actor`].

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::{Role, UserId};
use domain::Actor;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The actor making the request.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Actor);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers).map(Authenticated)
    }
}

/// Reads the actor from the identity headers. A missing role means `user`.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let user_id = header_str(headers, USER_ID_HEADER)?
        .ok_or_else(|| ApiError::Unauthorized("Missing user identity".to_string()))?
        .parse::<UserId>()
        .map_err(|_| ApiError::Unauthorized("Invalid user identity".to_string()))?;

    let role = match header_str(headers, USER_ROLE_HEADER)? {
        Some(role) => role
            .parse::<Role>()
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?,
        None => Role::default(),
    };

    Ok(Actor::new(user_id, role))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|s| Some(s.trim()))
            .map_err(|_| ApiError::Unauthorized(format!("Malformed {name} header"))),
    }
}
