//! Bearer-token session extraction.
//!
//! Credential storage, session issuance, and deriving a user's
//! deterministic smart-contract wallet address from their device-bound
//! credential are all an external collaborator's job (see the engine's
//! scope notes) — a real deployment sits this service behind a session
//! layer that has already done that resolution. This extractor stands in
//! for that layer: it recognizes the `Authorization: Bearer <user
//! id>:<wallet address>` header shape, following the `Bearer` handling in
//! `zkpf-x402`'s header parsing, rather than re-deriving the wallet address
//! itself.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub struct AuthenticatedUser {
    pub user_id: String,
    pub wallet_address: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Authorization header must use the Bearer scheme"))?
            .trim();

        let (user_id, wallet_address) = token
            .split_once(':')
            .ok_or_else(|| unauthorized("bearer token must be '<user id>:<wallet address>'"))?;

        if user_id.is_empty() || wallet_address.is_empty() {
            return Err(unauthorized("bearer token must be '<user id>:<wallet address>'"));
        }

        Ok(AuthenticatedUser {
            user_id: user_id.to_string(),
            wallet_address: wallet_address.to_string(),
        })
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, message.to_string()).into_response()
}
