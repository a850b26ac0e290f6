//! Bearer-token identity and the request gates built on it.
//!
//! Tokens are issued by the external identity provider (HS256, shared
//! secret). This module only verifies them.

use crate::core::{AppError, AppState};
use crate::entities::User;
use crate::repositories::{MembershipRepository, Read, UserRepository};
use axum::extract::State;
use axum::{body::Body, extract::Request, http, http::Response, middleware::Next};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Claims this service reads from a provider token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
}

/// Verified caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
}

pub struct IdentityVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl IdentityVerifier {
    pub fn new(secret: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    #[instrument(skip(self, token))]
    pub fn verify(&self, token: &str) -> Result<Identity, AppError> {
        debug!("Verifying bearer token");
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            warn!("Rejected bearer token: {:?}", e.kind());
            AppError::unauthorized("Invalid or expired token")
        })?;
        if data.claims.sub.trim().is_empty() {
            warn!("Token without subject");
            return Err(AppError::unauthorized("Invalid or expired token"));
        }
        Ok(Identity {
            user_id: data.claims.sub,
            email: data.claims.email,
        })
    }
}

fn bearer_token(req: &Request) -> Result<&str, AppError> {
    let header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| {
            warn!("Missing authorization header");
            AppError::unauthorized("Missing authorization header")
        })?
        .to_str()
        .map_err(|_| {
            warn!("Invalid authorization header format");
            AppError::unauthorized("Malformed authorization header")
        })?;

    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => {
            warn!("Authorization header is not a bearer token");
            Err(AppError::unauthorized("Malformed authorization header"))
        }
    }
}

/// Verifies the token and inserts [`Identity`]. Used where no profile exists yet.
#[instrument(skip(state, req, next))]
pub async fn identity_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    debug!("Running identity middleware");
    let identity = state.identity.verify(bearer_token(&req)?)?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Verifies the token, loads the caller's profile and inserts both
/// [`Identity`] and [`User`].
#[instrument(skip(state, req, next))]
pub async fn authentication_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    debug!("Running authentication middleware");
    let identity = state.identity.verify(bearer_token(&req)?)?;

    let mut conn = state.db.pool().acquire().await?;
    let current_user = match UserRepository::read(&mut conn, identity.user_id.as_str()).await? {
        Some(user) => {
            debug!(user_id = %user.id, "User authenticated");
            user
        }
        None => {
            warn!(user_id = %identity.user_id, "Identity has no provisioned profile");
            return Err(AppError::unauthorized("Profile not provisioned")
                .with_details("register with POST /auth/register first"));
        }
    };
    drop(conn);

    req.extensions_mut().insert(identity);
    req.extensions_mut().insert(current_user);
    Ok(next.run(req).await)
}

/// Rejects callers that are not members of the group named in the path.
///
/// Services re-check membership on their own; this gate only fails fast.
#[instrument(skip(state, req, next))]
pub async fn group_membership_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    debug!("Running group membership middleware");
    let current_user = req
        .extensions()
        .get::<User>()
        .ok_or_else(|| {
            warn!("User not found in request extensions");
            AppError::unauthorized("User not authenticated")
        })?
        .clone();

    let group_id: i64 = req
        .uri()
        .path()
        .split('/')
        .find_map(|segment| segment.parse::<i64>().ok())
        .ok_or_else(|| {
            warn!("Group ID not found in path: {}", req.uri().path());
            AppError::bad_request("Group ID not found in path")
        })?;

    let mut conn = state.db.pool().acquire().await?;
    if crate::repositories::GroupRepository::read(&mut conn, &group_id)
        .await?
        .is_none()
    {
        warn!(group_id, "Group not found");
        return Err(AppError::not_found("Group not found"));
    }
    if !MembershipRepository::exists(&mut conn, &current_user.id, group_id).await? {
        warn!(user_id = %current_user.id, group_id, "User is not a member of the group");
        return Err(AppError::forbidden("You are not a member of this group"));
    }
    drop(conn);

    info!(user_id = %current_user.id, group_id, "Group membership verified");
    Ok(next.run(req).await)
}
