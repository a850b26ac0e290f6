//! Handlers module - axum glue between HTTP and the services
//!
//! Handlers extract path, body and the authenticated [`User`](crate::entities::User),
//! call one service operation and wrap the result in the response envelope.

pub mod auth;
pub mod groups;
pub mod invitations;
pub mod items;
pub mod upload;
pub mod users;

use crate::core::ApiResponse;
use tracing::instrument;

/// Health check
#[instrument]
pub async fn root() -> ApiResponse<&'static str> {
    ApiResponse::ok("ok", "Server is running")
}
