//! Core module - infrastructure shared by every layer
//!
//! - Identity verification and request gates
//! - Configuration
//! - Database pool and unit of work
//! - Error taxonomy and response envelope
//! - Application state

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod extract;
pub mod response;
pub mod state;

pub use auth::{
    Identity, IdentityVerifier, authentication_middleware, group_membership_middleware,
    identity_middleware,
};
pub use config::Config;
pub use database::{Database, UnitOfWork};
pub use error::{AppError, ErrorKind};
pub use extract::ValidatedJson;
pub use response::ApiResponse;
pub use state::AppState;
