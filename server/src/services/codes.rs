//! Short human-shareable codes for users and groups.

use crate::core::AppError;
use crate::repositories::{GroupRepository, UserRepository};
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use sqlx::SqliteConnection;
use tracing::{error, warn};

pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Attempts before a collision is reported as an internal failure.
pub const MAX_CODE_ATTEMPTS: usize = 5;

lazy_static! {
    pub static ref USER_CODE_RE: Regex = Regex::new(r"^[A-Za-z0-9]{7}$").unwrap();
    pub static ref GROUP_CODE_RE: Regex = Regex::new(r"^[A-Za-z0-9]{6}$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    User,
    Group,
}

impl CodeKind {
    pub fn length(self) -> usize {
        match self {
            CodeKind::User => 7,
            CodeKind::Group => 6,
        }
    }
}

pub fn generate_code(kind: CodeKind) -> String {
    let mut rng = rand::thread_rng();
    (0..kind.length())
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Generates a code not yet used by any row of `kind`.
///
/// Runs on the caller's unit of work, whose write permit keeps the check and
/// the following insert together.
pub async fn unique_code(conn: &mut SqliteConnection, kind: CodeKind) -> Result<String, AppError> {
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = generate_code(kind);
        let taken = match kind {
            CodeKind::User => UserRepository::code_exists(conn, &code).await?,
            CodeKind::Group => GroupRepository::code_exists(conn, &code).await?,
        };
        if !taken {
            return Ok(code);
        }
        warn!(?kind, attempt, "Code collision, retrying");
    }
    error!(?kind, "No free code after {} attempts", MAX_CODE_ATTEMPTS);
    Err(AppError::internal_server_error("Could not allocate a unique code")
        .with_details(format!("{kind:?} code space exhausted after {MAX_CODE_ATTEMPTS} attempts")))
}

/// Codes are generated uppercase; lookups accept either case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
