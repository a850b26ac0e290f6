use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Raw `lists` row. Totals are stored as decimal text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListRow {
    pub id: i64,
    pub expected_total: String,
    pub actual_total: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct List {
    pub id: i64,
    pub expected_total: Decimal,
    pub actual_total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ListRow> for List {
    fn from(row: ListRow) -> Self {
        Self {
            id: row.id,
            expected_total: decode_amount(&row.expected_total).unwrap_or(Decimal::ZERO),
            actual_total: decode_amount(&row.actual_total).unwrap_or(Decimal::ZERO),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// The single owner of a list.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "owner_type", content = "owner_id", rename_all = "lowercase")]
pub enum ListOwner {
    User(String),
    Group(i64),
}

/// Parses a stored amount, treating malformed text as absent.
pub fn decode_amount(raw: &str) -> Option<Decimal> {
    match Decimal::from_str(raw.trim()) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(raw, error = %e, "Malformed stored amount, treating as absent");
            None
        }
    }
}

/// Canonical text form used for storage.
pub fn encode_amount(value: Decimal) -> String {
    value.to_string()
}
