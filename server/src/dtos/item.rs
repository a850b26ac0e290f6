//! Item DTOs and boundary parsing of prices.

use crate::core::AppError;
use crate::dtos::UserSnippet;
use crate::entities::{Item, ItemStatus};
use crate::services::ledger::Totals;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ItemDTO {
    pub id: i64,
    pub list_id: i64,
    pub item_name: String,
    pub item_quantity: i64,
    pub item_price: Option<Decimal>,
    pub item_status: ItemStatus,
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_by: Option<UserSnippet>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Item> for ItemDTO {
    fn from(value: Item) -> Self {
        Self {
            id: value.id,
            list_id: value.list_id,
            item_name: value.item_name,
            item_quantity: value.item_quantity,
            item_price: value.item_price,
            item_status: value.item_status,
            user_id: value.user_id,
            added_by: None,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl ItemDTO {
    pub fn with_author(mut self, author: Option<UserSnippet>) -> Self {
        self.added_by = author;
        self
    }
}

/// A price as sent by a client: a JSON number, a numeric string, `null`, or
/// missing. Anything else is kept as `Malformed` so the caller can decide.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PriceInput {
    #[default]
    Absent,
    Null,
    Amount(Decimal),
    Malformed(String),
}

/// What a write should do with the stored price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceChange {
    Keep,
    Set(Option<Decimal>),
}

impl PriceInput {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => PriceInput::Null,
            Value::Number(n) => Self::parse(&n.to_string()),
            Value::String(s) if s.trim().is_empty() => PriceInput::Null,
            Value::String(s) => Self::parse(s),
            other => PriceInput::Malformed(other.to_string()),
        }
    }

    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map(PriceInput::Amount)
            .unwrap_or_else(|_| PriceInput::Malformed(raw.to_string()))
    }

    /// Negative amounts are rejected. Malformed input is stored as no price
    /// and reported through `warnings`.
    pub fn resolve(self, warnings: &mut Vec<String>) -> Result<PriceChange, AppError> {
        match self {
            PriceInput::Absent => Ok(PriceChange::Keep),
            PriceInput::Null => Ok(PriceChange::Set(None)),
            PriceInput::Amount(value) if value < Decimal::ZERO => Err(AppError::bad_request(
                "item_price must not be negative",
            )
            .with_details(value.to_string())),
            PriceInput::Amount(value) => Ok(PriceChange::Set(Some(value))),
            PriceInput::Malformed(raw) => {
                warn!(raw = %raw, "Unparseable item_price, storing no price");
                warnings.push(format!(
                    "item_price '{}' could not be parsed and was stored as no price",
                    raw
                ));
                Ok(PriceChange::Set(None))
            }
        }
    }
}

impl<'de> Deserialize<'de> for PriceInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(PriceInput::from_json(&value))
    }
}

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct CreateItemDTO {
    #[validate(length(min = 1, max = 200, message = "item_name must be 1-200 characters"))]
    pub item_name: String,
    #[validate(range(min = 1, message = "item_quantity must be a positive integer"))]
    pub item_quantity: i64,
    #[serde(default)]
    pub item_price: PriceInput,
    pub item_status: Option<ItemStatus>,
}

#[derive(Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateItemDTO {
    #[validate(length(min = 1, max = 200, message = "item_name must be 1-200 characters"))]
    pub item_name: Option<String>,
    #[validate(range(min = 1, message = "item_quantity must be a positive integer"))]
    pub item_quantity: Option<i64>,
    #[serde(default)]
    pub item_price: PriceInput,
    pub item_status: Option<ItemStatus>,
}

impl UpdateItemDTO {
    pub fn is_empty(&self) -> bool {
        self.item_name.is_none()
            && self.item_quantity.is_none()
            && self.item_price == PriceInput::Absent
            && self.item_status.is_none()
    }
}

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct UpdateItemStatusDTO {
    pub item_status: ItemStatus,
}

/// Result of any item write: the item plus the recomputed list totals.
#[derive(Serialize, Debug, Clone)]
pub struct ItemMutationDTO {
    pub item: ItemDTO,
    pub updated_totals: Totals,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ClearedListDTO {
    pub list_id: i64,
    pub deleted_count: u64,
    pub updated_totals: Totals,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn price(value: Value) -> PriceInput {
        PriceInput::from_json(&value)
    }

    #[test]
    fn accepts_numbers_and_numeric_strings() {
        assert_eq!(price(json!(3.99)), PriceInput::Amount(Decimal::new(399, 2)));
        assert_eq!(price(json!("3.99")), PriceInput::Amount(Decimal::new(399, 2)));
        assert_eq!(price(json!(" 12 ")), PriceInput::Amount(Decimal::new(12, 0)));
        assert_eq!(price(json!(null)), PriceInput::Null);
        assert_eq!(price(json!("")), PriceInput::Null);
    }

    #[test]
    fn malformed_price_is_stored_empty_with_a_warning() {
        let mut warnings = Vec::new();
        let change = price(json!("abc")).resolve(&mut warnings).unwrap();
        assert_eq!(change, PriceChange::Set(None));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn negative_price_is_rejected() {
        let mut warnings = Vec::new();
        assert!(price(json!(-1)).resolve(&mut warnings).is_err());
    }

    #[test]
    fn missing_field_keeps_price() {
        let dto: UpdateItemDTO = serde_json::from_value(json!({ "item_name": "Bread" })).unwrap();
        assert_eq!(dto.item_price, PriceInput::Absent);
        let dto: UpdateItemDTO = serde_json::from_value(json!({ "item_price": null })).unwrap();
        assert_eq!(dto.item_price, PriceInput::Null);
        assert!(!dto.is_empty());
    }
}
