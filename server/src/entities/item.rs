use super::enums::ItemStatus;
use super::list::decode_amount;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Raw `items` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRow {
    pub id: i64,
    pub list_id: i64,
    pub item_name: String,
    pub item_quantity: i64,
    pub item_price: Option<String>,
    pub item_status: ItemStatus,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Item {
    pub id: i64,
    pub list_id: i64,
    pub item_name: String,
    pub item_quantity: i64,
    pub item_price: Option<Decimal>,
    pub item_status: ItemStatus,
    /// The user who added or last touched the item.
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            list_id: row.list_id,
            item_name: row.item_name,
            item_quantity: row.item_quantity,
            item_price: row.item_price.as_deref().and_then(decode_amount),
            item_status: row.item_status,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
