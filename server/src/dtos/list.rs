//! List DTOs

use crate::dtos::ItemDTO;
use crate::entities::List;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// A list with its items, newest first.
#[derive(Serialize, Debug, Clone)]
pub struct ListDTO {
    pub id: i64,
    pub expected_total: Decimal,
    pub actual_total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<ItemDTO>,
    pub item_count: usize,
}

impl ListDTO {
    pub fn new(list: List, items: Vec<ItemDTO>) -> Self {
        Self {
            id: list.id,
            expected_total: list.expected_total,
            actual_total: list.actual_total,
            created_at: list.created_at,
            updated_at: list.updated_at,
            item_count: items.len(),
            items,
        }
    }
}
