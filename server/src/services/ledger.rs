//! List totals.
//!
//! Totals are always recomputed from the full current item set of a list,
//! never adjusted incrementally. Each line is `price * quantity`; a missing
//! price or a negative quantity contributes nothing. The sums are rounded
//! once, half away from zero, to two decimals.

use crate::core::AppError;
use crate::entities::ItemStatus;
use crate::repositories::{ItemRepository, ListRepository, Read};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, instrument, warn};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub expected_total: Decimal,
    pub actual_total: Decimal,
}

impl Totals {
    pub fn zero() -> Self {
        Self {
            expected_total: Decimal::new(0, 2),
            actual_total: Decimal::new(0, 2),
        }
    }
}

/// The part of an item the ledger looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerLine {
    pub price: Option<Decimal>,
    pub quantity: i64,
    pub status: ItemStatus,
}

fn line_amount(line: &LedgerLine) -> Decimal {
    let price = line.price.unwrap_or(Decimal::ZERO);
    let quantity = Decimal::from(line.quantity.max(0));
    price.checked_mul(quantity).unwrap_or_else(|| {
        warn!(%price, %quantity, "Line amount overflows, counted as zero");
        Decimal::ZERO
    })
}

fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Pure recomputation over a list's lines.
pub fn recompute_totals<'a, I>(lines: I) -> Totals
where
    I: IntoIterator<Item = &'a LedgerLine>,
{
    let mut expected = Decimal::ZERO;
    let mut actual = Decimal::ZERO;

    for line in lines {
        let amount = line_amount(line);
        let bucket = match line.status {
            ItemStatus::Needed | ItemStatus::Optional => &mut expected,
            ItemStatus::Purchased => &mut actual,
        };
        match bucket.checked_add(amount) {
            Some(sum) => *bucket = sum,
            None => warn!("List total overflows, line skipped"),
        }
    }

    Totals {
        expected_total: round_money(expected),
        actual_total: round_money(actual),
    }
}

/// Reads the current items of `list_id`, recomputes and stores its totals.
///
/// Must run on the connection of the unit of work that mutated the items.
#[instrument(skip(conn))]
pub async fn refresh_totals(conn: &mut SqliteConnection, list_id: i64) -> Result<Totals, AppError> {
    if ListRepository::read(conn, &list_id).await?.is_none() {
        warn!(list_id, "List not found while refreshing totals");
        return Err(AppError::not_found("List not found"));
    }

    let lines = ItemRepository::ledger_lines(conn, list_id).await?;
    let totals = recompute_totals(&lines);
    ListRepository::update_totals(conn, list_id, &totals).await?;

    debug!(
        list_id,
        items = lines.len(),
        expected = %totals.expected_total,
        actual = %totals.actual_total,
        "Totals refreshed"
    );
    Ok(totals)
}
