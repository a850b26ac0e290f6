//! ItemRepository - items table

use super::{Create, Delete, Read};
use crate::dtos::{ItemDTO, UserSnippet};
use crate::entities::list::{decode_amount, encode_amount};
use crate::entities::{Item, ItemRow, ItemStatus};
use crate::services::ledger::LedgerLine;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::SqliteConnection;

pub struct ItemRepository;

pub struct NewItem {
    pub list_id: i64,
    pub item_name: String,
    pub item_quantity: i64,
    pub item_price: Option<Decimal>,
    pub item_status: ItemStatus,
    pub user_id: String,
}

const ITEM_COLUMNS: &str = "id, list_id, item_name, item_quantity, item_price, item_status, \
                            user_id, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct LedgerRow {
    item_price: Option<String>,
    item_quantity: i64,
    item_status: ItemStatus,
}

#[derive(sqlx::FromRow)]
struct ItemWithAuthorRow {
    #[sqlx(flatten)]
    item: ItemRow,
    author_first_name: Option<String>,
    author_last_name: Option<String>,
    author_user_code: Option<String>,
}

impl From<ItemWithAuthorRow> for ItemDTO {
    fn from(row: ItemWithAuthorRow) -> Self {
        let author = match (
            row.item.user_id.clone(),
            row.author_first_name,
            row.author_last_name,
            row.author_user_code,
        ) {
            (Some(id), Some(first_name), Some(last_name), Some(user_code)) => Some(UserSnippet {
                id,
                first_name,
                last_name,
                user_code,
            }),
            _ => None,
        };
        ItemDTO::from(Item::from(row.item)).with_author(author)
    }
}

impl ItemRepository {
    /// Price, quantity and status of every item in a list.
    pub async fn ledger_lines(
        conn: &mut SqliteConnection,
        list_id: i64,
    ) -> Result<Vec<LedgerLine>, sqlx::Error> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            "SELECT item_price, item_quantity, item_status FROM items WHERE list_id = ?",
        )
        .bind(list_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LedgerLine {
                price: row.item_price.as_deref().and_then(decode_amount),
                quantity: row.item_quantity,
                status: row.item_status,
            })
            .collect())
    }

    /// Items of a list with their author snippet, newest first.
    pub async fn find_with_authors(
        conn: &mut SqliteConnection,
        list_id: i64,
    ) -> Result<Vec<ItemDTO>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ItemWithAuthorRow>(
            r#"
            SELECT i.id, i.list_id, i.item_name, i.item_quantity, i.item_price, i.item_status,
                   i.user_id, i.created_at, i.updated_at,
                   u.first_name AS author_first_name,
                   u.last_name AS author_last_name,
                   u.user_code AS author_user_code
            FROM items i
            LEFT JOIN users u ON u.id = i.user_id
            WHERE i.list_id = ?
            ORDER BY i.created_at DESC, i.id DESC
            "#,
        )
        .bind(list_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(ItemDTO::from).collect())
    }

    /// Writes every mutable column of `item` back to its row.
    pub async fn save(conn: &mut SqliteConnection, item: &Item) -> Result<Item, sqlx::Error> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            UPDATE items SET
                item_name = ?, item_quantity = ?, item_price = ?, item_status = ?,
                user_id = ?, updated_at = ?
            WHERE id = ?
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(&item.item_name)
        .bind(item.item_quantity)
        .bind(item.item_price.map(encode_amount))
        .bind(item.item_status)
        .bind(&item.user_id)
        .bind(Utc::now())
        .bind(item.id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.into())
    }

    pub async fn delete_by_list(
        conn: &mut SqliteConnection,
        list_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM items WHERE list_id = ?")
            .bind(list_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}

impl Create<Item, NewItem> for ItemRepository {
    async fn create(conn: &mut SqliteConnection, data: &NewItem) -> Result<Item, sqlx::Error> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            INSERT INTO items
                (list_id, item_name, item_quantity, item_price, item_status, user_id,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(data.list_id)
        .bind(&data.item_name)
        .bind(data.item_quantity)
        .bind(data.item_price.map(encode_amount))
        .bind(data.item_status)
        .bind(&data.user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.into())
    }
}

impl Read<Item, i64> for ItemRepository {
    async fn read(conn: &mut SqliteConnection, id: &i64) -> Result<Option<Item>, sqlx::Error> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.map(Item::from))
    }
}

impl Delete<i64> for ItemRepository {
    async fn delete(conn: &mut SqliteConnection, id: &i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
