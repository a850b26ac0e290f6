//! ListRepository - lists and their owner links (user_lists, group_lists)

use super::{Delete, Read};
use crate::entities::{List, ListRow};
use crate::services::ledger::Totals;
use chrono::Utc;
use sqlx::SqliteConnection;

pub struct ListRepository;

const LIST_COLUMNS: &str = "id, expected_total, actual_total, created_at, updated_at";

impl ListRepository {
    /// Creates a list with zero totals and no owner.
    pub async fn insert_empty(conn: &mut SqliteConnection) -> Result<List, sqlx::Error> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, ListRow>(&format!(
            r#"
            INSERT INTO lists (expected_total, actual_total, created_at, updated_at)
            VALUES ('0.00', '0.00', ?, ?)
            RETURNING {LIST_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.into())
    }

    /// Writes recomputed totals. Returns the number of rows updated.
    pub async fn update_totals(
        conn: &mut SqliteConnection,
        id: i64,
        totals: &Totals,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE lists SET expected_total = ?, actual_total = ?, updated_at = ? WHERE id = ?",
        )
        .bind(totals.expected_total.to_string())
        .bind(totals.actual_total.to_string())
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn user_owner(
        conn: &mut SqliteConnection,
        list_id: i64,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT user_id FROM user_lists WHERE list_id = ?")
            .bind(list_id)
            .fetch_optional(&mut *conn)
            .await
    }

    pub async fn group_owner(
        conn: &mut SqliteConnection,
        list_id: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT group_id FROM group_lists WHERE list_id = ?")
            .bind(list_id)
            .fetch_optional(&mut *conn)
            .await
    }

    pub async fn list_id_of_user(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT list_id FROM user_lists WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await
    }

    pub async fn list_id_of_group(
        conn: &mut SqliteConnection,
        group_id: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT list_id FROM group_lists WHERE group_id = ?")
            .bind(group_id)
            .fetch_optional(&mut *conn)
            .await
    }

    pub async fn link_user(
        conn: &mut SqliteConnection,
        list_id: i64,
        user_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO user_lists (user_id, list_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(list_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn link_group(
        conn: &mut SqliteConnection,
        list_id: i64,
        group_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO group_lists (group_id, list_id) VALUES (?, ?)")
            .bind(group_id)
            .bind(list_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn unlink_user(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_lists WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn unlink_group(
        conn: &mut SqliteConnection,
        group_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM group_lists WHERE group_id = ?")
            .bind(group_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}

impl Read<List, i64> for ListRepository {
    async fn read(conn: &mut SqliteConnection, id: &i64) -> Result<Option<List>, sqlx::Error> {
        let row = sqlx::query_as::<_, ListRow>(&format!(
            "SELECT {LIST_COLUMNS} FROM lists WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.map(List::from))
    }
}

impl Delete<i64> for ListRepository {
    async fn delete(conn: &mut SqliteConnection, id: &i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM lists WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
