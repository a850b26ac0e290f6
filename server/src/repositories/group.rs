//! GroupRepository - groups table

use super::{Delete, Read};
use crate::entities::Group;
use chrono::Utc;
use sqlx::SqliteConnection;

pub struct GroupRepository;

const GROUP_COLUMNS: &str = "id, group_name, group_code, group_image, created_at, updated_at";

impl GroupRepository {
    pub async fn insert(
        conn: &mut SqliteConnection,
        group_name: &str,
        group_code: &str,
    ) -> Result<Group, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Group>(&format!(
            r#"
            INSERT INTO groups (group_name, group_code, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING {GROUP_COLUMNS}
            "#
        ))
        .bind(group_name)
        .bind(group_code)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn find_by_code(
        conn: &mut SqliteConnection,
        group_code: &str,
    ) -> Result<Option<Group>, sqlx::Error> {
        sqlx::query_as::<_, Group>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE group_code = ?"
        ))
        .bind(group_code)
        .fetch_optional(&mut *conn)
        .await
    }

    pub async fn code_exists(
        conn: &mut SqliteConnection,
        group_code: &str,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM groups WHERE group_code = ?")
            .bind(group_code)
            .fetch_one(&mut *conn)
            .await?;
        Ok(count > 0)
    }

    /// Applies the given fields, leaving `None` fields unchanged.
    pub async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        group_name: Option<&str>,
        group_image: Option<&str>,
    ) -> Result<Group, sqlx::Error> {
        sqlx::query_as::<_, Group>(&format!(
            r#"
            UPDATE groups SET
                group_name = COALESCE(?, group_name),
                group_image = COALESCE(?, group_image),
                updated_at = ?
            WHERE id = ?
            RETURNING {GROUP_COLUMNS}
            "#
        ))
        .bind(group_name)
        .bind(group_image)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *conn)
        .await
    }
}

impl Read<Group, i64> for GroupRepository {
    async fn read(conn: &mut SqliteConnection, id: &i64) -> Result<Option<Group>, sqlx::Error> {
        sqlx::query_as::<_, Group>(&format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }
}

impl Delete<i64> for GroupRepository {
    async fn delete(conn: &mut SqliteConnection, id: &i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM groups WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
