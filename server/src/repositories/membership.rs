//! MembershipRepository - group_members table

use super::Create;
use crate::dtos::{MemberDTO, UserGroupDTO};
use crate::entities::Membership;
use chrono::Utc;
use sqlx::SqliteConnection;

pub struct MembershipRepository;

/// A (user, group) pair to insert.
pub struct NewMembership<'a> {
    pub user_id: &'a str,
    pub group_id: i64,
}

impl MembershipRepository {
    pub async fn exists(
        conn: &mut SqliteConnection,
        user_id: &str,
        group_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM group_members WHERE user_id = ? AND group_id = ?",
        )
        .bind(user_id)
        .bind(group_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count > 0)
    }

    pub async fn count(conn: &mut SqliteConnection, group_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM group_members WHERE group_id = ?")
            .bind(group_id)
            .fetch_one(&mut *conn)
            .await
    }

    pub async fn delete(
        conn: &mut SqliteConnection,
        user_id: &str,
        group_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM group_members WHERE user_id = ? AND group_id = ?")
            .bind(user_id)
            .bind(group_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_group(
        conn: &mut SqliteConnection,
        group_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = ?")
            .bind(group_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Members of a group with their public profile, oldest membership first.
    pub async fn members_of(
        conn: &mut SqliteConnection,
        group_id: i64,
    ) -> Result<Vec<MemberDTO>, sqlx::Error> {
        sqlx::query_as::<_, MemberDTO>(
            r#"
            SELECT u.id AS user_id, u.first_name, u.last_name, u.user_code, u.profile_pic,
                   gm.joined_at
            FROM group_members gm
            JOIN users u ON u.id = gm.user_id
            WHERE gm.group_id = ?
            ORDER BY gm.joined_at ASC, u.id ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&mut *conn)
        .await
    }

    pub async fn member_ids(
        conn: &mut SqliteConnection,
        group_id: i64,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT user_id FROM group_members WHERE group_id = ? ORDER BY joined_at ASC",
        )
        .bind(group_id)
        .fetch_all(&mut *conn)
        .await
    }

    /// Groups a user belongs to, with member counts, most recently joined first.
    pub async fn groups_of(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> Result<Vec<UserGroupDTO>, sqlx::Error> {
        sqlx::query_as::<_, UserGroupDTO>(
            r#"
            SELECT g.id, g.group_name, g.group_code, g.group_image,
                   (SELECT COUNT(*) FROM group_members c WHERE c.group_id = g.id) AS member_count,
                   gm.joined_at
            FROM group_members gm
            JOIN groups g ON g.id = gm.group_id
            WHERE gm.user_id = ?
            ORDER BY gm.joined_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
    }

    pub async fn group_ids_of(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT group_id FROM group_members WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await
    }
}

impl<'a> Create<Membership, NewMembership<'a>> for MembershipRepository {
    async fn create(
        conn: &mut SqliteConnection,
        data: &NewMembership<'a>,
    ) -> Result<Membership, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO group_members (user_id, group_id, joined_at)
            VALUES (?, ?, ?)
            RETURNING user_id, group_id, joined_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.group_id)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
    }
}
