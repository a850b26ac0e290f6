//! UserRepository - users table

use super::{Create, Delete, Read};
use crate::entities::User;
use chrono::Utc;
use sqlx::SqliteConnection;

pub struct UserRepository;

pub struct NewUser {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_code: String,
}

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, user_code, profile_pic, created_at, updated_at";

impl UserRepository {
    pub async fn find_by_code(
        conn: &mut SqliteConnection,
        user_code: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_code = ?"
        ))
        .bind(user_code)
        .fetch_optional(&mut *conn)
        .await
    }

    pub async fn code_exists(
        conn: &mut SqliteConnection,
        user_code: &str,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE user_code = ?")
            .bind(user_code)
            .fetch_one(&mut *conn)
            .await?;
        Ok(count > 0)
    }

    /// Applies the given profile fields, leaving `None` fields unchanged.
    pub async fn update_profile(
        conn: &mut SqliteConnection,
        id: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
        profile_pic: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                profile_pic = COALESCE(?, profile_pic),
                updated_at = ?
            WHERE id = ?
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(first_name)
        .bind(last_name)
        .bind(profile_pic)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *conn)
        .await
    }
}

impl Create<User, NewUser> for UserRepository {
    async fn create(conn: &mut SqliteConnection, data: &NewUser) -> Result<User, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, first_name, last_name, user_code, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&data.id)
        .bind(&data.email)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.user_code)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
    }
}

impl Read<User, str> for UserRepository {
    async fn read(conn: &mut SqliteConnection, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }
}

impl Delete<str> for UserRepository {
    async fn delete(conn: &mut SqliteConnection, id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
