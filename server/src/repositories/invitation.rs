//! InvitationRepository - invitations table

use super::{Delete, Read};
use crate::dtos::{GroupSnippet, InvitationDTO, UserSnippet};
use crate::entities::{Invitation, InvitationRow, InvitationStatus, InvitationType};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

pub struct InvitationRepository;

/// Columns of a new pending invitation.
pub struct NewInvitation<'a> {
    pub kind: InvitationType,
    pub from_user_id: &'a str,
    pub to_user_id: &'a str,
    pub group_id: Option<i64>,
    pub group_name: Option<&'a str>,
    pub message: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

const INVITATION_COLUMNS: &str = "id, kind, status, from_user_id, to_user_id, group_id, \
                                  group_name, message, created_at, expires_at, responded_at";

/// Invitation joined with both participants and its group, if still present.
const DETAILED_SELECT: &str = r#"
    SELECT i.id, i.kind, i.status, i.from_user_id, i.to_user_id, i.group_id,
           i.group_name, i.message, i.created_at, i.expires_at, i.responded_at,
           fu.first_name AS from_first_name, fu.last_name AS from_last_name,
           fu.user_code AS from_user_code,
           tu.first_name AS to_first_name, tu.last_name AS to_last_name,
           tu.user_code AS to_user_code,
           g.group_name AS g_group_name, g.group_code AS g_group_code
    FROM invitations i
    LEFT JOIN users fu ON fu.id = i.from_user_id
    LEFT JOIN users tu ON tu.id = i.to_user_id
    LEFT JOIN groups g ON g.id = i.group_id
"#;

#[derive(sqlx::FromRow)]
struct DetailedRow {
    #[sqlx(flatten)]
    invitation: InvitationRow,
    from_first_name: Option<String>,
    from_last_name: Option<String>,
    from_user_code: Option<String>,
    to_first_name: Option<String>,
    to_last_name: Option<String>,
    to_user_code: Option<String>,
    g_group_name: Option<String>,
    g_group_code: Option<String>,
}

fn snippet(
    id: &str,
    first_name: Option<String>,
    last_name: Option<String>,
    user_code: Option<String>,
) -> Option<UserSnippet> {
    Some(UserSnippet {
        id: id.to_string(),
        first_name: first_name?,
        last_name: last_name?,
        user_code: user_code?,
    })
}

impl TryFrom<DetailedRow> for InvitationDTO {
    type Error = sqlx::Error;

    fn try_from(row: DetailedRow) -> Result<Self, Self::Error> {
        let from_user = snippet(
            &row.invitation.from_user_id,
            row.from_first_name,
            row.from_last_name,
            row.from_user_code,
        );
        let to_user = snippet(
            &row.invitation.to_user_id,
            row.to_first_name,
            row.to_last_name,
            row.to_user_code,
        );
        let group = match (row.invitation.group_id, row.g_group_name, row.g_group_code) {
            (Some(id), Some(group_name), Some(group_code)) => Some(GroupSnippet {
                id,
                group_name,
                group_code,
            }),
            _ => None,
        };

        let invitation = decode(row.invitation)?;
        let mut dto = InvitationDTO::from(invitation);
        dto.from_user = from_user;
        dto.to_user = to_user;
        Ok(match group {
            Some(group) => dto.with_group(group),
            None => dto,
        })
    }
}

fn decode(row: InvitationRow) -> Result<Invitation, sqlx::Error> {
    Invitation::try_from(row).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

impl InvitationRepository {
    pub async fn insert(
        conn: &mut SqliteConnection,
        data: &NewInvitation<'_>,
    ) -> Result<Invitation, sqlx::Error> {
        let row = sqlx::query_as::<_, InvitationRow>(&format!(
            r#"
            INSERT INTO invitations
                (kind, status, from_user_id, to_user_id, group_id, group_name, message,
                 created_at, expires_at)
            VALUES (?, 'PENDING', ?, ?, ?, ?, ?, ?, ?)
            RETURNING {INVITATION_COLUMNS}
            "#
        ))
        .bind(data.kind)
        .bind(data.from_user_id)
        .bind(data.to_user_id)
        .bind(data.group_id)
        .bind(data.group_name)
        .bind(data.message)
        .bind(data.created_at)
        .bind(data.expires_at)
        .fetch_one(&mut *conn)
        .await?;
        decode(row)
    }

    /// Whether a pending invitation of `kind` already links the pair for this group.
    pub async fn has_pending(
        conn: &mut SqliteConnection,
        kind: InvitationType,
        from_user_id: &str,
        to_user_id: &str,
        group_id: Option<i64>,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM invitations
            WHERE kind = ? AND from_user_id = ? AND to_user_id = ?
              AND COALESCE(group_id, 0) = COALESCE(?, 0) AND status = 'PENDING'
            "#,
        )
        .bind(kind)
        .bind(from_user_id)
        .bind(to_user_id)
        .bind(group_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count > 0)
    }

    /// Pending START_GROUP proposals between two users, in either direction.
    pub async fn has_pending_start_group_between(
        conn: &mut SqliteConnection,
        a: &str,
        b: &str,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM invitations
            WHERE kind = 'START_GROUP' AND status = 'PENDING'
              AND ((from_user_id = ? AND to_user_id = ?) OR (from_user_id = ? AND to_user_id = ?))
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count > 0)
    }

    pub async fn has_pending_join_request(
        conn: &mut SqliteConnection,
        from_user_id: &str,
        group_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM invitations
            WHERE kind = 'JOIN_REQUEST' AND status = 'PENDING'
              AND from_user_id = ? AND group_id = ?
            "#,
        )
        .bind(from_user_id)
        .bind(group_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count > 0)
    }

    /// Moves a pending invitation to `status`. Returns 0 when it was no longer pending.
    pub async fn set_status(
        conn: &mut SqliteConnection,
        id: i64,
        status: InvitationStatus,
        responded_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invitations SET status = ?, responded_at = ? WHERE id = ? AND status = 'PENDING'",
        )
        .bind(status)
        .bind(responded_at)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Records the group a START_GROUP proposal founded.
    pub async fn set_group(
        conn: &mut SqliteConnection,
        id: i64,
        group_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE invitations SET group_id = ? WHERE id = ?")
            .bind(group_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Moves every pending JOIN_REQUEST copy sent by `from_user_id` for the group to
    /// `status` and returns the settled rows.
    pub async fn settle_pending_join_requests(
        conn: &mut SqliteConnection,
        from_user_id: &str,
        group_id: i64,
        status: InvitationStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invitation>, sqlx::Error> {
        let rows = sqlx::query_as::<_, InvitationRow>(&format!(
            r#"
            UPDATE invitations SET status = ?, responded_at = ?
            WHERE kind = 'JOIN_REQUEST' AND status = 'PENDING'
              AND from_user_id = ? AND group_id = ?
            RETURNING {INVITATION_COLUMNS}
            "#
        ))
        .bind(status)
        .bind(now)
        .bind(from_user_id)
        .bind(group_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(decode).collect()
    }

    pub async fn delete_by_group(
        conn: &mut SqliteConnection,
        group_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM invitations WHERE group_id = ?")
            .bind(group_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Deletes everything the user sent or received.
    pub async fn delete_by_user(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM invitations WHERE from_user_id = ? OR to_user_id = ?")
                .bind(user_id)
                .bind(user_id)
                .execute(&mut *conn)
                .await?;
        Ok(result.rows_affected())
    }

    /// Marks pending invitations past their deadline as EXPIRED.
    pub async fn expire_stale(
        conn: &mut SqliteConnection,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE invitations SET status = 'EXPIRED', responded_at = ?
            WHERE status = 'PENDING' AND expires_at < ?
            "#,
        )
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Pending invitations addressed to the user, newest first.
    pub async fn received_pending(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> Result<Vec<InvitationDTO>, sqlx::Error> {
        let rows = sqlx::query_as::<_, DetailedRow>(&format!(
            "{DETAILED_SELECT} WHERE i.to_user_id = ? AND i.status = 'PENDING' \
             ORDER BY i.created_at DESC, i.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(InvitationDTO::try_from).collect()
    }

    /// Every invitation the user sent, in any state, newest first.
    pub async fn sent(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> Result<Vec<InvitationDTO>, sqlx::Error> {
        let rows = sqlx::query_as::<_, DetailedRow>(&format!(
            "{DETAILED_SELECT} WHERE i.from_user_id = ? ORDER BY i.created_at DESC, i.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(InvitationDTO::try_from).collect()
    }

    /// Every invitation tied to the group, newest first.
    pub async fn by_group(
        conn: &mut SqliteConnection,
        group_id: i64,
    ) -> Result<Vec<InvitationDTO>, sqlx::Error> {
        let rows = sqlx::query_as::<_, DetailedRow>(&format!(
            "{DETAILED_SELECT} WHERE i.group_id = ? ORDER BY i.created_at DESC, i.id DESC"
        ))
        .bind(group_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(InvitationDTO::try_from).collect()
    }

    pub async fn read_details(
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<InvitationDTO>, sqlx::Error> {
        let row = sqlx::query_as::<_, DetailedRow>(&format!("{DETAILED_SELECT} WHERE i.id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(InvitationDTO::try_from).transpose()
    }
}

impl Read<Invitation, i64> for InvitationRepository {
    async fn read(conn: &mut SqliteConnection, id: &i64) -> Result<Option<Invitation>, sqlx::Error> {
        let row = sqlx::query_as::<_, InvitationRow>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(decode).transpose()
    }
}

impl Delete<i64> for InvitationRepository {
    async fn delete(conn: &mut SqliteConnection, id: &i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM invitations WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
