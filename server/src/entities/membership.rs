use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Membership {
    pub user_id: String,
    pub group_id: i64,
    pub joined_at: DateTime<Utc>,
}
