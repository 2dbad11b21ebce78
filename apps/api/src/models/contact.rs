use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A locally persisted contact. The local row is the authoritative record of
/// existence; `external_id` is the sole join key to the Pipedrive person and
/// `None` is a valid terminal state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContactRow {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub external_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for a contact. Only fields that are `Some` are mutated;
/// `id` and `created_at` are never touched by this path.
#[derive(Debug, Clone, Default)]
pub struct ContactPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub external_id: Option<i64>,
}
