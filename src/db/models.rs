use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct KvRow {
    pub scope: String,
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
