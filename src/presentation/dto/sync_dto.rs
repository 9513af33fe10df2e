use crate::domain::entities::PendingChange;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PendingChangeResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub table: String,
    pub target_id: Option<String>,
    pub timestamp: i64,
    pub attempts: u32,
}

impl From<PendingChange> for PendingChangeResponse {
    fn from(change: PendingChange) -> Self {
        Self {
            target_id: change.target_id().map(str::to_string),
            id: change.id,
            kind: change.kind.as_str().to_string(),
            table: change.table,
            timestamp: change.timestamp,
            attempts: change.attempts,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncResultResponse {
    pub applied: u32,
}
