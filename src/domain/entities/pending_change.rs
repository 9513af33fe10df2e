use crate::domain::value_objects::ChangeKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TABLE_TERRITORIES: &str = "territorios";
pub const TABLE_OBSERVATIONS: &str = "observaciones";

/// オフライン時に保存され、接続回復後に再送される変更
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingChange {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub table: String,
    pub data: Value,
    /// 追加時刻（ミリ秒）
    pub timestamp: i64,
    #[serde(default)]
    pub attempts: u32,
}

impl PendingChange {
    pub fn new(kind: ChangeKind, table: impl Into<String>, data: Value) -> Self {
        Self::with_time(kind, table, data, Utc::now())
    }

    pub fn with_time(
        kind: ChangeKind,
        table: impl Into<String>,
        data: Value,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            table: table.into(),
            data,
            timestamp: at.timestamp_millis(),
            attempts: 0,
        }
    }

    /// 更新・削除の対象行 ID
    pub fn target_id(&self) -> Option<&str> {
        self.data.get("id").and_then(Value::as_str)
    }
}
