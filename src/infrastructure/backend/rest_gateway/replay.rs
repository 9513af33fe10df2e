use super::RestGateway;
use crate::application::ports::ChangeReplayGateway;
use crate::domain::entities::PendingChange;
use crate::domain::value_objects::ChangeKind;
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::Value;

impl RestGateway {
    fn replay_target<'a>(&self, change: &'a PendingChange) -> Result<&'a str, AppError> {
        change.target_id().ok_or_else(|| {
            AppError::InvalidInput(format!(
                "pending change {} has no target id",
                change.id
            ))
        })
    }
}

#[async_trait]
impl ChangeReplayGateway for RestGateway {
    async fn apply_pending_change(&self, change: &PendingChange) -> Result<(), AppError> {
        match change.kind {
            ChangeKind::Create => {
                let _: Value = self.client.insert(&change.table, &change.data).await?;
            }
            ChangeKind::Update => {
                let id = self.replay_target(change)?;
                let mut body = change.data.clone();
                if let Value::Object(map) = &mut body {
                    map.remove("id");
                }
                let _: Vec<Value> = self.client.update(&change.table, "id", id, &body).await?;
            }
            ChangeKind::Delete => {
                let id = self.replay_target(change)?;
                let removed = self.client.delete(&change.table, "id", id).await?;
                if removed == 0 {
                    return Err(AppError::NotFound(format!("{} {}", change.table, id)));
                }
            }
        }
        Ok(())
    }
}
