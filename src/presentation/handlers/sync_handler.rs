use crate::{
    application::services::{OfflineService, SyncService},
    application::services::sync_service::SyncStatus,
    presentation::dto::sync_dto::{PendingChangeResponse, SyncResultResponse},
    shared::error::AppError,
};
use std::sync::Arc;

pub struct SyncHandler {
    sync_service: Arc<SyncService>,
    offline_service: Arc<OfflineService>,
}

impl SyncHandler {
    pub fn new(sync_service: Arc<SyncService>, offline_service: Arc<OfflineService>) -> Self {
        Self {
            sync_service,
            offline_service,
        }
    }

    pub async fn start_sync(&self) -> Result<SyncResultResponse, AppError> {
        let applied = self.sync_service.start_sync().await?;
        Ok(SyncResultResponse { applied })
    }

    pub async fn get_status(&self) -> SyncStatus {
        self.sync_service.get_status().await
    }

    pub async fn reset_errors(&self) {
        self.sync_service.reset_errors().await;
    }

    pub async fn pending_changes(&self) -> Result<Vec<PendingChangeResponse>, AppError> {
        let changes = self.offline_service.pending_changes().await?;
        Ok(changes.into_iter().map(PendingChangeResponse::from).collect())
    }
}
