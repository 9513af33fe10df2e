use super::offline_service::OfflineService;
use super::sync_service::SyncObserver;
use crate::application::ports::{CurrentActor, Notification, Notifier, ObservationGateway};
use crate::domain::entities::{
    group_by_territory, NewObservation, Observation, PendingChange, TABLE_OBSERVATIONS,
};
use crate::domain::value_objects::{ChangeKind, Coordinates, ObservationId, TerritoryId};
use crate::infrastructure::cache::QueryCache;
use crate::shared::error::AppError;
use crate::shared::validation::ValidationFailureKind;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

pub const OBSERVATIONS_PREFIX: &str = "observations:";

pub fn observations_key(territory_id: Option<&TerritoryId>) -> String {
    match territory_id {
        Some(id) => format!("{OBSERVATIONS_PREFIX}{id}"),
        None => format!("{OBSERVATIONS_PREFIX}all"),
    }
}

const LOCAL_ID_PREFIX: &str = "local-";

pub struct ObservationService {
    gateway: Arc<dyn ObservationGateway>,
    cache: Arc<QueryCache<Vec<Observation>>>,
    offline: Arc<OfflineService>,
    actor: Arc<dyn CurrentActor>,
    notifier: Arc<dyn Notifier>,
}

impl ObservationService {
    pub fn new(
        gateway: Arc<dyn ObservationGateway>,
        cache: Arc<QueryCache<Vec<Observation>>>,
        offline: Arc<OfflineService>,
        actor: Arc<dyn CurrentActor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            gateway,
            cache,
            offline,
            actor,
            notifier,
        }
    }

    /// 新しい順。送信待ちの観察もキューから合流させて返す
    pub async fn list_observations(
        &self,
        territory_id: Option<TerritoryId>,
    ) -> Result<Vec<Observation>, AppError> {
        let key = observations_key(territory_id.as_ref());
        let gateway = self.gateway.clone();
        let filter = territory_id.clone();
        let mut observations = self
            .cache
            .fetch(&key, move || async move {
                gateway.list_observations(filter).await
            })
            .await?;

        let pending = self.pending_observations().await;
        observations.extend(
            pending
                .into_iter()
                .filter(|o| territory_id.as_ref().map_or(true, |id| &o.territorio_id == id)),
        );
        observations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(observations)
    }

    pub async fn grouped_by_territory(
        &self,
    ) -> Result<BTreeMap<TerritoryId, Vec<Observation>>, AppError> {
        Ok(group_by_territory(&self.list_observations(None).await?))
    }

    async fn pending_observations(&self) -> Vec<Observation> {
        let changes = match self.offline.pending_changes().await {
            Ok(changes) => changes,
            Err(e) => {
                warn!(error = %e, "failed to read offline queue");
                return Vec::new();
            }
        };
        changes
            .iter()
            .filter(|c| c.kind == ChangeKind::Create && c.table == TABLE_OBSERVATIONS)
            .filter_map(local_observation)
            .collect()
    }

    pub async fn invalidate(&self) {
        self.cache.invalidate_prefix(OBSERVATIONS_PREFIX).await;
    }

    fn fail(&self, title: &str, err: AppError) -> AppError {
        self.notifier
            .notify(Notification::error(title, err.user_message()));
        err
    }

    pub async fn create_observation(
        &self,
        territorio_id: TerritoryId,
        coordenadas: Coordinates,
        comentario: &str,
    ) -> Result<Observation, AppError> {
        let Some(user) = self.actor.current_user() else {
            return Err(self.fail(
                "Error al agregar observación",
                AppError::Unauthorized("Debes iniciar sesión".to_string()),
            ));
        };
        let comentario = non_empty_comment(comentario)
            .map_err(|e| self.fail("Error al agregar observación", e))?;

        let draft = NewObservation {
            territorio_id,
            coordenadas,
            comentario,
            usuario_id: user.id,
        };

        match self.gateway.create_observation(&draft).await {
            Ok(observation) => {
                info!(observation_id = %observation.id, "observation created");
                self.invalidate().await;
                self.notifier
                    .notify(Notification::success("Observación agregada"));
                Ok(observation)
            }
            Err(e) if self.offline.should_queue(&e) => {
                let data = serde_json::to_value(&draft)?;
                let change = self
                    .offline
                    .enqueue(ChangeKind::Create, TABLE_OBSERVATIONS, data)
                    .await
                    .map_err(|queue_err| self.fail("Error al agregar observación", queue_err))?;
                self.notifier.notify(Notification::info(
                    "Guardado sin conexión",
                    "La observación se enviará cuando vuelva la conexión",
                ));
                Ok(Observation::local(&change.id, &draft, Utc::now()))
            }
            Err(e) => Err(self.fail("Error al agregar observación", e)),
        }
    }

    pub async fn update_observation(
        &self,
        id: &ObservationId,
        comentario: &str,
    ) -> Result<Observation, AppError> {
        let comentario = non_empty_comment(comentario)
            .map_err(|e| self.fail("Error al actualizar observación", e))?;

        if let Some(change_id) = local_change_id(id) {
            let text = comentario.clone();
            let edited = self
                .offline
                .update_queued(change_id, move |data| data["comentario"] = json!(text))
                .await
                .map_err(|e| self.fail("Error al actualizar observación", e))?;
            return edited
                .as_ref()
                .and_then(local_observation)
                .ok_or_else(|| {
                    self.fail(
                        "Error al actualizar observación",
                        AppError::NotFound(format!("observación {id}")),
                    )
                });
        }

        match self.gateway.update_observation(id, &comentario).await {
            Ok(observation) => {
                self.invalidate().await;
                self.notifier
                    .notify(Notification::success("Observación actualizada"));
                Ok(observation)
            }
            Err(e) if self.offline.should_queue(&e) => {
                let Some(mut local) = self.find_cached(id).await else {
                    return Err(self.fail("Error al actualizar observación", e));
                };
                self.offline
                    .enqueue(
                        ChangeKind::Update,
                        TABLE_OBSERVATIONS,
                        json!({ "id": id.as_str(), "comentario": comentario }),
                    )
                    .await
                    .map_err(|queue_err| self.fail("Error al actualizar observación", queue_err))?;
                local.comentario = comentario.clone();
                self.update_cached(|list| {
                    for o in list.iter_mut().filter(|o| &o.id == id) {
                        o.comentario = comentario.clone();
                    }
                })
                .await;
                self.notifier.notify(Notification::info(
                    "Sin conexión",
                    "El cambio se sincronizará cuando vuelva la conexión",
                ));
                Ok(local)
            }
            Err(e) => Err(self.fail("Error al actualizar observación", e)),
        }
    }

    pub async fn delete_observation(&self, id: &ObservationId) -> Result<(), AppError> {
        if let Some(change_id) = local_change_id(id) {
            let removed = self
                .offline
                .remove(change_id)
                .await
                .map_err(|e| self.fail("Error al eliminar observación", e))?;
            if !removed {
                return Err(self.fail(
                    "Error al eliminar observación",
                    AppError::NotFound(format!("observación {id}")),
                ));
            }
            self.notifier
                .notify(Notification::success("Observación eliminada"));
            return Ok(());
        }

        match self.gateway.delete_observation(id).await {
            Ok(()) => {
                self.invalidate().await;
                self.notifier
                    .notify(Notification::success("Observación eliminada"));
                Ok(())
            }
            Err(e) if self.offline.should_queue(&e) => {
                self.offline
                    .enqueue(
                        ChangeKind::Delete,
                        TABLE_OBSERVATIONS,
                        json!({ "id": id.as_str() }),
                    )
                    .await
                    .map_err(|queue_err| self.fail("Error al eliminar observación", queue_err))?;
                self.update_cached(|list| list.retain(|o| &o.id != id)).await;
                self.notifier.notify(Notification::info(
                    "Sin conexión",
                    "El cambio se sincronizará cuando vuelva la conexión",
                ));
                Ok(())
            }
            Err(e) => Err(self.fail("Error al eliminar observación", e)),
        }
    }

    async fn find_cached(&self, id: &ObservationId) -> Option<Observation> {
        for key in self.cache.keys().await {
            if let Some(list) = self.cache.peek(&key).await {
                if let Some(found) = list.into_iter().find(|o| &o.id == id) {
                    return Some(found);
                }
            }
        }
        None
    }

    async fn update_cached<F>(&self, f: F)
    where
        F: Fn(&mut Vec<Observation>),
    {
        for key in self.cache.keys().await {
            self.cache.update_data(&key, &f).await;
        }
    }
}

fn non_empty_comment(comentario: &str) -> Result<String, AppError> {
    let trimmed = comentario.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(
            ValidationFailureKind::EmptyField,
            "El comentario no puede estar vacío",
        ));
    }
    Ok(trimmed.to_string())
}

fn local_change_id(id: &ObservationId) -> Option<&str> {
    if id.is_local() {
        id.as_str().strip_prefix(LOCAL_ID_PREFIX)
    } else {
        None
    }
}

fn local_observation(change: &PendingChange) -> Option<Observation> {
    let draft: NewObservation = match serde_json::from_value(change.data.clone()) {
        Ok(draft) => draft,
        Err(e) => {
            warn!(change_id = %change.id, error = %e, "unreadable queued observation");
            return None;
        }
    };
    let created_at = Utc.timestamp_millis_opt(change.timestamp).single()?;
    Some(Observation::local(&change.id, &draft, created_at))
}

#[async_trait]
impl SyncObserver for ObservationService {
    async fn on_synced(&self, _applied: u32) {
        self.invalidate().await;
    }
}
