use super::offline_service::OfflineService;
use super::optimistic::OptimisticUpdate;
use super::sync_service::SyncObserver;
use crate::application::ports::{CurrentActor, Notification, Notifier, TerritoryGateway};
use crate::domain::entities::{
    ensure_unique_numero, sort_for_field_work, NewTerritory, Territory, TerritoryStatusPatch,
    TABLE_TERRITORIES,
};
use crate::domain::value_objects::{ChangeKind, PolygonRing, TerritoryId, TerritoryStatus};
use crate::infrastructure::cache::QueryCache;
use crate::infrastructure::storage::{PrefixedStore, TERRITORIES_CACHE_KEY};
use crate::shared::error::AppError;
use crate::shared::validation::ValidationFailureKind;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

pub const TERRITORIES_KEY: &str = "territories";

const QUEUED_TITLE: &str = "Sin conexión";
const QUEUED_MESSAGE: &str = "El cambio se sincronizará cuando vuelva la conexión";

pub struct TerritoryService {
    gateway: Arc<dyn TerritoryGateway>,
    cache: Arc<QueryCache<Vec<Territory>>>,
    store: PrefixedStore,
    offline: Arc<OfflineService>,
    actor: Arc<dyn CurrentActor>,
    notifier: Arc<dyn Notifier>,
}

impl TerritoryService {
    pub fn new(
        gateway: Arc<dyn TerritoryGateway>,
        cache: Arc<QueryCache<Vec<Territory>>>,
        store: PrefixedStore,
        offline: Arc<OfflineService>,
        actor: Arc<dyn CurrentActor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            gateway,
            cache,
            store,
            offline,
            actor,
            notifier,
        }
    }

    /// 番号順の一覧。通信に失敗した場合は端末に保存した一覧を返す
    pub async fn list_territories(&self) -> Result<Vec<Territory>, AppError> {
        let gateway = self.gateway.clone();
        let store = self.store.clone();
        let fetched = self
            .cache
            .fetch(TERRITORIES_KEY, move || async move {
                let territories = gateway.list_territories().await?;
                if let Err(e) = store.set_json(TERRITORIES_CACHE_KEY, &territories).await {
                    warn!(error = %e, "failed to persist territory list");
                }
                Ok(territories)
            })
            .await;

        match fetched {
            Ok(territories) => Ok(territories),
            Err(e) if e.is_transport() => {
                match self
                    .store
                    .get_json::<Vec<Territory>>(TERRITORIES_CACHE_KEY)
                    .await
                {
                    Ok(Some(cached)) => {
                        warn!(error = %e, count = cached.len(), "serving stored territories");
                        Ok(cached)
                    }
                    _ => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// 未着手を先に、それ以外は完了日の古い順
    pub async fn field_work_list(&self) -> Result<Vec<Territory>, AppError> {
        Ok(sort_for_field_work(&self.list_territories().await?))
    }

    pub async fn get_territory(&self, id: &TerritoryId) -> Result<Option<Territory>, AppError> {
        Ok(self
            .known_territories()
            .await?
            .into_iter()
            .find(|t| &t.id == id))
    }

    async fn known_territories(&self) -> Result<Vec<Territory>, AppError> {
        match self.cache.peek(TERRITORIES_KEY).await {
            Some(territories) => Ok(territories),
            None => self.list_territories().await,
        }
    }

    pub async fn invalidate(&self) {
        self.cache.invalidate(TERRITORIES_KEY).await;
    }

    fn require_admin(&self, action: &str) -> Result<(), AppError> {
        if self.actor.current_role().is_admin() {
            return Ok(());
        }
        let err = AppError::Unauthorized(format!("Se requiere rol de administrador para {action}"));
        self.notifier
            .notify(Notification::error("Permiso denegado", err.user_message()));
        Err(err)
    }

    fn require_session(&self) -> Result<(), AppError> {
        if self.actor.current_user().is_some() {
            return Ok(());
        }
        let err = AppError::Unauthorized("Debes iniciar sesión".to_string());
        self.notifier
            .notify(Notification::error("Permiso denegado", err.user_message()));
        Err(err)
    }

    fn fail(&self, title: &str, err: AppError) -> AppError {
        self.notifier
            .notify(Notification::error(title, err.user_message()));
        err
    }

    pub async fn create_territory(
        &self,
        numero: u32,
        nombre: Option<String>,
        ring: PolygonRing,
    ) -> Result<Territory, AppError> {
        self.require_admin("crear territorios")?;

        let existing = self
            .known_territories()
            .await
            .map_err(|e| self.fail("Error al crear territorio", e))?;
        if let Err(message) = ensure_unique_numero(&existing, numero) {
            let kind = if numero == 0 {
                ValidationFailureKind::InvalidNumber
            } else {
                ValidationFailureKind::DuplicateNumber
            };
            return Err(self.fail(
                "Error al crear territorio",
                AppError::validation(kind, message),
            ));
        }

        let created_by = self.actor.current_user().map(|u| u.id);
        let draft = NewTerritory::new(numero, nombre, ring, created_by);
        match self.gateway.create_territory(&draft).await {
            Ok(territory) => {
                info!(territory_id = %territory.id, numero, "territory created");
                self.invalidate().await;
                self.notifier
                    .notify(Notification::success("Territorio creado"));
                Ok(territory)
            }
            Err(e) => Err(self.fail("Error al crear territorio", e)),
        }
    }

    pub async fn update_status(
        &self,
        id: &TerritoryId,
        status: TerritoryStatus,
    ) -> Result<Territory, AppError> {
        self.require_session()?;

        let now = Utc::now();
        let patch = TerritoryStatusPatch::for_transition(status, now);
        let target = id.clone();
        let optimistic = OptimisticUpdate::apply(self.cache.clone(), TERRITORIES_KEY, |list| {
            if let Some(t) = list.iter_mut().find(|t| t.id == target) {
                t.apply_status(status, now);
            }
        })
        .await;

        match self.gateway.update_territory_status(id, &patch).await {
            Ok(updated) => {
                let confirmed = updated.clone();
                optimistic
                    .confirm_with(|list| replace_territory(list, confirmed))
                    .await;
                self.invalidate().await;
                self.notifier
                    .notify(Notification::success("Estado actualizado"));
                Ok(updated)
            }
            Err(e) if self.offline.should_queue(&e) => {
                let local = optimistic
                    .current()
                    .await
                    .and_then(|list| list.into_iter().find(|t| &t.id == id));
                let Some(local) = local else {
                    optimistic.rollback().await;
                    return Err(self.fail("Error al actualizar estado", e));
                };
                let mut data = json!({ "id": id.as_str(), "estado": status.as_str() });
                if let Some(completed_at) = patch.ultima_fecha_completado {
                    data["ultima_fecha_completado"] = json!(completed_at);
                }
                if let Err(queue_err) = self
                    .offline
                    .enqueue(ChangeKind::Update, TABLE_TERRITORIES, data)
                    .await
                {
                    optimistic.rollback().await;
                    return Err(self.fail("Error al actualizar estado", queue_err));
                }
                optimistic.confirm();
                self.persist_cached().await;
                self.notifier
                    .notify(Notification::info(QUEUED_TITLE, QUEUED_MESSAGE));
                Ok(local)
            }
            Err(e) => {
                optimistic.rollback().await;
                Err(self.fail("Error al actualizar estado", e))
            }
        }
    }

    /// 辺の完了フラグを切り替える
    pub async fn toggle_edge(&self, id: &TerritoryId, edge: u32) -> Result<Territory, AppError> {
        self.require_session()?;

        let mut territory = self
            .get_territory(id)
            .await
            .map_err(|e| self.fail("Error al actualizar lado", e))?
            .ok_or_else(|| {
                self.fail(
                    "Error al actualizar lado",
                    AppError::NotFound(format!("territorio {id}")),
                )
            })?;
        territory.toggle_edge(edge).map_err(|message| {
            self.fail(
                "Error al actualizar lado",
                AppError::validation(ValidationFailureKind::EdgeOutOfRange, message),
            )
        })?;
        let edges = territory.lados_completados.clone();

        let optimistic_value = territory.clone();
        let optimistic = OptimisticUpdate::apply(self.cache.clone(), TERRITORIES_KEY, |list| {
            replace_territory(list, optimistic_value)
        })
        .await;

        match self.gateway.update_completed_edges(id, &edges).await {
            Ok(updated) => {
                let confirmed = updated.clone();
                optimistic
                    .confirm_with(|list| replace_territory(list, confirmed))
                    .await;
                self.invalidate().await;
                self.notifier
                    .notify(Notification::success("Lado actualizado"));
                Ok(updated)
            }
            Err(e) if self.offline.should_queue(&e) => {
                let data = json!({ "id": id.as_str(), "lados_completados": edges });
                if let Err(queue_err) = self
                    .offline
                    .enqueue(ChangeKind::Update, TABLE_TERRITORIES, data)
                    .await
                {
                    optimistic.rollback().await;
                    return Err(self.fail("Error al actualizar lado", queue_err));
                }
                optimistic.confirm();
                self.persist_cached().await;
                self.notifier
                    .notify(Notification::info(QUEUED_TITLE, QUEUED_MESSAGE));
                Ok(territory)
            }
            Err(e) => {
                optimistic.rollback().await;
                Err(self.fail("Error al actualizar lado", e))
            }
        }
    }

    /// 形状を差し替える。辺の完了状態はリセットされる
    pub async fn update_geometry(
        &self,
        id: &TerritoryId,
        ring: PolygonRing,
    ) -> Result<Territory, AppError> {
        self.require_admin("editar territorios")?;

        match self.gateway.update_territory_geometry(id, &ring).await {
            Ok(updated) => {
                self.invalidate().await;
                self.notifier
                    .notify(Notification::success("Territorio actualizado"));
                Ok(updated)
            }
            Err(e) => Err(self.fail("Error al actualizar territorio", e)),
        }
    }

    pub async fn delete_territory(&self, id: &TerritoryId) -> Result<(), AppError> {
        self.require_admin("eliminar territorios")?;

        match self.gateway.delete_territory(id).await {
            Ok(()) => {
                info!(territory_id = %id, "territory deleted");
                self.invalidate().await;
                self.notifier
                    .notify(Notification::success("Territorio eliminado"));
                Ok(())
            }
            Err(e @ AppError::NotFound(_)) => {
                self.invalidate().await;
                self.notifier.notify(Notification::error(
                    "Error al eliminar territorio",
                    "El territorio ya no existe",
                ));
                Err(e)
            }
            Err(e) => Err(self.fail("Error al eliminar territorio", e)),
        }
    }

    /// キュー済みの変更を含む現在の一覧を端末に保存する
    async fn persist_cached(&self) {
        if let Some(territories) = self.cache.peek(TERRITORIES_KEY).await {
            if let Err(e) = self
                .store
                .set_json(TERRITORIES_CACHE_KEY, &territories)
                .await
            {
                warn!(error = %e, "failed to persist territory list");
            }
        }
    }
}

fn replace_territory(list: &mut [Territory], territory: Territory) {
    if let Some(slot) = list.iter_mut().find(|t| t.id == territory.id) {
        *slot = territory;
    }
}

#[async_trait]
impl SyncObserver for TerritoryService {
    async fn on_synced(&self, _applied: u32) {
        self.invalidate().await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::ports::{ChangeReplayGateway, LocalStore, NotificationLevel};
    use crate::domain::entities::territory::fixtures::{square_ring, territory};
    use crate::domain::entities::{AuthUser, PendingChange};
    use crate::domain::value_objects::{Role, UserId};
    use crate::infrastructure::network::NetworkStatus;
    use crate::infrastructure::notifications::ChannelNotifier;
    use crate::infrastructure::storage::MemoryLocalStore;
    use mockall::{mock, predicate::*};
    use std::collections::BTreeSet;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    mock! {
        pub TerritoryGw {}

        #[async_trait]
        impl TerritoryGateway for TerritoryGw {
            async fn list_territories(&self) -> Result<Vec<Territory>, AppError>;
            async fn create_territory(&self, draft: &NewTerritory) -> Result<Territory, AppError>;
            async fn update_territory_status(
                &self,
                id: &TerritoryId,
                patch: &TerritoryStatusPatch,
            ) -> Result<Territory, AppError>;
            async fn update_completed_edges(
                &self,
                id: &TerritoryId,
                edges: &BTreeSet<u32>,
            ) -> Result<Territory, AppError>;
            async fn update_territory_geometry(
                &self,
                id: &TerritoryId,
                ring: &PolygonRing,
            ) -> Result<Territory, AppError>;
            async fn delete_territory(&self, id: &TerritoryId) -> Result<(), AppError>;
        }
    }

    mock! {
        pub Replay {}

        #[async_trait]
        impl ChangeReplayGateway for Replay {
            async fn apply_pending_change(&self, change: &PendingChange) -> Result<(), AppError>;
        }
    }

    pub(crate) struct StaticActor {
        pub user: Option<AuthUser>,
        pub role: Role,
    }

    impl StaticActor {
        pub fn admin() -> Self {
            Self {
                user: Some(AuthUser {
                    id: UserId::new("admin-1".into()).unwrap(),
                    email: Some("admin@example.com".into()),
                }),
                role: Role::Admin,
            }
        }

        pub fn publicador() -> Self {
            Self {
                user: Some(AuthUser {
                    id: UserId::new("user-1".into()).unwrap(),
                    email: None,
                }),
                role: Role::Publicador,
            }
        }
    }

    impl CurrentActor for StaticActor {
        fn current_user(&self) -> Option<AuthUser> {
            self.user.clone()
        }

        fn current_role(&self) -> Role {
            self.role
        }
    }

    pub(crate) struct Fixture {
        pub service: TerritoryService,
        pub offline: Arc<OfflineService>,
        pub store: PrefixedStore,
        pub cache: Arc<QueryCache<Vec<Territory>>>,
        pub notifications: UnboundedReceiver<Notification>,
    }

    pub(crate) fn fixture(gateway: MockTerritoryGw, actor: StaticActor, online: bool) -> Fixture {
        let backing: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let store = PrefixedStore::new(backing, "territorios_");
        let offline = Arc::new(OfflineService::new(
            store.clone(),
            Arc::new(MockReplay::new()),
            Arc::new(NetworkStatus::new(online)),
            3,
        ));
        let cache = Arc::new(QueryCache::new(Duration::from_secs(300)));
        let (notifier, notifications) = ChannelNotifier::new();
        let service = TerritoryService::new(
            Arc::new(gateway),
            cache.clone(),
            store.clone(),
            offline.clone(),
            Arc::new(actor),
            Arc::new(notifier),
        );
        Fixture {
            service,
            offline,
            store,
            cache,
            notifications,
        }
    }

    fn id(numero: u32) -> TerritoryId {
        TerritoryId::new(format!("t-{numero}")).unwrap()
    }

    #[tokio::test]
    async fn list_is_cached_and_persisted() {
        let mut gateway = MockTerritoryGw::new();
        gateway.expect_list_territories().times(1).returning(|| {
            Ok(vec![
                territory(1, TerritoryStatus::Pendiente),
                territory(2, TerritoryStatus::Iniciado),
            ])
        });
        let f = fixture(gateway, StaticActor::publicador(), true);

        assert_eq!(f.service.list_territories().await.unwrap().len(), 2);
        assert_eq!(f.service.list_territories().await.unwrap().len(), 2);

        let stored: Vec<Territory> = f.store.get_json(TERRITORIES_CACHE_KEY).await.unwrap().unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn transport_failure_falls_back_to_stored_list() {
        let mut gateway = MockTerritoryGw::new();
        gateway
            .expect_list_territories()
            .returning(|| Err(AppError::Network("offline".into())));
        let f = fixture(gateway, StaticActor::publicador(), false);

        assert!(f.service.list_territories().await.is_err());

        f.store
            .set_json(TERRITORIES_CACHE_KEY, &vec![territory(4, TerritoryStatus::Completado)])
            .await
            .unwrap();
        let list = f.service.list_territories().await.unwrap();
        assert_eq!(list[0].numero, 4);
    }

    #[tokio::test]
    async fn duplicate_number_is_rejected_before_network() {
        let mut gateway = MockTerritoryGw::new();
        gateway
            .expect_list_territories()
            .returning(|| Ok(vec![territory(12, TerritoryStatus::Pendiente)]));
        gateway.expect_create_territory().never();
        let mut f = fixture(gateway, StaticActor::admin(), true);

        let err = f
            .service
            .create_territory(12, Some("Centro".into()), square_ring())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::ValidationError {
                kind: ValidationFailureKind::DuplicateNumber,
                ..
            }
        ));
        let toast = f.notifications.try_recv().unwrap();
        assert_eq!(toast.level, NotificationLevel::Error);
    }

    #[tokio::test]
    async fn create_requires_admin() {
        let mut gateway = MockTerritoryGw::new();
        gateway.expect_create_territory().never();
        let f = fixture(gateway, StaticActor::publicador(), true);

        let err = f
            .service
            .create_territory(1, None, square_ring())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn create_invalidates_and_notifies() {
        let mut gateway = MockTerritoryGw::new();
        gateway
            .expect_list_territories()
            .returning(|| Ok(vec![territory(1, TerritoryStatus::Pendiente)]));
        gateway
            .expect_create_territory()
            .withf(|draft| {
                draft.numero == 12
                    && draft.nombre.as_deref() == Some("Centro")
                    && draft.created_by.as_ref().map(|u| u.as_str()) == Some("admin-1")
            })
            .times(1)
            .returning(|draft| {
                let mut t = territory(draft.numero, TerritoryStatus::Pendiente);
                t.nombre = draft.nombre.clone();
                Ok(t)
            });
        let mut f = fixture(gateway, StaticActor::admin(), true);

        let created = f
            .service
            .create_territory(12, Some("  Centro ".into()), square_ring())
            .await
            .unwrap();
        assert_eq!(created.numero, 12);
        assert!(!f.cache.is_fresh(TERRITORIES_KEY).await);
        assert_eq!(
            f.notifications.try_recv().unwrap().level,
            NotificationLevel::Success
        );
    }

    #[tokio::test]
    async fn completing_sends_timestamp_and_confirms() {
        let mut gateway = MockTerritoryGw::new();
        gateway
            .expect_list_territories()
            .returning(|| Ok(vec![territory(3, TerritoryStatus::Iniciado)]));
        gateway
            .expect_update_territory_status()
            .withf(|id, patch| {
                id.as_str() == "t-3"
                    && patch.estado == TerritoryStatus::Completado
                    && patch.ultima_fecha_completado.is_some()
            })
            .times(1)
            .returning(|_, patch| {
                let mut t = territory(3, TerritoryStatus::Completado);
                t.ultima_fecha_completado = patch.ultima_fecha_completado;
                Ok(t)
            });
        let f = fixture(gateway, StaticActor::publicador(), true);
        f.service.list_territories().await.unwrap();

        let updated = f
            .service
            .update_status(&id(3), TerritoryStatus::Completado)
            .await
            .unwrap();
        assert!(updated.ultima_fecha_completado.is_some());
        let cached = f.cache.peek(TERRITORIES_KEY).await.unwrap();
        assert_eq!(cached[0].estado, TerritoryStatus::Completado);
    }

    #[tokio::test]
    async fn failed_status_change_rolls_back() {
        let mut gateway = MockTerritoryGw::new();
        gateway
            .expect_list_territories()
            .returning(|| Ok(vec![territory(3, TerritoryStatus::Iniciado)]));
        gateway.expect_update_territory_status().returning(|_, _| {
            Err(AppError::Backend {
                status: 403,
                message: "permission denied for table territorios".into(),
            })
        });
        let mut f = fixture(gateway, StaticActor::publicador(), true);
        f.service.list_territories().await.unwrap();

        let err = f
            .service
            .update_status(&id(3), TerritoryStatus::Completado)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "permission denied for table territorios");
        let cached = f.cache.peek(TERRITORIES_KEY).await.unwrap();
        assert_eq!(cached[0].estado, TerritoryStatus::Iniciado);
        let toast = f.notifications.try_recv().unwrap();
        assert_eq!(
            toast.message.as_deref(),
            Some("permission denied for table territorios")
        );
    }

    #[tokio::test]
    async fn offline_status_change_is_queued() {
        let mut gateway = MockTerritoryGw::new();
        gateway
            .expect_list_territories()
            .times(1)
            .returning(|| Ok(vec![territory(3, TerritoryStatus::Pendiente)]));
        gateway
            .expect_update_territory_status()
            .returning(|_, _| Err(AppError::Network("offline".into())));
        let mut f = fixture(gateway, StaticActor::publicador(), false);
        f.service.list_territories().await.unwrap();

        let local = f
            .service
            .update_status(&id(3), TerritoryStatus::Iniciado)
            .await
            .unwrap();
        assert_eq!(local.estado, TerritoryStatus::Iniciado);

        let queued = f.offline.pending_changes().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].table, TABLE_TERRITORIES);
        assert_eq!(queued[0].data["estado"], "iniciado");
        assert!(queued[0].data.get("ultima_fecha_completado").is_none());
        assert_eq!(
            f.notifications.try_recv().unwrap().level,
            NotificationLevel::Info
        );
    }

    #[tokio::test]
    async fn toggle_edge_patches_edge_set() {
        let mut gateway = MockTerritoryGw::new();
        gateway
            .expect_list_territories()
            .returning(|| Ok(vec![territory(5, TerritoryStatus::Iniciado)]));
        gateway
            .expect_update_completed_edges()
            .with(eq(id(5)), eq(BTreeSet::from([2u32])))
            .times(1)
            .returning(|_, edges| {
                let mut t = territory(5, TerritoryStatus::Iniciado);
                t.lados_completados = edges.clone();
                Ok(t)
            });
        let mut f = fixture(gateway, StaticActor::publicador(), true);

        let updated = f.service.toggle_edge(&id(5), 2).await.unwrap();
        assert!(updated.lados_completados.contains(&2));
        let toast = f.notifications.try_recv().unwrap();
        assert_eq!(toast.level, NotificationLevel::Success);
        assert_eq!(toast.title, "Lado actualizado");

        let err = f.service.toggle_edge(&id(5), 9).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::ValidationError {
                kind: ValidationFailureKind::EdgeOutOfRange,
                ..
            }
        ));
        assert_eq!(
            f.notifications.try_recv().unwrap().level,
            NotificationLevel::Error
        );
    }

    #[tokio::test]
    async fn deleting_unknown_territory_is_handled() {
        let mut gateway = MockTerritoryGw::new();
        gateway
            .expect_delete_territory()
            .returning(|id| Err(AppError::NotFound(format!("territorio {id}"))));
        let mut f = fixture(gateway, StaticActor::admin(), true);

        let err = f.service.delete_territory(&id(99)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(
            f.notifications.try_recv().unwrap().message.as_deref(),
            Some("El territorio ya no existe")
        );
    }

    #[tokio::test]
    async fn field_work_list_orders_pending_first() {
        let mut gateway = MockTerritoryGw::new();
        gateway.expect_list_territories().returning(|| {
            let mut done = territory(1, TerritoryStatus::Completado);
            done.ultima_fecha_completado = Some(Utc::now());
            Ok(vec![
                done,
                territory(2, TerritoryStatus::Iniciado),
                territory(3, TerritoryStatus::Pendiente),
            ])
        });
        let f = fixture(gateway, StaticActor::publicador(), true);

        let numbers: Vec<u32> = f
            .service
            .field_work_list()
            .await
            .unwrap()
            .iter()
            .map(|t| t.numero)
            .collect();
        assert_eq!(numbers, vec![3, 2, 1]);
    }
}
