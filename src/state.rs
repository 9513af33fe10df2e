use crate::application::ports::{
    AuthGateway, ChangeReplayGateway, CurrentActor, LocalStore, MapSurface, Notifier,
    ObservationGateway, SessionToken, TerritoryGateway, UserGateway,
};
use crate::application::services::auth_service::{AuthState, Route};
use crate::application::services::sync_service::SyncObserver;
use crate::application::services::{
    AuthService, MapController, ObservationService, OfflineService, SyncService,
    TerritoryService, UserService,
};
use crate::domain::entities::{Observation, Territory, UserAccount};
use crate::infrastructure::backend::{RestClient, RestGateway};
use crate::infrastructure::cache::QueryCache;
use crate::infrastructure::map::GeoJsonMapSurface;
use crate::infrastructure::network::NetworkStatus;
use crate::infrastructure::storage::{PrefixedStore, SqliteLocalStore};
use crate::presentation::handlers::{
    AuthHandler, ObservationHandler, SyncHandler, TerritoryHandler, UserHandler,
};
use crate::shared::config::AppConfig;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// バックエンドへの入口一式
#[derive(Clone)]
pub struct Gateways {
    pub territories: Arc<dyn TerritoryGateway>,
    pub observations: Arc<dyn ObservationGateway>,
    pub users: Arc<dyn UserGateway>,
    pub replay: Arc<dyn ChangeReplayGateway>,
    pub auth: Arc<dyn AuthGateway>,
}

impl Gateways {
    pub fn rest(gateway: Arc<RestGateway>) -> Self {
        Self {
            territories: gateway.clone(),
            observations: gateway.clone(),
            users: gateway.clone(),
            replay: gateway.clone(),
            auth: gateway,
        }
    }
}

/// アプリケーション全体の状態を管理する構造体
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub network: Arc<NetworkStatus>,
    pub map_surface: Arc<GeoJsonMapSurface>,
    pub auth_service: Arc<AuthService>,
    pub territory_service: Arc<TerritoryService>,
    pub observation_service: Arc<ObservationService>,
    pub user_service: Arc<UserService>,
    pub offline_service: Arc<OfflineService>,
    pub sync_service: Arc<SyncService>,
    pub map_controller: Arc<MapController>,
    territory_cache: Arc<QueryCache<Vec<Territory>>>,
    observation_cache: Arc<QueryCache<Vec<Observation>>>,
    user_cache: Arc<QueryCache<Vec<UserAccount>>>,
}

impl AppState {
    /// REST バックエンドと SQLite のローカルストアで組み立てる
    pub async fn new(config: AppConfig, notifier: Arc<dyn Notifier>) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

        ensure_database_dir(&config.storage.database_url)?;
        let local_store: Arc<dyn LocalStore> =
            Arc::new(SqliteLocalStore::connect(&config.storage.database_url).await?);

        let token = SessionToken::new();
        let client = RestClient::new(&config.backend, token.clone())?;
        let gateways = Gateways::rest(Arc::new(RestGateway::new(client)));

        Ok(Self::from_parts(
            config,
            gateways,
            local_store,
            token,
            Arc::new(NetworkStatus::default()),
            notifier,
        ))
    }

    pub fn from_parts(
        config: AppConfig,
        gateways: Gateways,
        local_store: Arc<dyn LocalStore>,
        token: SessionToken,
        network: Arc<NetworkStatus>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let store = PrefixedStore::new(local_store, config.storage.key_prefix.clone());

        let territory_cache = Arc::new(QueryCache::new(Duration::from_secs(
            config.cache.territories_stale_secs,
        )));
        let observation_cache = Arc::new(QueryCache::new(Duration::from_secs(
            config.cache.observations_stale_secs,
        )));
        let user_cache = Arc::new(QueryCache::new(Duration::from_secs(
            config.cache.users_stale_secs,
        )));

        let auth_service = Arc::new(AuthService::new(
            gateways.auth.clone(),
            gateways.users.clone(),
            store.clone(),
            token,
            notifier.clone(),
        ));
        let actor: Arc<dyn CurrentActor> = auth_service.clone();

        let offline_service = Arc::new(OfflineService::new(
            store.clone(),
            gateways.replay.clone(),
            network.clone(),
            config.sync.max_retry,
        ));

        let territory_service = Arc::new(TerritoryService::new(
            gateways.territories.clone(),
            territory_cache.clone(),
            store,
            offline_service.clone(),
            actor.clone(),
            notifier.clone(),
        ));
        let observation_service = Arc::new(ObservationService::new(
            gateways.observations.clone(),
            observation_cache.clone(),
            offline_service.clone(),
            actor.clone(),
            notifier.clone(),
        ));
        let user_service = Arc::new(UserService::new(
            gateways.users.clone(),
            user_cache.clone(),
            actor,
            notifier,
        ));

        let observers: Vec<Arc<dyn SyncObserver>> = vec![
            territory_service.clone() as Arc<dyn SyncObserver>,
            observation_service.clone() as Arc<dyn SyncObserver>,
        ];
        let sync_service = Arc::new(SyncService::new(
            network.clone(),
            offline_service.clone(),
            observers,
        ));

        let map_surface = Arc::new(GeoJsonMapSurface::new());
        let map_controller = Arc::new(MapController::new(
            map_surface.clone() as Arc<dyn MapSurface>,
            territory_service.clone(),
        ));

        Self {
            config: Arc::new(config),
            network,
            map_surface,
            auth_service,
            territory_service,
            observation_service,
            user_service,
            offline_service,
            sync_service,
            map_controller,
            territory_cache,
            observation_cache,
            user_cache,
        }
    }

    /// 保存済みセッションを復元し、自動同期が有効なら接続監視を始める
    pub async fn start(&self) -> (AuthState, Option<JoinHandle<()>>) {
        let auth_state = self.auth_service.initialize().await;

        let watcher = if self.config.sync.auto_sync {
            if let Err(e) = self.sync_service.start_sync().await {
                warn!("Initial sync failed: {}", e);
            }
            Some(self.sync_service.clone().watch_connectivity())
        } else {
            None
        };

        info!(authenticated = auth_state.is_authenticated(), "app state started");
        (auth_state, watcher)
    }

    /// ログアウトしてキャッシュを全て捨てる
    pub async fn sign_out(&self) -> Route {
        let route = self.auth_service.sign_out().await;
        self.territory_cache.clear().await;
        self.observation_cache.clear().await;
        self.user_cache.clear().await;
        route
    }

    pub fn territory_handler(&self) -> TerritoryHandler {
        TerritoryHandler::new(self.territory_service.clone())
    }

    pub fn observation_handler(&self) -> ObservationHandler {
        ObservationHandler::new(self.observation_service.clone())
    }

    pub fn user_handler(&self) -> UserHandler {
        UserHandler::new(self.user_service.clone())
    }

    pub fn auth_handler(&self) -> AuthHandler {
        AuthHandler::new(self.auth_service.clone())
    }

    pub fn sync_handler(&self) -> SyncHandler {
        SyncHandler::new(self.sync_service.clone(), self.offline_service.clone())
    }
}

/// `sqlite://<path>?...` の親ディレクトリを作る
fn ensure_database_dir(database_url: &str) -> anyhow::Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_dir_is_created_for_file_urls() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("local.db");
        ensure_database_dir(&format!("sqlite://{}?mode=rwc", db.display())).unwrap();
        assert!(dir.path().join("nested").is_dir());

        ensure_database_dir("sqlite::memory:").unwrap();
    }
}
