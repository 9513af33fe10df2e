use crate::application::ports::{
    AuthGateway, CurrentActor, Notification, Notifier, SessionToken, UserGateway,
};
use crate::domain::entities::{AuthUser, Session};
use crate::domain::value_objects::Role;
use crate::infrastructure::storage::{PrefixedStore, SESSION_KEY};
use crate::shared::error::AppError;
use crate::shared::validation::ValidationFailureKind;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Loading,
    Authenticated { session: Session, role: Role },
    Unauthenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }

    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            AuthState::Authenticated { session, .. } => Some(&session.user),
            _ => None,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            AuthState::Authenticated { role, .. } => *role,
            _ => Role::Publicador,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Map,
    Auth,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Map => "/",
            Route::Auth => "/auth",
        }
    }
}

/// セッションとロールを保持し、変更を `watch` で配信する
pub struct AuthService {
    gateway: Arc<dyn AuthGateway>,
    users: Arc<dyn UserGateway>,
    store: PrefixedStore,
    token: SessionToken,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<AuthState>,
}

impl AuthService {
    pub fn new(
        gateway: Arc<dyn AuthGateway>,
        users: Arc<dyn UserGateway>,
        store: PrefixedStore,
        token: SessionToken,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::Loading);
        Self {
            gateway,
            users,
            store,
            token,
            notifier,
            state,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    fn publish(&self, next: AuthState) {
        self.state.send_replace(next);
    }

    /// 保存済みのセッションを検証して状態を確定させる
    pub async fn initialize(&self) -> AuthState {
        self.publish(AuthState::Loading);

        let stored = match self.store.get_json::<Session>(SESSION_KEY).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "failed to read stored session");
                None
            }
        };

        let Some(mut session) = stored else {
            self.publish(AuthState::Unauthenticated);
            return self.state();
        };

        if session.is_expired(Utc::now()) {
            info!("stored session expired");
            self.forget_session().await;
            self.publish(AuthState::Unauthenticated);
            return self.state();
        }

        self.token.set(Some(session.access_token.clone())).await;
        match self.gateway.get_user(&session.access_token).await {
            Ok(user) => session.user = user,
            Err(e) if e.is_transport() => {
                // 通信できない場合は保存済みのセッションを信用する
                warn!(error = %e, "could not validate stored session, keeping it");
            }
            Err(e) => {
                info!(error = %e, "stored session rejected");
                self.forget_session().await;
                self.publish(AuthState::Unauthenticated);
                return self.state();
            }
        }

        self.establish(session).await;
        self.state()
    }

    /// 管理者判定の失敗は一般ユーザー扱い
    pub async fn resolve_role(&self) -> Role {
        match self.users.is_admin().await {
            Ok(true) => Role::Admin,
            Ok(false) => Role::Publicador,
            Err(e) => {
                error!(error = %e, "role lookup failed");
                Role::Publicador
            }
        }
    }

    async fn establish(&self, session: Session) {
        self.token.set(Some(session.access_token.clone())).await;
        if let Err(e) = self.store.set_json(SESSION_KEY, &session).await {
            warn!(error = %e, "failed to persist session");
        }
        let role = self.resolve_role().await;
        debug!(user_id = %session.user.id, role = %role, "session established");
        self.publish(AuthState::Authenticated { session, role });
    }

    async fn forget_session(&self) {
        self.token.set(None).await;
        if let Err(e) = self.store.remove(SESSION_KEY).await {
            warn!(error = %e, "failed to remove stored session");
        }
    }

    fn fail(&self, title: &str, err: AppError) -> AppError {
        self.notifier
            .notify(Notification::error(title, err.user_message()));
        err
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Route, AppError> {
        validate_credentials(email, password)
            .map_err(|e| self.fail("Error al iniciar sesión", e))?;

        let session = self
            .gateway
            .sign_in(email.trim(), password)
            .await
            .map_err(|e| self.fail("Error al iniciar sesión", e))?;

        info!(user_id = %session.user.id, "signed in");
        self.establish(session).await;
        self.notifier
            .notify(Notification::success("Sesión iniciada"));
        Ok(Route::Map)
    }

    /// メール確認が必要な場合は未ログインのまま `Route::Auth` を返す
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<String>,
    ) -> Result<Route, AppError> {
        validate_credentials(email, password)
            .map_err(|e| self.fail("Error al registrarse", e))?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(self.fail(
                "Error al registrarse",
                AppError::validation(
                    ValidationFailureKind::Generic,
                    format!("La contraseña debe tener al menos {MIN_PASSWORD_LEN} caracteres"),
                ),
            ));
        }
        let full_name = full_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let created = self
            .gateway
            .sign_up(email.trim(), password, full_name)
            .await
            .map_err(|e| self.fail("Error al registrarse", e))?;

        match created {
            Some(session) => {
                self.establish(session).await;
                self.notifier
                    .notify(Notification::success("Cuenta creada"));
                Ok(Route::Map)
            }
            None => {
                self.notifier.notify(Notification::info(
                    "Cuenta creada",
                    "Revisa tu correo para confirmar la cuenta",
                ));
                Ok(Route::Auth)
            }
        }
    }

    pub async fn sign_out(&self) -> Route {
        if let Some(token) = self.token.get().await {
            if let Err(e) = self.gateway.sign_out(&token).await {
                warn!(error = %e, "remote sign out failed");
            }
        }
        self.forget_session().await;
        self.publish(AuthState::Unauthenticated);
        info!("signed out");
        Route::Auth
    }

    /// 現在の状態での遷移先
    pub fn route(&self) -> Option<Route> {
        match *self.state.borrow() {
            AuthState::Loading => None,
            AuthState::Authenticated { .. } => Some(Route::Map),
            AuthState::Unauthenticated => Some(Route::Auth),
        }
    }

    /// セッション読み込み中は `None`
    pub fn guard(&self, requested: Route) -> Option<Route> {
        match (&*self.state.borrow(), requested) {
            (AuthState::Loading, _) => None,
            (AuthState::Unauthenticated, _) => Some(Route::Auth),
            (AuthState::Authenticated { .. }, Route::Auth) => Some(Route::Map),
            (AuthState::Authenticated { .. }, route) => Some(route),
        }
    }
}

impl CurrentActor for AuthService {
    fn current_user(&self) -> Option<AuthUser> {
        self.state.borrow().user().cloned()
    }

    fn current_role(&self) -> Role {
        self.state.borrow().role()
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<(), AppError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::validation(
            ValidationFailureKind::EmptyField,
            "Correo y contraseña son obligatorios",
        ));
    }
    if !email.contains('@') {
        return Err(AppError::validation(
            ValidationFailureKind::Generic,
            "Correo electrónico no válido",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::LocalStore;
    use crate::domain::entities::UserAccount;
    use crate::domain::value_objects::UserId;
    use crate::infrastructure::notifications::ChannelNotifier;
    use crate::infrastructure::storage::MemoryLocalStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use mockall::mock;

    mock! {
        pub AuthGw {}

        #[async_trait]
        impl AuthGateway for AuthGw {
            async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError>;
            async fn sign_up(
                &self,
                email: &str,
                password: &str,
                full_name: Option<String>,
            ) -> Result<Option<Session>, AppError>;
            async fn get_user(&self, access_token: &str) -> Result<AuthUser, AppError>;
            async fn sign_out(&self, access_token: &str) -> Result<(), AppError>;
        }
    }

    mock! {
        pub UserGw {}

        #[async_trait]
        impl UserGateway for UserGw {
            async fn is_admin(&self) -> Result<bool, AppError>;
            async fn list_users(&self) -> Result<Vec<UserAccount>, AppError>;
            async fn update_user_role(&self, user_id: &UserId, role: Role) -> Result<(), AppError>;
            async fn delete_user(&self, user_id: &UserId) -> Result<(), AppError>;
        }
    }

    fn session(token: &str) -> Session {
        Session {
            access_token: token.into(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::hours(1)),
            user: AuthUser {
                id: UserId::new("u1".into()).unwrap(),
                email: Some("ana@example.com".into()),
            },
        }
    }

    fn setup(auth: MockAuthGw, users: MockUserGw) -> (AuthService, PrefixedStore, SessionToken) {
        let backing: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let store = PrefixedStore::new(backing, "territorios_");
        let token = SessionToken::new();
        let (notifier, _rx) = ChannelNotifier::new();
        let service = AuthService::new(
            Arc::new(auth),
            Arc::new(users),
            store.clone(),
            token.clone(),
            Arc::new(notifier),
        );
        (service, store, token)
    }

    #[tokio::test]
    async fn starts_loading_then_unauthenticated_without_session() {
        let (service, _, _) = setup(MockAuthGw::new(), MockUserGw::new());
        assert_eq!(service.state(), AuthState::Loading);
        assert_eq!(service.guard(Route::Map), None);

        assert_eq!(service.initialize().await, AuthState::Unauthenticated);
        assert_eq!(service.guard(Route::Map), Some(Route::Auth));
    }

    #[tokio::test]
    async fn sign_in_resolves_role_and_persists_session() {
        let mut auth = MockAuthGw::new();
        auth.expect_sign_in()
            .withf(|email, _| email == "ana@example.com")
            .returning(|_, _| Ok(session("tok-1")));
        let mut users = MockUserGw::new();
        users.expect_is_admin().returning(|| Ok(true));
        let (service, store, token) = setup(auth, users);
        let mut rx = service.subscribe();

        let route = service.sign_in(" ana@example.com ", "secreto").await.unwrap();

        assert_eq!(route, Route::Map);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().role(), Role::Admin);
        assert_eq!(service.current_role(), Role::Admin);
        assert_eq!(token.get().await.as_deref(), Some("tok-1"));
        let stored: Option<Session> = store.get_json(SESSION_KEY).await.unwrap();
        assert_eq!(stored.unwrap().access_token, "tok-1");
    }

    #[tokio::test]
    async fn failed_role_lookup_defaults_to_publicador() {
        let mut auth = MockAuthGw::new();
        auth.expect_sign_in().returning(|_, _| Ok(session("tok")));
        let mut users = MockUserGw::new();
        users
            .expect_is_admin()
            .returning(|| Err(AppError::Network("down".into())));
        let (service, _, _) = setup(auth, users);

        service.sign_in("ana@example.com", "secreto").await.unwrap();
        assert!(service.state().is_authenticated());
        assert_eq!(service.current_role(), Role::Publicador);
    }

    #[tokio::test]
    async fn sign_out_clears_everything() {
        let mut auth = MockAuthGw::new();
        auth.expect_sign_in().returning(|_, _| Ok(session("tok")));
        auth.expect_sign_out()
            .times(1)
            .returning(|_| Err(AppError::Network("offline".into())));
        let mut users = MockUserGw::new();
        users.expect_is_admin().returning(|| Ok(false));
        let (service, store, token) = setup(auth, users);

        service.sign_in("ana@example.com", "secreto").await.unwrap();
        assert_eq!(service.sign_out().await, Route::Auth);

        assert_eq!(service.state(), AuthState::Unauthenticated);
        assert!(service.current_user().is_none());
        assert!(token.get().await.is_none());
        assert!(store.get_json::<Session>(SESSION_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stored_session_is_trusted_when_offline() {
        let mut auth = MockAuthGw::new();
        auth.expect_get_user()
            .returning(|_| Err(AppError::Network("offline".into())));
        let mut users = MockUserGw::new();
        users.expect_is_admin().returning(|| Ok(false));
        let (service, store, _) = setup(auth, users);
        store.set_json(SESSION_KEY, &session("stored")).await.unwrap();

        let state = service.initialize().await;
        assert!(state.is_authenticated());
        assert_eq!(service.route(), Some(Route::Map));
        assert_eq!(service.guard(Route::Auth), Some(Route::Map));
    }

    #[tokio::test]
    async fn rejected_stored_session_is_discarded() {
        let mut auth = MockAuthGw::new();
        auth.expect_get_user().returning(|_| {
            Err(AppError::Backend {
                status: 401,
                message: "invalid JWT".into(),
            })
        });
        let (service, store, token) = setup(auth, MockUserGw::new());
        store.set_json(SESSION_KEY, &session("stale")).await.unwrap();

        assert_eq!(service.initialize().await, AuthState::Unauthenticated);
        assert!(token.get().await.is_none());
        assert!(store.get_json::<Session>(SESSION_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sign_up_without_session_stays_on_auth() {
        let mut auth = MockAuthGw::new();
        auth.expect_sign_up()
            .withf(|_, _, name| name.as_deref() == Some("Ana"))
            .returning(|_, _, _| Ok(None));
        let (service, _, _) = setup(auth, MockUserGw::new());

        let route = service
            .sign_up("ana@example.com", "secreto", Some(" Ana ".into()))
            .await
            .unwrap();
        assert_eq!(route, Route::Auth);
        assert!(!service.state().is_authenticated());

        assert!(matches!(
            service.sign_up("ana@example.com", "123", None).await,
            Err(AppError::ValidationError { .. })
        ));
    }
}
