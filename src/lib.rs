// モジュール定義
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
pub mod shared;
pub mod state;

pub use shared::{AppConfig, AppError};
pub use state::{AppState, Gateways};

/// ログ出力を初期化する。`RUST_LOG` があればそちらを優先
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "territorios=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
