use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_url: String,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub territories_stale_secs: u64,
    pub observations_stale_secs: u64,
    pub users_stale_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub max_retry: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                // ビルド時に埋め込まれた値を既定値にする
                url: option_env!("TERRITORIOS_BACKEND_URL")
                    .unwrap_or_default()
                    .to_string(),
                anon_key: option_env!("TERRITORIOS_BACKEND_ANON_KEY")
                    .unwrap_or_default()
                    .to_string(),
                request_timeout: 30,
            },
            storage: StorageConfig {
                database_url: default_database_url(),
                key_prefix: "territorios_".to_string(),
            },
            cache: CacheConfig {
                territories_stale_secs: 300, // 5 minutes
                observations_stale_secs: 60,
                users_stale_secs: 60,
            },
            sync: SyncConfig {
                auto_sync: true,
                max_retry: 3,
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("TERRITORIOS_BACKEND_URL") {
            if !v.trim().is_empty() {
                cfg.backend.url = v.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(v) = std::env::var("TERRITORIOS_BACKEND_ANON_KEY") {
            if !v.trim().is_empty() {
                cfg.backend.anon_key = v.trim().to_string();
            }
        }
        if let Some(value) = env_u64("TERRITORIOS_REQUEST_TIMEOUT_SECS") {
            cfg.backend.request_timeout = value.max(1);
        }
        if let Ok(v) = std::env::var("TERRITORIOS_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.storage.database_url = v;
            }
        }
        if let Ok(v) = std::env::var("TERRITORIOS_STORAGE_PREFIX") {
            cfg.storage.key_prefix = v;
        }
        if let Some(value) = env_u64("TERRITORIOS_TERRITORIES_STALE_SECS") {
            cfg.cache.territories_stale_secs = value;
        }
        if let Some(value) = env_u64("TERRITORIOS_OBSERVATIONS_STALE_SECS") {
            cfg.cache.observations_stale_secs = value;
        }
        if let Some(value) = env_u64("TERRITORIOS_USERS_STALE_SECS") {
            cfg.cache.users_stale_secs = value;
        }
        if let Ok(v) = std::env::var("TERRITORIOS_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Some(value) = env_u64("TERRITORIOS_SYNC_MAX_RETRY") {
            cfg.sync.max_retry = u32::try_from(value).unwrap_or(u32::MAX).max(1);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.backend.url.trim().is_empty() {
            return Err("Backend url must be set (TERRITORIOS_BACKEND_URL)".to_string());
        }
        if !self.backend.url.starts_with("http://") && !self.backend.url.starts_with("https://") {
            return Err("Backend url must start with http:// or https://".to_string());
        }
        if self.backend.anon_key.trim().is_empty() {
            return Err("Backend anon key must be set (TERRITORIOS_BACKEND_ANON_KEY)".to_string());
        }
        if self.backend.request_timeout == 0 {
            return Err("Backend request_timeout must be greater than 0".to_string());
        }
        if self.storage.database_url.trim().is_empty() {
            return Err("Storage database_url must not be empty".to_string());
        }
        if self.sync.max_retry == 0 {
            return Err("Sync max_retry must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn default_database_url() -> String {
    let base = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("./data"));
    format!(
        "sqlite://{}?mode=rwc",
        base.join("territorios").join("local.db").display()
    )
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| parse_u64(&v))
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.backend.url = "https://example.supabase.co".into();
        cfg.backend.anon_key = "anon".into();
        cfg
    }

    #[test]
    fn default_territories_stay_fresh_for_five_minutes() {
        assert_eq!(AppConfig::default().cache.territories_stale_secs, 300);
    }

    #[test]
    fn validate_requires_backend_endpoint() {
        let mut cfg = configured();
        assert!(cfg.validate().is_ok());

        cfg.backend.url = String::new();
        assert!(cfg.validate().is_err());

        cfg.backend.url = "ftp://example".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_retry() {
        let mut cfg = configured();
        cfg.sync.max_retry = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_bool_falls_back_to_default() {
        assert!(parse_bool("yes", false));
        assert!(!parse_bool("off", true));
        assert!(parse_bool("maybe", true));
    }
}
