//! Tests for configuration loading.

use std::path::Path;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use portcullis::config::SessionConfig;
use portcullis::error::PortcullisError;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 8] = [
    "PORTCULLIS_API_BASE_URL",
    "PORTCULLIS_APP_ORIGIN",
    "PORTCULLIS_EXTERNAL_LOGIN_URL",
    "PORTCULLIS_LOGIN_PATH",
    "PORTCULLIS_FORBIDDEN_PATH",
    "PORTCULLIS_DEFAULT_ROUTE",
    "PORTCULLIS_REQUEST_TIMEOUT_SECS",
    "PORTCULLIS_STORAGE_DIR",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clear_config_env() {
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
}

#[test]
fn config_defaults_describe_local_console() {
    let config = SessionConfig::new();
    assert_eq!(config.api_base_url(), "http://localhost:8000/api/v1");
    assert_eq!(config.app_origin(), "http://localhost:5173");
    assert_eq!(config.app_root(), "http://localhost:5173/");
    assert_eq!(
        config.external_login_url(),
        "http://localhost:8000/api/v1/auth/login/google"
    );
    assert_eq!(config.login_path(), "/login");
    assert_eq!(config.forbidden_path(), "/forbidden");
    assert_eq!(config.default_route(), "/admin");
    assert_eq!(config.request_timeout(), Duration::from_secs(30));
}

#[test]
fn config_from_env_applies_overrides() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();

    std::env::set_var("PORTCULLIS_API_BASE_URL", "https://api.example.com/api/v1/");
    std::env::set_var("PORTCULLIS_APP_ORIGIN", "https://console.example.com");
    std::env::set_var("PORTCULLIS_DEFAULT_ROUTE", "/admin/users");
    std::env::set_var("PORTCULLIS_REQUEST_TIMEOUT_SECS", "5");
    std::env::set_var("PORTCULLIS_STORAGE_DIR", "/var/lib/portcullis");

    let config = SessionConfig::from_env().unwrap();
    assert_eq!(config.api_base_url(), "https://api.example.com/api/v1");
    assert_eq!(config.app_root(), "https://console.example.com/");
    assert_eq!(config.default_route(), "/admin/users");
    assert_eq!(config.request_timeout(), Duration::from_secs(5));
    assert_eq!(config.storage_dir(), Path::new("/var/lib/portcullis"));
    assert_eq!(config.login_path(), "/login");
}

#[test]
fn config_from_env_uses_explicit_external_login_url() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();

    std::env::set_var(
        "PORTCULLIS_EXTERNAL_LOGIN_URL",
        "https://sso.example.com/oauth/start",
    );

    let config = SessionConfig::from_env().unwrap();
    assert_eq!(config.external_login_url(), "https://sso.example.com/oauth/start");
}

#[test]
fn config_from_env_ignores_blank_values() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();

    std::env::set_var("PORTCULLIS_LOGIN_PATH", "   ");

    let config = SessionConfig::from_env().unwrap();
    assert_eq!(config.login_path(), "/login");
}

#[test]
fn config_from_env_rejects_invalid_timeout() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();

    std::env::set_var("PORTCULLIS_REQUEST_TIMEOUT_SECS", "soon");

    let err = SessionConfig::from_env().unwrap_err();
    assert!(matches!(err, PortcullisError::Configuration(ref msg) if msg.contains("soon")));
}

#[test]
fn config_rejects_relative_paths_and_zero_timeout() {
    assert!(matches!(
        SessionConfig::new().with_login_path("login"),
        Err(PortcullisError::Configuration(_))
    ));
    assert!(matches!(
        SessionConfig::new().with_request_timeout(Duration::ZERO),
        Err(PortcullisError::Configuration(_))
    ));
}
