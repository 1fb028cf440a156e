//! Configuration system (layered: code > env > defaults).

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::error::PortcullisError;
use crate::host::default_storage_dir;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_FORBIDDEN_PATH: &str = "/forbidden";
pub const DEFAULT_ROUTE: &str = "/admin";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const EXTERNAL_LOGIN_SUFFIX: &str = "/auth/login/google";

/// Where the backend lives and how the console's routes are laid out.
///
/// # Example
/// ```
/// use portcullis::config::SessionConfig;
///
/// let config = SessionConfig::new()
///     .with_api_base_url("https://api.example.com/api/v1")?
///     .with_default_route("/admin/users")?;
/// assert_eq!(
///     config.external_login_url(),
///     "https://api.example.com/api/v1/auth/login/google"
/// );
/// # Ok::<(), portcullis::error::PortcullisError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    api_base_url: String,
    app_origin: String,
    external_login_url: Option<String>,
    login_path: String,
    forbidden_path: String,
    default_route: String,
    request_timeout: Duration,
    storage_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfig {
    /// Built-in defaults, pointing at a local development backend.
    pub fn new() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            external_login_url: None,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            forbidden_path: DEFAULT_FORBIDDEN_PATH.to_string(),
            default_route: DEFAULT_ROUTE.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            storage_dir: default_storage_dir(),
        }
    }

    /// Load from `PORTCULLIS_*` environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, PortcullisError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup` on top of the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PortcullisError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self::new();

        if let Some(url) = var("PORTCULLIS_API_BASE_URL") {
            config = config.with_api_base_url(&url)?;
        }
        if let Some(origin) = var("PORTCULLIS_APP_ORIGIN") {
            config = config.with_app_origin(&origin)?;
        }
        if let Some(url) = var("PORTCULLIS_EXTERNAL_LOGIN_URL") {
            config = config.with_external_login_url(&url)?;
        }
        if let Some(path) = var("PORTCULLIS_LOGIN_PATH") {
            config = config.with_login_path(&path)?;
        }
        if let Some(path) = var("PORTCULLIS_FORBIDDEN_PATH") {
            config = config.with_forbidden_path(&path)?;
        }
        if let Some(path) = var("PORTCULLIS_DEFAULT_ROUTE") {
            config = config.with_default_route(&path)?;
        }
        if let Some(secs) = var("PORTCULLIS_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                PortcullisError::Configuration(format!(
                    "PORTCULLIS_REQUEST_TIMEOUT_SECS must be a whole number of seconds, got '{secs}'"
                ))
            })?;
            config = config.with_request_timeout(Duration::from_secs(secs))?;
        }
        if let Some(dir) = var("PORTCULLIS_STORAGE_DIR") {
            config = config.with_storage_dir(dir);
        }

        Ok(config)
    }

    pub fn with_api_base_url(mut self, url: &str) -> Result<Self, PortcullisError> {
        self.api_base_url = parse_http_url("API base URL", url)?
            .as_str()
            .trim_end_matches('/')
            .to_string();
        Ok(self)
    }

    /// The origin the console is served from. Path components are dropped.
    pub fn with_app_origin(mut self, origin: &str) -> Result<Self, PortcullisError> {
        self.app_origin = parse_http_url("app origin", origin)?
            .origin()
            .ascii_serialization();
        Ok(self)
    }

    pub fn with_external_login_url(mut self, url: &str) -> Result<Self, PortcullisError> {
        self.external_login_url = Some(parse_http_url("external login URL", url)?.to_string());
        Ok(self)
    }

    pub fn with_login_path(mut self, path: &str) -> Result<Self, PortcullisError> {
        self.login_path = route_path("login path", path)?;
        Ok(self)
    }

    pub fn with_forbidden_path(mut self, path: &str) -> Result<Self, PortcullisError> {
        self.forbidden_path = route_path("forbidden path", path)?;
        Ok(self)
    }

    pub fn with_default_route(mut self, path: &str) -> Result<Self, PortcullisError> {
        self.default_route = route_path("default route", path)?;
        Ok(self)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self, PortcullisError> {
        if timeout.is_zero() {
            return Err(PortcullisError::Configuration(
                "Request timeout must be greater than zero".to_string(),
            ));
        }
        self.request_timeout = timeout;
        Ok(self)
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    /// Backend API root without a trailing slash.
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// `scheme://host[:port]` of the console, without a trailing slash.
    pub fn app_origin(&self) -> &str {
        &self.app_origin
    }

    /// The external identity provider's entry point on the backend.
    pub fn external_login_url(&self) -> String {
        self.external_login_url
            .clone()
            .unwrap_or_else(|| format!("{}{EXTERNAL_LOGIN_SUFFIX}", self.api_base_url))
    }

    /// Landing the identity provider returns to: the console's root.
    pub fn app_root(&self) -> String {
        format!("{}/", self.app_origin)
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn forbidden_path(&self) -> &str {
        &self.forbidden_path
    }

    pub fn default_route(&self) -> &str {
        &self.default_route
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}

fn parse_http_url(what: &str, raw: &str) -> Result<Url, PortcullisError> {
    let url = Url::parse(raw.trim())
        .map_err(|err| PortcullisError::Configuration(format!("Invalid {what} '{raw}': {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(PortcullisError::Configuration(format!(
            "Invalid {what} '{raw}': unsupported scheme '{other}'"
        ))),
    }
}

fn route_path(what: &str, raw: &str) -> Result<String, PortcullisError> {
    let path = raw.trim();
    if !path.starts_with('/') || path.starts_with("//") {
        return Err(PortcullisError::Configuration(format!(
            "Invalid {what} '{raw}': must be an absolute in-app path"
        )));
    }
    Ok(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_point_at_local_backend() {
        let config = SessionConfig::new();
        assert_eq!(config.api_base_url(), DEFAULT_API_BASE_URL);
        assert_eq!(
            config.external_login_url(),
            "http://localhost:8000/api/v1/auth/login/google"
        );
        assert_eq!(config.app_root(), "http://localhost:5173/");
        assert_eq!(config.login_path(), "/login");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[
            ("PORTCULLIS_API_BASE_URL", "https://api.example.com/v2/"),
            ("PORTCULLIS_APP_ORIGIN", "https://console.example.com/some/path"),
            ("PORTCULLIS_DEFAULT_ROUTE", "/admin/users"),
            ("PORTCULLIS_REQUEST_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.api_base_url(), "https://api.example.com/v2");
        assert_eq!(config.app_root(), "https://console.example.com/");
        assert_eq!(config.default_route(), "/admin/users");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn explicit_external_login_url_wins() {
        let config = SessionConfig::new()
            .with_external_login_url("https://sso.example.com/start")
            .unwrap();
        assert_eq!(config.external_login_url(), "https://sso.example.com/start");
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        for pairs in [
            [("PORTCULLIS_API_BASE_URL", "not a url")],
            [("PORTCULLIS_APP_ORIGIN", "ftp://example.com")],
            [("PORTCULLIS_LOGIN_PATH", "login")],
            [("PORTCULLIS_REQUEST_TIMEOUT_SECS", "soon")],
            [("PORTCULLIS_REQUEST_TIMEOUT_SECS", "0")],
        ] {
            let err = SessionConfig::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(
                matches!(err, PortcullisError::Configuration(_)),
                "{pairs:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[("PORTCULLIS_LOGIN_PATH", "  ")])).unwrap();
        assert_eq!(config.login_path(), DEFAULT_LOGIN_PATH);
    }
}
