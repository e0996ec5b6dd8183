use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PortalConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_probe_path")]
    pub probe_path: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            probe_path: default_probe_path(),
            probe_timeout_secs: default_probe_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_register_path")]
    pub register_path: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_profile_path")]
    pub profile_path: String,
    #[serde(default = "default_refresh_header")]
    pub refresh_header: String,
    #[serde(default)]
    pub expiry_leeway_secs: i64,
    #[serde(default)]
    pub single_flight_refresh: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            register_path: default_register_path(),
            refresh_path: default_refresh_path(),
            profile_path: default_profile_path(),
            refresh_header: default_refresh_header(),
            expiry_leeway_secs: 0,
            single_flight_refresh: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_session_file")]
    pub session_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            session_file: default_session_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_search_ttl")]
    pub search_ttl_secs: u64,
    #[serde(default = "default_search_capacity")]
    pub search_max_capacity: u64,
    #[serde(default = "default_min_query_len")]
    pub search_min_query_len: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search_ttl_secs: default_search_ttl(),
            search_max_capacity: default_search_capacity(),
            search_min_query_len: default_min_query_len(),
        }
    }
}

fn default_probe_path() -> String {
    "/health".into()
}
fn default_probe_timeout() -> u64 {
    3
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_request_timeout() -> u64 {
    30
}
fn default_login_path() -> String {
    "/auth/authenticate".into()
}
fn default_register_path() -> String {
    "/auth/register".into()
}
fn default_refresh_path() -> String {
    "/auth/refresh-token".into()
}
fn default_profile_path() -> String {
    "/users/profile".into()
}
fn default_refresh_header() -> String {
    "x-refresh-token".into()
}
fn default_session_file() -> String {
    "data/session.json".into()
}
fn default_search_ttl() -> u64 {
    300
}
fn default_search_capacity() -> u64 {
    1_000
}
fn default_min_query_len() -> usize {
    2
}

fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "portal.toml".to_string())
}

pub fn load_default() -> Result<PortalConfig> {
    load_from_file(&config_path())
}

pub fn load_from_file(path: &str) -> Result<PortalConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<PortalConfig> {
    let cfg: PortalConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl PortalConfig {
    /// Load `CONFIG_PATH` (or `portal.toml`); a missing file falls back to
    /// defaults plus environment overrides.
    pub fn load_and_validate() -> Result<Self> {
        let path = config_path();
        let mut cfg = if std::path::Path::new(&path).exists() {
            load_from_file(&path).map_err(|e| anyhow!("reading {path}: {e}"))?
        } else {
            PortalConfig::default()
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.api.normalize_from_env();
        self.api.validate()?;
        self.auth.normalize();
        self.auth.validate()?;
        self.cache.validate()?;
        if self.storage.session_file.trim().is_empty() {
            self.storage.session_file = default_session_file();
        }
        Ok(())
    }
}

impl ApiConfig {
    pub fn normalize_from_env(&mut self) {
        // an empty base_url in TOML is filled from PORTAL_API_URL
        if self.base_url.trim().is_empty() {
            if let Ok(url) = std::env::var("PORTAL_API_URL") {
                self.base_url = url;
            }
        }
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        self.probe_path = with_leading_slash(&self.probe_path);
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(anyhow!(
                "api.base_url is empty; set it in the config file or PORTAL_API_URL"
            ));
        }
        let lower = self.base_url.to_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(anyhow!("api.base_url must start with http:// or https://"));
        }
        if self.probe_timeout_secs == 0
            || self.connect_timeout_secs == 0
            || self.request_timeout_secs == 0
        {
            return Err(anyhow!("api timeouts must be positive seconds"));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AuthConfig {
    fn normalize(&mut self) {
        self.login_path = with_leading_slash(&self.login_path);
        self.register_path = with_leading_slash(&self.register_path);
        self.refresh_path = with_leading_slash(&self.refresh_path);
        self.profile_path = with_leading_slash(&self.profile_path);
        self.refresh_header = self.refresh_header.trim().to_string();
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_header.is_empty() {
            return Err(anyhow!("auth.refresh_header must not be blank"));
        }
        if self.expiry_leeway_secs < 0 {
            return Err(anyhow!("auth.expiry_leeway_secs must be >= 0"));
        }
        Ok(())
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.search_ttl_secs == 0 {
            return Err(anyhow!("cache.search_ttl_secs must be positive"));
        }
        if self.search_max_capacity == 0 {
            return Err(anyhow!("cache.search_max_capacity must be >= 1"));
        }
        Ok(())
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }
}

fn with_leading_slash(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() -> Result<()> {
        let mut cfg = load_from_str(
            r#"
            [api]
            base_url = "https://api.billing.example/"
            "#,
        )?;
        cfg.normalize_and_validate()?;
        assert_eq!(cfg.api.base_url, "https://api.billing.example");
        assert_eq!(cfg.api.probe_path, "/health");
        assert_eq!(cfg.auth.refresh_path, "/auth/refresh-token");
        assert_eq!(cfg.auth.refresh_header, "x-refresh-token");
        assert!(!cfg.auth.single_flight_refresh);
        assert_eq!(cfg.storage.session_file, "data/session.json");
        assert_eq!(cfg.cache.search_ttl(), Duration::from_secs(300));
        Ok(())
    }

    #[test]
    fn paths_get_leading_slash() -> Result<()> {
        let mut cfg = load_from_str(
            r#"
            [api]
            base_url = "http://localhost:4000"
            probe_path = "ping"

            [auth]
            login_path = "auth/login"
            refresh_header = "  x-refresh  "
            single_flight_refresh = true
            "#,
        )?;
        cfg.normalize_and_validate()?;
        assert_eq!(cfg.api.probe_path, "/ping");
        assert_eq!(cfg.auth.login_path, "/auth/login");
        assert_eq!(cfg.auth.refresh_header, "x-refresh");
        assert!(cfg.auth.single_flight_refresh);
        Ok(())
    }

    #[test]
    fn rejects_non_http_base_url() -> Result<()> {
        let mut cfg = load_from_str("[api]\nbase_url = \"ftp://files\"\n")?;
        assert!(cfg.normalize_and_validate().is_err());
        Ok(())
    }

    #[test]
    fn rejects_zero_timeouts_and_ttl() -> Result<()> {
        let mut cfg = load_from_str("[api]\nbase_url = \"http://x\"\nprobe_timeout_secs = 0\n")?;
        assert!(cfg.normalize_and_validate().is_err());

        let mut cfg =
            load_from_str("[api]\nbase_url = \"http://x\"\n[cache]\nsearch_ttl_secs = 0\n")?;
        assert!(cfg.normalize_and_validate().is_err());
        Ok(())
    }

    #[test]
    fn rejects_blank_refresh_header() -> Result<()> {
        let mut cfg =
            load_from_str("[api]\nbase_url = \"http://x\"\n[auth]\nrefresh_header = \" \"\n")?;
        assert!(cfg.normalize_and_validate().is_err());
        Ok(())
    }
}
