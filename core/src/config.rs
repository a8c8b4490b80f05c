//! Backend location and timeouts.
//!
//! The client only ever reads configuration through `ConfigProvider`. The
//! values are captured when a client is built; changing them afterwards has
//! no effect until `ClientFactory::reset_client` is called.

use std::time::Duration;

pub const DEFAULT_PROTOCOL: &str = "http";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: &str = "8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Always ends with `/`.
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    /// Replaces `{base_url}auth/` when set.
    pub auth_url_override: Option<String>,
    /// Replaces `{base_url}api/` when set.
    pub api_url_override: Option<String>,
}

impl Config {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            connect_timeout_secs: DEFAULT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_TIMEOUT_SECS,
            write_timeout_secs: DEFAULT_TIMEOUT_SECS,
            auth_url_override: None,
            api_url_override: None,
        }
    }

    pub fn with_timeouts(mut self, connect_secs: u64, read_secs: u64, write_secs: u64) -> Self {
        self.connect_timeout_secs = connect_secs;
        self.read_timeout_secs = read_secs;
        self.write_timeout_secs = write_secs;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Pin the auth and API roots instead of deriving them from `base_url`.
    pub fn with_service_urls(mut self, auth_url: Option<&str>, api_url: Option<&str>) -> Self {
        self.auth_url_override = auth_url.map(normalize_base_url);
        self.api_url_override = api_url.map(normalize_base_url);
        self
    }

    pub fn auth_url(&self) -> String {
        self.auth_url_override
            .clone()
            .unwrap_or_else(|| format!("{}auth/", self.base_url))
    }

    pub fn api_url(&self) -> String {
        self.api_url_override
            .clone()
            .unwrap_or_else(|| format!("{}api/", self.base_url))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(&format!("{DEFAULT_PROTOCOL}://{DEFAULT_HOST}:{DEFAULT_PORT}/"))
    }
}

/// Read-only source of `Config`.
pub trait ConfigProvider: Send + Sync {
    fn config(&self) -> Config;
}

impl ConfigProvider for Config {
    fn config(&self) -> Config {
        self.clone()
    }
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves `Config` from environment variables on every call.
///
/// | variable           | fallback                                         |
/// |--------------------|--------------------------------------------------|
/// | `BACKEND_BASE_URL` | `{BACKEND_PROTOCOL}://{BACKEND_IP}:{BACKEND_PORT}/` |
/// | `BACKEND_PROTOCOL` | `http`                                           |
/// | `BACKEND_IP`       | `127.0.0.1`                                      |
/// | `BACKEND_PORT`     | `8000`                                           |
/// | `BACKEND_AUTH_URL` | `{base}auth/`                                    |
/// | `BACKEND_API_URL`  | `{base}api/`                                     |
/// | `CONNECT_TIMEOUT`  | `60`                                             |
/// | `READ_TIMEOUT`     | `60`                                             |
/// | `WRITE_TIMEOUT`    | `60`                                             |
///
/// Blank values count as unset; unparseable timeouts use the fallback.
pub struct EnvConfig {
    lookup: Lookup,
}

impl EnvConfig {
    pub fn new() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve through `lookup` instead of the process environment.
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn var_or(&self, key: &str, fallback: &str) -> String {
        self.var(key).unwrap_or_else(|| fallback.to_string())
    }

    fn timeout(&self, key: &str) -> u64 {
        match self.var(key) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(key, value = %raw, "ignoring non-numeric timeout");
                DEFAULT_TIMEOUT_SECS
            }),
            None => DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigProvider for EnvConfig {
    fn config(&self) -> Config {
        let base_url = self.var("BACKEND_BASE_URL").unwrap_or_else(|| {
            format!(
                "{}://{}:{}/",
                self.var_or("BACKEND_PROTOCOL", DEFAULT_PROTOCOL),
                self.var_or("BACKEND_IP", DEFAULT_HOST),
                self.var_or("BACKEND_PORT", DEFAULT_PORT),
            )
        });
        Config {
            base_url: normalize_base_url(&base_url),
            connect_timeout_secs: self.timeout("CONNECT_TIMEOUT"),
            read_timeout_secs: self.timeout("READ_TIMEOUT"),
            write_timeout_secs: self.timeout("WRITE_TIMEOUT"),
            auth_url_override: None,
            api_url_override: None,
        }
        .with_service_urls(
            self.var("BACKEND_AUTH_URL").as_deref(),
            self.var("BACKEND_API_URL").as_deref(),
        )
    }
}

fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}
