use http::Method;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use pkix_proto::RetryPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What the server does with a valid request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Answer from the local response store
    Responder,
    /// Relay to an upstream responder
    Forwarder,
}

/// Filesystem response store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root of the hashAlgorithm/issuerNameHash/issuerKeyHash/serial tree
    pub base_dir: PathBuf,
}

/// Upstream responder for forwarder mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub url: String,

    /// "GET" or "POST" (default: "POST")
    #[serde(default = "default_upstream_method")]
    pub method: String,

    /// Per-attempt timeout in seconds (default: 10)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after a timeout or connection failure (default: 2)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between retries in milliseconds (default: 500)
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl UpstreamConfig {
    pub fn method(&self) -> Result<Method, ConfigError> {
        match self.method.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            other => Err(ConfigError::Invalid(format!(
                "Upstream method must be GET or POST, got {}",
                other
            ))),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            interval: Duration::from_millis(self.retry_interval_ms),
        }
    }
}

fn default_upstream_method() -> String {
    "POST".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_interval_ms() -> u64 {
    500
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server listen address
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Server listen port
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Responder or forwarder (default: responder)
    #[serde(default = "default_mode")]
    pub mode: Mode,

    /// URL prefix the OCSP endpoint is mounted under (default: "/")
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    /// HTTP methods accepted from clients (default: GET and POST)
    #[serde(default = "default_allowed_methods")]
    pub allowed_methods: Vec<String>,

    /// Log level: "trace", "debug", "info", "warn", "error" (default: "info")
    #[serde(default)]
    pub log_level: Option<String>,

    /// Response store, required in responder mode
    #[serde(default)]
    pub store: Option<StoreConfig>,

    /// Ceiling for the Cache-Control max-age, in seconds
    #[serde(default)]
    pub max_age: Option<u64>,

    /// Upstream responder, required in forwarder mode
    #[serde(default)]
    pub upstream: Option<UpstreamConfig>,
}

fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    8080
}

fn default_mode() -> Mode {
    Mode::Responder
}

fn default_path_prefix() -> String {
    "/".to_string()
}

fn default_allowed_methods() -> Vec<String> {
    vec!["GET".to_string(), "POST".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_address: default_listen_address(),
            listen_port: default_listen_port(),
            mode: default_mode(),
            path_prefix: default_path_prefix(),
            allowed_methods: default_allowed_methods(),
            log_level: None,
            store: None,
            max_age: None,
            upstream: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get socket address for binding
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr: IpAddr = self
            .listen_address
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("Invalid IP address: {}", self.listen_address)))?;
        Ok(SocketAddr::new(addr, self.listen_port))
    }

    /// Client methods as parsed HTTP methods
    pub fn methods(&self) -> Result<Vec<Method>, ConfigError> {
        self.allowed_methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| ConfigError::Invalid(format!("Invalid HTTP method: {}", m)))
            })
            .collect()
    }

    /// Prefix without trailing slashes; empty for the root
    pub fn normalized_prefix(&self) -> &str {
        self.path_prefix.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        if self.listen_port == 0 {
            return Err(ConfigError::Invalid("Port cannot be 0".to_string()));
        }

        if !self.path_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "Path prefix must start with '/': {}",
                self.path_prefix
            )));
        }

        let methods = self.methods()?;
        if methods.is_empty() {
            return Err(ConfigError::Invalid("No allowed methods configured".to_string()));
        }

        match self.mode {
            Mode::Responder => {
                if self.store.is_none() {
                    return Err(ConfigError::Invalid(
                        "Responder mode requires a store section".to_string(),
                    ));
                }
            }
            Mode::Forwarder => {
                let upstream = self.upstream.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("Forwarder mode requires an upstream section".to_string())
                })?;
                if upstream.url.is_empty() {
                    return Err(ConfigError::Invalid("Upstream URL cannot be empty".to_string()));
                }
                upstream.method()?;
                if upstream.timeout_secs == 0 {
                    return Err(ConfigError::Invalid("Upstream timeout cannot be 0".to_string()));
                }
            }
        }

        Ok(())
    }

    /// Create an example configuration file
    pub fn example() -> Self {
        Config {
            listen_address: "0.0.0.0".to_string(),
            listen_port: 8080,
            mode: Mode::Responder,
            path_prefix: "/ocsp".to_string(),
            allowed_methods: default_allowed_methods(),
            log_level: Some("info".to_string()),
            store: Some(StoreConfig {
                base_dir: PathBuf::from("/var/lib/pkix/responses"),
            }),
            max_age: Some(3600),
            upstream: Some(UpstreamConfig {
                url: "http://ocsp.example.com".to_string(),
                method: default_upstream_method(),
                timeout_secs: default_timeout_secs(),
                max_retries: default_max_retries(),
                retry_interval_ms: default_retry_interval_ms(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responder() -> Config {
        Config {
            store: Some(StoreConfig {
                base_dir: PathBuf::from("/tmp"),
            }),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.mode, Mode::Responder);
        assert_eq!(config.methods().unwrap(), vec![Method::GET, Method::POST]);
    }

    #[test]
    fn test_responder_requires_store() {
        assert!(Config::default().validate().is_err());
        assert!(responder().validate().is_ok());
    }

    #[test]
    fn test_forwarder_requires_upstream() {
        let mut config = Config {
            mode: Mode::Forwarder,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config.upstream = Config::example().upstream;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_upstream_method_and_timeout() {
        let mut config = Config {
            mode: Mode::Forwarder,
            ..Config::example()
        };
        if let Some(upstream) = config.upstream.as_mut() {
            upstream.method = "PUT".to_string();
        }
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        if let Some(upstream) = config.upstream.as_mut() {
            upstream.method = "get".to_string();
            upstream.timeout_secs = 0;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_upstream_defaults_from_json() {
        let config: Config = serde_json::from_str(
            r#"{"mode": "forwarder", "upstream": {"url": "http://127.0.0.1:9000"}}"#,
        )
        .unwrap();
        let upstream = config.upstream.as_ref().unwrap();
        assert_eq!(upstream.method().unwrap(), Method::POST);
        assert_eq!(upstream.timeout(), Duration::from_secs(10));
        assert_eq!(upstream.retry_policy(), RetryPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_path_prefix() {
        let mut config = responder();
        assert_eq!(config.normalized_prefix(), "");

        config.path_prefix = "/ocsp/".to_string();
        assert_eq!(config.normalized_prefix(), "/ocsp");

        config.path_prefix = "ocsp".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let addr = responder().socket_addr().unwrap();
        assert_eq!(addr.port(), 8080);

        let config = Config {
            listen_address: "not-an-ip".to_string(),
            ..responder()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_example_roundtrips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        Config::example().to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.path_prefix, "/ocsp");
        assert_eq!(loaded.max_age, Some(3600));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_file("/nonexistent/pkix.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
