use crate::error::{ServerError, ServerResult};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Control plane configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    // Network configuration
    pub listen_address: String,
    pub port: u16,
    pub backlog_size: u32,
    /// Permit binding to something other than a loopback address
    pub allow_non_loopback: bool,

    // Connection settings
    #[serde(with = "millis")]
    pub read_timeout: Duration,
    pub max_header_size: usize,

    // Lifecycle
    #[serde(with = "millis")]
    pub shutdown_grace: Duration,
    pub worker_threads: usize,

    pub log_level: String,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1".to_string(),
            port: 8080,
            backlog_size: 128,
            allow_non_loopback: false,

            read_timeout: Duration::from_secs(10),
            max_header_size: 8 * 1024, // 8 KB

            shutdown_grace: Duration::from_secs(2),
            worker_threads: num_cpus::get().min(2),

            log_level: "info".to_string(),
        }
    }
}

impl ControlPlaneConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address and port to listen on
    pub fn with_address(mut self, address: &str, port: u16) -> Self {
        self.listen_address = address.to_string();
        self.port = port;
        self
    }

    /// Set the per-connection read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set how long shutdown waits for in-flight connections
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set the number of runtime worker threads
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Set the maximum size of a request head
    pub fn with_max_header_size(mut self, size: usize) -> Self {
        self.max_header_size = size;
        self
    }

    /// Get the full address string (address:port)
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.listen_address, self.port)
    }

    /// Parsed log level, falling back to `Info` on an unknown name
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Info)
    }

    /// Check the configuration before binding
    pub fn validate(&self) -> ServerResult<SocketAddr> {
        let ip = IpAddr::from_str(&self.listen_address).map_err(|e| {
            ServerError::Config(format!("invalid listen address {:?}: {}", self.listen_address, e))
        })?;

        if !ip.is_loopback() && !self.allow_non_loopback {
            return Err(ServerError::Config(format!(
                "refusing to listen on non-loopback address {}",
                ip
            )));
        }
        if self.max_header_size == 0 {
            return Err(ServerError::Config("max_header_size must be non-zero".to_string()));
        }
        if self.worker_threads == 0 {
            return Err(ServerError::Config("worker_threads must be at least 1".to_string()));
        }

        Ok(SocketAddr::new(ip, self.port))
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ServerResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_json_file<P: AsRef<Path>>(&self, path: P) -> ServerResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_listen_on_loopback_8080() {
        let config = ControlPlaneConfig::new();
        assert_eq!(config.socket_address(), "127.0.0.1:8080");
        let addr = config.validate().unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_rejects_non_loopback_unless_allowed() {
        let mut config = ControlPlaneConfig::new().with_address("0.0.0.0", 9000);
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));

        config.allow_non_loopback = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_limits() {
        let config = ControlPlaneConfig::new().with_max_header_size(0);
        assert!(config.validate().is_err());

        let config = ControlPlaneConfig::new().with_worker_threads(0);
        assert!(config.validate().is_err());

        let config = ControlPlaneConfig::new().with_address("localhost", 80);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_uses_millis_and_defaults() {
        let config: ControlPlaneConfig =
            serde_json::from_str(r#"{"port": 9191, "read_timeout": 250}"#).unwrap();
        assert_eq!(config.port, 9191);
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        assert_eq!(config.listen_address, "127.0.0.1");

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["read_timeout"], 250);
        assert_eq!(json["shutdown_grace"], 2000);
    }

    #[test]
    fn test_level_filter_falls_back_to_info() {
        let mut config = ControlPlaneConfig::new();
        config.log_level = "debug".to_string();
        assert_eq!(config.level_filter(), LevelFilter::Debug);

        config.log_level = "chatty".to_string();
        assert_eq!(config.level_filter(), LevelFilter::Info);
    }
}
