use crate::error::ConfigError;
use crate::handshake::{DEFAULT_HANDSHAKE_BUDGET, DEFAULT_HANDSHAKE_TIMEOUT};
use crate::retry::RetryPolicy;
use crate::wire::FrameBounds;
use lidar_data::ScanMode;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_REVOLUTION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Bounds connecting as well as every read and write.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub scan_mode: ScanMode,
    pub frame_bounds: FrameBounds,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> ClientConfig {
        ClientConfig {
            host: host.into(),
            ..ClientConfig::default()
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Loads the `[lidar]` table of a TOML file. Only `host` is required.
    ///
    /// ```toml
    /// [lidar]
    /// host = "192.168.1.101"
    /// port = 5000
    /// timeout = 5.0
    /// max_retries = 3
    /// retry_delay = 2.0
    /// scan_mode = "express"
    /// ```
    pub fn from_file(path: impl AsRef<Path>) -> Result<ClientConfig, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        ClientConfig::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<ClientConfig, ConfigError> {
        let file: ConfigFile = toml::from_str(contents)?;
        file.lidar.into_config()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            scan_mode: ScanMode::default(),
            frame_bounds: FrameBounds::default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    lidar: LidarSection,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LidarSection {
    host: String,
    port: Option<u16>,
    timeout: Option<f64>,
    max_retries: Option<u32>,
    retry_delay: Option<f64>,
    scan_mode: Option<String>,
    min_frame_len: Option<u32>,
    max_frame_len: Option<u32>,
}

impl LidarSection {
    fn into_config(self) -> Result<ClientConfig, ConfigError> {
        let defaults = ClientConfig::default();
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid("host", &self.host, "must not be empty"));
        }

        let timeout = match self.timeout {
            Some(secs) => positive_secs("timeout", secs)?,
            None => defaults.timeout,
        };
        let retry_delay = match self.retry_delay {
            Some(secs) if secs == 0.0 => Duration::ZERO,
            Some(secs) => positive_secs("retry_delay", secs)?,
            None => defaults.retry.retry_delay,
        };
        let scan_mode = match self.scan_mode {
            Some(mode) => mode
                .parse::<ScanMode>()
                .map_err(|e| ConfigError::invalid("scan_mode", &mode, e))?,
            None => defaults.scan_mode,
        };
        let frame_bounds = FrameBounds::new(
            self.min_frame_len.unwrap_or(defaults.frame_bounds.min),
            self.max_frame_len.unwrap_or(defaults.frame_bounds.max),
        );
        if frame_bounds.min > frame_bounds.max {
            return Err(ConfigError::invalid(
                "min_frame_len",
                frame_bounds.min,
                format!("greater than max_frame_len {}", frame_bounds.max),
            ));
        }

        Ok(ClientConfig {
            host: self.host.trim().to_string(),
            port: self.port.unwrap_or(defaults.port),
            timeout,
            retry: RetryPolicy::new(
                self.max_retries.unwrap_or(defaults.retry.max_retries),
                retry_delay,
            ),
            scan_mode,
            frame_bounds,
        })
    }
}

fn positive_secs(key: &str, secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::invalid(key, secs, "must be a positive number of seconds"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::invalid(key, secs, e))
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub bind_host: String,
    pub bind_port: u16,
    pub serial_port: String,
    /// How long to wait for the client's mode token.
    pub handshake_timeout: Duration,
    /// Most bytes read for the mode token.
    pub handshake_budget: usize,
    /// `None` lets a stalled client block the stream indefinitely.
    pub write_timeout: Option<Duration>,
    pub accept_poll_interval: Duration,
    /// Longest wait for the sensor to deliver a revolution.
    pub revolution_timeout: Duration,
    /// Payload lengths clients accept. Revolutions that encode outside them
    /// are skipped rather than sent.
    pub frame_bounds: FrameBounds,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }

    /// Defaults overlaid with `LIDAR_SERIAL_PORT`, `LIDAR_TCP_HOST`,
    /// `LIDAR_TCP_PORT` and `LIDAR_WRITE_TIMEOUT_SECS`.
    pub fn from_env() -> Result<ServerConfig, ConfigError> {
        ServerConfig::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<ServerConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServerConfig::default();
        if let Some(port) = lookup("LIDAR_SERIAL_PORT") {
            config.serial_port = port;
        }
        if let Some(host) = lookup("LIDAR_TCP_HOST") {
            config.bind_host = host;
        }
        if let Some(port) = lookup("LIDAR_TCP_PORT") {
            config.bind_port = port
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("LIDAR_TCP_PORT", &port, e))?;
        }
        if let Some(secs) = lookup("LIDAR_WRITE_TIMEOUT_SECS") {
            let value: f64 = secs
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("LIDAR_WRITE_TIMEOUT_SECS", &secs, e))?;
            // 0 disables the timeout
            config.write_timeout = if value == 0.0 {
                None
            } else {
                Some(positive_secs("LIDAR_WRITE_TIMEOUT_SECS", value)?)
            };
        }
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            bind_port: DEFAULT_PORT,
            serial_port: DEFAULT_SERIAL_PORT.to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            handshake_budget: DEFAULT_HANDSHAKE_BUDGET,
            write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
            accept_poll_interval: DEFAULT_ACCEPT_POLL_INTERVAL,
            revolution_timeout: DEFAULT_REVOLUTION_TIMEOUT,
            frame_bounds: FrameBounds::default(),
        }
    }
}
