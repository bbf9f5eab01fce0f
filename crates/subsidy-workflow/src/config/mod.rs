use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub workflow: WorkflowConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            workflow: WorkflowConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Engine and monitor tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    /// Cadence of the background SLA scan.
    pub scan_interval: Duration,
    /// Hard ceiling on every store call made by the engine or the monitor.
    pub storage_timeout: Duration,
    /// Total control photos required before director review.
    pub minimum_control_photos: u32,
    /// Applications waiting in a single state before a bottleneck alert is raised.
    pub bottleneck_threshold: usize,
    /// Portfolio-wide share of applications within SLA below which a performance alert fires.
    pub sla_compliance_target: f64,
    /// Consecutive failed scans tolerated before an error alert is raised.
    pub scan_failure_alert_after: u32,
    /// Resolved alerts kept for `get_alerts` before the oldest are dropped.
    pub resolved_alert_history: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(30),
            storage_timeout: Duration::from_millis(2_000),
            minimum_control_photos: 4,
            bottleneck_threshold: 10,
            sla_compliance_target: 0.8,
            scan_failure_alert_after: 3,
            resolved_alert_history: 256,
        }
    }
}

impl WorkflowConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let scan_interval = read_var("WORKFLOW_SCAN_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.scan_interval);
        let storage_timeout = read_var("WORKFLOW_STORAGE_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.storage_timeout);
        let minimum_control_photos =
            read_var("WORKFLOW_MIN_CONTROL_PHOTOS")?.unwrap_or(defaults.minimum_control_photos);
        let bottleneck_threshold =
            read_var("WORKFLOW_BOTTLENECK_THRESHOLD")?.unwrap_or(defaults.bottleneck_threshold);
        let sla_compliance_target: f64 = read_var("WORKFLOW_SLA_COMPLIANCE_TARGET")?
            .unwrap_or(defaults.sla_compliance_target);
        let scan_failure_alert_after = read_var("WORKFLOW_SCAN_FAILURE_ALERT_AFTER")?
            .unwrap_or(defaults.scan_failure_alert_after);
        let resolved_alert_history = read_var("WORKFLOW_RESOLVED_ALERT_HISTORY")?
            .unwrap_or(defaults.resolved_alert_history);

        if scan_interval.is_zero() {
            return Err(ConfigError::InvalidNumber {
                variable: "WORKFLOW_SCAN_INTERVAL_SECS",
            });
        }
        if storage_timeout.is_zero() {
            return Err(ConfigError::InvalidNumber {
                variable: "WORKFLOW_STORAGE_TIMEOUT_MS",
            });
        }
        if !(0.0..=1.0).contains(&sla_compliance_target) {
            return Err(ConfigError::InvalidNumber {
                variable: "WORKFLOW_SLA_COMPLIANCE_TARGET",
            });
        }

        Ok(Self {
            scan_interval,
            storage_timeout,
            minimum_control_photos,
            bottleneck_threshold,
            sla_compliance_target,
            scan_failure_alert_after,
            resolved_alert_history,
        })
    }
}

fn read_var<T: FromStr>(variable: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { variable }),
        Err(_) => Ok(None),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} is not a valid value")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
