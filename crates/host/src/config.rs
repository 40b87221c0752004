//! Host configuration loaded from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use registration::BusConfig;
use saga::{MAX_ORDER_EXPIRY, ProcessConfig, RetryPolicy};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Host configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `RESERVATION_TIMEOUT_SECS`: wait for a seat reservation outcome (default: `30`)
/// - `ORDER_EXPIRY_SECS`: payment window of a booked order, capped at
///   `MAX_ORDER_EXPIRY` (default: `900`)
/// - `RELEASE_MAX_RETRIES`: seat release retries before giving up (default: `5`)
/// - `RELEASE_INITIAL_DELAY_MS`: first release retry delay (default: `200`)
/// - `SETTLED_RETENTION_SECS`: how long a rejected or expired order's
///   reservation is remembered (default: `60`)
/// - `WORKER_IDLE_SECS`: idle time before an order worker retires (default: `60`)
/// - `CONFLICT_RETRIES`: re-runs of a command that lost a version race (default: `3`)
/// - `METRICS_ADDR`: Prometheus listener (default: `"0.0.0.0:9000"`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` or `pretty` (default: `pretty`)
/// - `SEED_DEMO_CONFERENCE`: publish a demo conference at startup (default: `false`)
///
/// Unparsable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub reservation_timeout: Duration,
    pub order_expiry: Duration,
    pub release_max_retries: u32,
    pub release_initial_delay: Duration,
    pub settled_retention: Duration,
    pub worker_idle: Duration,
    pub conflict_retries: u32,
    pub metrics_addr: SocketAddr,
    pub log_level: String,
    pub log_format: LogFormat,
    pub seed_demo_conference: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let secs = |key: &str, default: Duration| parse(key).map(Duration::from_secs).unwrap_or(default);

        Self {
            reservation_timeout: secs("RESERVATION_TIMEOUT_SECS", defaults.reservation_timeout),
            order_expiry: secs("ORDER_EXPIRY_SECS", defaults.order_expiry).min(MAX_ORDER_EXPIRY),
            release_max_retries: lookup("RELEASE_MAX_RETRIES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.release_max_retries),
            release_initial_delay: parse("RELEASE_INITIAL_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.release_initial_delay),
            settled_retention: secs("SETTLED_RETENTION_SECS", defaults.settled_retention),
            worker_idle: secs("WORKER_IDLE_SECS", defaults.worker_idle),
            conflict_retries: lookup("CONFLICT_RETRIES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.conflict_retries),
            metrics_addr: lookup("METRICS_ADDR")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.metrics_addr),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            seed_demo_conference: lookup("SEED_DEMO_CONFERENCE")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.seed_demo_conference),
        }
    }

    pub fn process_config(&self) -> ProcessConfig {
        ProcessConfig {
            reservation_timeout: self.reservation_timeout,
            order_expiry: self.order_expiry,
            release_retry: RetryPolicy {
                max_retries: self.release_max_retries,
                initial_delay: self.release_initial_delay,
                ..RetryPolicy::default()
            },
            settled_retention: self.settled_retention,
        }
    }

    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            conflict_retries: self.conflict_retries,
            worker_idle: self.worker_idle,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let process = ProcessConfig::default();
        let bus = BusConfig::default();
        Self {
            reservation_timeout: process.reservation_timeout,
            order_expiry: process.order_expiry,
            release_max_retries: process.release_retry.max_retries,
            release_initial_delay: process.release_retry.initial_delay,
            settled_retention: process.settled_retention,
            worker_idle: bus.worker_idle,
            conflict_retries: bus.conflict_retries,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            seed_demo_conference: false,
        }
    }
}
