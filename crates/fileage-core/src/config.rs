//! Exporter configuration
//!
//! [`ExporterConfig`] is an immutable snapshot handed to the exporter at
//! construction. The CLI layer builds it; tests usually go through
//! [`ExporterConfig::builder`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ExporterError, Result};
use crate::watcher::BackoffPolicy;

/// Default listen address (all interfaces, port 9676)
pub const DEFAULT_LISTEN: &str = ":9676";

/// Default threshold for health, liveness, grace and directory timeouts
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Operator-supplied parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ExporterConfig {
    /// Start marker; `None` disables run tracking
    pub start_file: Option<PathBuf>,

    /// End marker, mandatory
    pub end_file: PathBuf,

    /// `host:port` to listen at; a bare `:port` binds every interface
    pub listen: String,

    /// Prometheus scrape path
    pub metrics_path: String,

    /// Health probe path
    pub health_path: String,

    /// Liveness probe path
    pub liveness_path: String,

    /// Maximum end-file age considered healthy
    pub health_timeout: Duration,

    /// Maximum end-file age considered alive
    pub liveness_timeout: Duration,

    /// Warm-up window during which health is reported good regardless of age
    pub grace: Duration,

    /// How long to wait for a missing directory
    pub directory_timeout: Duration,

    /// Backoff schedule while waiting for a missing directory
    pub directory_backoff: BackoffPolicy,

    /// Prometheus namespace
    pub namespace: String,

    /// Prometheus subsystem
    pub subsystem: String,

    /// Verbose logging
    pub debug: bool,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            start_file: None,
            end_file: PathBuf::new(),
            listen: DEFAULT_LISTEN.to_string(),
            metrics_path: "/metrics".to_string(),
            health_path: "/healthz".to_string(),
            liveness_path: "/liveness".to_string(),
            health_timeout: DEFAULT_TIMEOUT,
            liveness_timeout: DEFAULT_TIMEOUT,
            grace: DEFAULT_TIMEOUT,
            directory_timeout: DEFAULT_TIMEOUT,
            directory_backoff: BackoffPolicy::default(),
            namespace: String::new(),
            subsystem: String::new(),
            debug: false,
        }
    }
}

impl ExporterConfig {
    /// Create a new config builder
    pub fn builder() -> ExporterConfigBuilder {
        ExporterConfigBuilder::new()
    }

    /// Check the configuration for fatal mistakes
    pub fn validate(&self) -> Result<()> {
        if self.end_file.as_os_str().is_empty() {
            return Err(ExporterError::config("--file-end must be set!"));
        }

        let endpoints = [
            ("metrics", &self.metrics_path),
            ("health", &self.health_path),
            ("liveness", &self.liveness_path),
        ];
        for (name, path) in endpoints {
            if !path.starts_with('/') {
                return Err(ExporterError::config(format!(
                    "{} endpoint must start with '/': {:?}",
                    name, path
                )));
            }
        }
        for (i, (a_name, a)) in endpoints.iter().enumerate() {
            for (b_name, b) in &endpoints[i + 1..] {
                if a == b {
                    return Err(ExporterError::config(format!(
                        "{} and {} endpoints are both {:?}",
                        a_name, b_name, a
                    )));
                }
            }
        }

        Ok(())
    }

    /// Validate and make both marker paths absolute
    pub fn resolve(mut self) -> Result<Self> {
        self.validate()?;
        self.end_file = resolve_absolute(&self.end_file)?;
        self.start_file = match self.start_file.take() {
            Some(p) if !p.as_os_str().is_empty() => Some(resolve_absolute(&p)?),
            _ => None,
        };
        Ok(self)
    }

    /// Socket address string suitable for binding
    pub fn bind_address(&self) -> String {
        if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        }
    }
}

/// Builder for ExporterConfig
pub struct ExporterConfigBuilder {
    config: ExporterConfig,
}

impl ExporterConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            config: ExporterConfig::default(),
        }
    }

    pub fn start_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.start_file = Some(path.into());
        self
    }

    pub fn end_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.end_file = path.into();
        self
    }

    pub fn listen(mut self, listen: impl Into<String>) -> Self {
        self.config.listen = listen.into();
        self
    }

    /// Set the three endpoint paths
    pub fn endpoints(
        mut self,
        metrics: impl Into<String>,
        health: impl Into<String>,
        liveness: impl Into<String>,
    ) -> Self {
        self.config.metrics_path = metrics.into();
        self.config.health_path = health.into();
        self.config.liveness_path = liveness.into();
        self
    }

    pub fn health_timeout(mut self, timeout: Duration) -> Self {
        self.config.health_timeout = timeout;
        self
    }

    pub fn liveness_timeout(mut self, timeout: Duration) -> Self {
        self.config.liveness_timeout = timeout;
        self
    }

    pub fn grace(mut self, grace: Duration) -> Self {
        self.config.grace = grace;
        self
    }

    pub fn directory_timeout(mut self, timeout: Duration) -> Self {
        self.config.directory_timeout = timeout;
        self
    }

    pub fn directory_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.config.directory_backoff = policy;
        self
    }

    /// Set namespace and subsystem labels
    pub fn labels(mut self, namespace: impl Into<String>, subsystem: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self.config.subsystem = subsystem.into();
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ExporterConfig {
        self.config
    }
}

impl Default for ExporterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Make `path` absolute against the current working directory.
///
/// The path is not canonicalized: the file and even its directory may not
/// exist yet.
pub fn resolve_absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|source| ExporterError::PathResolution {
            path: path.to_path_buf(),
            source,
        })
}

/// Parse a Go-style duration such as "10m", "1m30s", "250ms" or "1h".
///
/// Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`. A bare `0` is accepted.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos: f64 = 0.0;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return Err(format!("Invalid number in duration: '{}'", s));
        }
        let value: f64 = rest[..num_len]
            .parse()
            .map_err(|_| format!("Invalid number in duration: '{}'", s))?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("Missing unit in duration '{}'", s)),
            unit => return Err(format!("Unknown unit '{}' in duration '{}'", unit, s)),
        };
        rest = &rest[unit_len..];
        total_nanos += value * scale;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(format!("Duration out of range: '{}'", s));
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExporterConfig::default();
        assert_eq!(config.listen, ":9676");
        assert_eq!(config.metrics_path, "/metrics");
        assert_eq!(config.health_path, "/healthz");
        assert_eq!(config.liveness_path, "/liveness");
        assert_eq!(config.health_timeout, Duration::from_secs(600));
        assert_eq!(config.liveness_timeout, Duration::from_secs(600));
        assert_eq!(config.grace, Duration::from_secs(600));
        assert_eq!(config.directory_timeout, Duration::from_secs(600));
        assert!(config.start_file.is_none());
        assert!(!config.debug);
    }

    #[test]
    fn test_config_builder() {
        let config = ExporterConfig::builder()
            .start_file("/data/start")
            .end_file("/data/end")
            .listen("127.0.0.1:9000")
            .endpoints("/m", "/h", "/l")
            .health_timeout(Duration::from_secs(30))
            .liveness_timeout(Duration::from_secs(60))
            .grace(Duration::ZERO)
            .labels("batch", "nightly")
            .debug(true)
            .build();

        assert_eq!(config.start_file, Some(PathBuf::from("/data/start")));
        assert_eq!(config.end_file, PathBuf::from("/data/end"));
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.health_path, "/h");
        assert_eq!(config.namespace, "batch");
        assert_eq!(config.subsystem, "nightly");
        assert!(config.debug);
    }

    #[test]
    fn test_missing_end_file_is_rejected() {
        let err = ExporterConfig::default().validate().unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("--file-end"));
    }

    #[test]
    fn test_duplicate_endpoints_are_rejected() {
        let config = ExporterConfig::builder()
            .end_file("/data/end")
            .endpoints("/metrics", "/probe", "/probe")
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_endpoint_is_rejected() {
        let config = ExporterConfig::builder()
            .end_file("/data/end")
            .endpoints("metrics", "/healthz", "/liveness")
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_makes_paths_absolute() {
        let config = ExporterConfig::builder()
            .start_file("")
            .end_file("out/end")
            .build()
            .resolve()
            .unwrap();

        assert!(config.end_file.is_absolute());
        assert!(config.end_file.ends_with("out/end"));
        assert!(config.start_file.is_none());
    }

    #[test]
    fn test_bind_address_expands_bare_port() {
        assert_eq!(ExporterConfig::default().bind_address(), "0.0.0.0:9676");
    }

    #[test]
    fn test_parse_duration_values() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("m").is_err());
    }
}
