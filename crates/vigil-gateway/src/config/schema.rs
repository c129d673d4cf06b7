use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vigil_core::error::{Result, VigilError};
use vigil_core::Level;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub environment: Profile,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub logging: LoggingSection,

    #[serde(default)]
    pub metrics: MetricsSection,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            environment: Profile::default(),
            server: ServerSection::default(),
            logging: LoggingSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(VigilError::UnsupportedVersion);
        }

        self.server.validate()?;
        self.logging.validate()?;
        self.metrics.validate()?;

        Ok(())
    }

    /// Sinks the fan-out logger is built from, decided once from the profile.
    pub fn sink_plan(&self) -> Vec<SinkSpec> {
        let mut plan = vec![SinkSpec::Console];
        match self.environment {
            Profile::Development => {
                plan.push(SinkSpec::File {
                    path: PathBuf::from(&self.logging.files.error),
                    min_level: Level::Error,
                });
                plan.push(SinkSpec::File {
                    path: PathBuf::from(&self.logging.files.combined),
                    min_level: Level::Debug,
                });
            }
            Profile::Production => {
                if let Some(target) = self.logging.loki.target(self.environment) {
                    plan.push(SinkSpec::Loki(target));
                }
            }
            Profile::Test => {}
        }
        plan
    }
}

/// Deployment profile. Decides the sink set, the minimum level and whether
/// error bodies expose stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Development,
    Production,
    Test,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Development => "development",
            Profile::Production => "production",
            Profile::Test => "test",
        }
    }

    pub fn min_level(self) -> Level {
        match self {
            Profile::Production => Level::Info,
            Profile::Development | Profile::Test => Level::Debug,
        }
    }

    pub fn exposes_stack(self) -> bool {
        self != Profile::Production
    }

    /// Default `EnvFilter` directives when `RUST_LOG` is unset.
    /// Transport crates are held at `warn` so the remote sink's own client
    /// does not feed events back into the pipeline.
    pub fn default_directives(self) -> String {
        let base = match self.min_level() {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        };
        format!("{base},hyper=warn,hyper_util=warn,reqwest=warn,h2=warn")
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Profile::Development),
            "production" | "prod" => Ok(Profile::Production),
            "test" => Ok(Profile::Test),
            other => Err(VigilError::BadRequest(format!("unknown environment: {other}"))),
        }
    }
}

/// One sink to build, chosen at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkSpec {
    Console,
    File { path: PathBuf, min_level: Level },
    Loki(LokiTarget),
}

/// Resolved remote aggregator settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LokiTarget {
    pub push_url: String,
    pub labels: BTreeMap<String, String>,
    pub batch_size: usize,
    pub batch_interval: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen.parse::<SocketAddr>().map_err(|e| {
            VigilError::BadRequest(format!("server.listen must be a socket address: {e}"))
        })?;
        if self.body_limit_bytes == 0 {
            return Err(VigilError::BadRequest(
                "server.body_limit_bytes must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| VigilError::BadRequest(format!("server.listen: {e}")))
    }
}

fn default_listen() -> String {
    "0.0.0.0:3000".into()
}
fn default_body_limit_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    #[serde(default)]
    pub files: FileSinks,

    #[serde(default)]
    pub loki: LokiSection,
}

impl LoggingSection {
    pub fn validate(&self) -> Result<()> {
        if self.files.error.trim().is_empty() || self.files.combined.trim().is_empty() {
            return Err(VigilError::BadRequest(
                "logging.files paths must not be empty".into(),
            ));
        }
        self.loki.validate()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSinks {
    #[serde(default = "default_error_log")]
    pub error: String,

    #[serde(default = "default_combined_log")]
    pub combined: String,
}

impl Default for FileSinks {
    fn default() -> Self {
        Self {
            error: default_error_log(),
            combined: default_combined_log(),
        }
    }
}

fn default_error_log() -> String {
    "logs/error.log".into()
}
fn default_combined_log() -> String {
    "logs/combined.log".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LokiSection {
    /// `null` disables the remote sink.
    #[serde(default = "default_loki_host")]
    pub host: Option<String>,

    #[serde(default)]
    pub labels: LokiLabels,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_batch_interval_ms")]
    pub batch_interval_ms: u64,

    #[serde(default = "default_loki_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LokiSection {
    fn default() -> Self {
        Self {
            host: default_loki_host(),
            labels: LokiLabels::default(),
            batch_size: default_batch_size(),
            batch_interval_ms: default_batch_interval_ms(),
            timeout_ms: default_loki_timeout_ms(),
        }
    }
}

impl LokiSection {
    pub fn validate(&self) -> Result<()> {
        if let Some(host) = self.host.as_deref() {
            if !(host.starts_with("http://") || host.starts_with("https://")) {
                return Err(VigilError::BadRequest(
                    "logging.loki.host must be an http(s) URL".into(),
                ));
            }
        }
        if self.batch_size == 0 {
            return Err(VigilError::BadRequest(
                "logging.loki.batch_size must be greater than 0".into(),
            ));
        }
        if self.batch_interval_ms == 0 || self.timeout_ms == 0 {
            return Err(VigilError::BadRequest(
                "logging.loki.batch_interval_ms and timeout_ms must be greater than 0".into(),
            ));
        }
        if self.labels.job.trim().is_empty() {
            return Err(VigilError::BadRequest(
                "logging.loki.labels.job must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the push endpoint and labels; `None` when no host is set.
    pub fn target(&self, profile: Profile) -> Option<LokiTarget> {
        let host = self.host.as_deref()?.trim_end_matches('/');
        if host.is_empty() {
            return None;
        }

        let mut labels = BTreeMap::new();
        labels.insert("job".to_string(), self.labels.job.clone());
        labels.insert(
            "environment".to_string(),
            self.labels
                .environment
                .clone()
                .unwrap_or_else(|| profile.as_str().to_string()),
        );

        Some(LokiTarget {
            push_url: format!("{host}/loki/api/v1/push"),
            labels,
            batch_size: self.batch_size,
            batch_interval: Duration::from_millis(self.batch_interval_ms),
            timeout: Duration::from_millis(self.timeout_ms),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LokiLabels {
    #[serde(default = "default_job")]
    pub job: String,

    /// Defaults to the active profile.
    #[serde(default)]
    pub environment: Option<String>,
}

impl Default for LokiLabels {
    fn default() -> Self {
        Self {
            job: default_job(),
            environment: None,
        }
    }
}

fn default_loki_host() -> Option<String> {
    Some("http://localhost:3100".into())
}
fn default_job() -> String {
    "vigil-gateway".into()
}
fn default_batch_size() -> usize {
    100
}
fn default_batch_interval_ms() -> u64 {
    5000
}
fn default_loki_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Serve `GET /metrics`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Latency histogram bucket boundaries in milliseconds.
    #[serde(default = "default_buckets_ms")]
    pub buckets_ms: Vec<f64>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            buckets_ms: default_buckets_ms(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if self.buckets_ms.is_empty() {
            return Err(VigilError::BadRequest(
                "metrics.buckets_ms must not be empty".into(),
            ));
        }
        if self.buckets_ms.iter().any(|b| !b.is_finite()) {
            return Err(VigilError::BadRequest(
                "metrics.buckets_ms must be finite".into(),
            ));
        }
        if self.buckets_ms.windows(2).any(|w| w[0] >= w[1]) {
            return Err(VigilError::BadRequest(
                "metrics.buckets_ms must be strictly ascending".into(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

pub fn default_buckets_ms() -> Vec<f64> {
    vec![0.1, 5.0, 15.0, 50.0, 100.0, 500.0]
}
