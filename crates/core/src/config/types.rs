use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::admission::AdmissionPolicy;
use crate::batch::BatchConfig;
use crate::converter::{ConverterKind, ConvertersConfig};
use crate::progress::ProgressConfig;
use crate::queue::QueueName;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub admission: AdmissionPolicy,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub converters: ConvertersConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
///
/// Progress records and queued jobs share this file, which is how the
/// server and the worker process see each other's state.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("gobbler.db")
}

/// Background queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// How often an idle worker polls for jobs
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Queues a worker listens on, in priority order
    #[serde(default = "default_queues")]
    pub queues: Vec<QueueName>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            queues: default_queues(),
        }
    }
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval() -> u64 {
    500
}

fn default_queues() -> Vec<QueueName> {
    QueueName::ALL.to_vec()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub batch: BatchConfig,
    pub admission: AdmissionPolicy,
    pub progress: ProgressConfig,
    pub queue: QueueConfig,
    pub converters: BTreeMap<ConverterKind, SanitizedConverterEndpoint>,
}

/// Sanitized converter endpoint (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConverterEndpoint {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            batch: config.batch.clone(),
            admission: config.admission.clone(),
            progress: config.progress.clone(),
            queue: config.queue.clone(),
            converters: config
                .converters
                .iter()
                .map(|(kind, endpoint)| {
                    (
                        *kind,
                        SanitizedConverterEndpoint {
                            url: endpoint.url.clone(),
                            api_key_configured: endpoint
                                .api_key
                                .as_deref()
                                .is_some_and(|k| !k.is_empty()),
                            timeout_secs: endpoint.timeout_secs,
                        },
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
path = "/var/lib/gobbler/state.db"

[batch]
concurrency = 5
skip_existing = false

[batch.retry]
max_retries = 2

[admission]
threshold_secs = 60

[queue]
queues = ["transcription"]

[converters.webpage]
url = "http://localhost:11235/convert"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.batch.concurrency, 5);
        assert!(!config.batch.skip_existing);
        assert_eq!(config.batch.retry.max_retries, 2);
        assert_eq!(config.admission.threshold_secs, 60);
        assert_eq!(config.admission.batch_size_cutover, 10);
        assert_eq!(config.queue.queues, vec![QueueName::Transcription]);
        assert_eq!(config.queue.poll_interval_ms, 500);
        assert!(config.converters.contains_key(&ConverterKind::Webpage));
    }

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path, PathBuf::from("gobbler.db"));
        assert_eq!(config.batch.concurrency, 3);
        assert_eq!(config.progress.ttl_secs, 86400);
        assert_eq!(config.queue.queues.len(), 3);
        assert!(config.converters.is_empty());
    }

    #[test]
    fn test_sanitized_config() {
        let toml = r#"
[converters.audio]
url = "http://localhost:9000/transcribe"
api_key = "super-secret"

[converters.document]
url = "http://localhost:9001/convert"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);

        assert!(sanitized.converters[&ConverterKind::Audio].api_key_configured);
        assert!(!sanitized.converters[&ConverterKind::Document].api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("super-secret"));
        assert!(json.contains("api_key_configured"));
    }
}
