//! Configuration for the converter module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::ConverterKind;

/// Endpoint of one external conversion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterEndpoint {
    /// Base URL the conversion request is POSTed to.
    pub url: String,

    /// Bearer token sent with each request.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    300
}

/// Endpoints keyed by converter kind.
pub type ConvertersConfig = BTreeMap<ConverterKind, ConverterEndpoint>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table() {
        let toml = r#"
[webpage]
url = "http://localhost:11235/convert"

[audio]
url = "http://localhost:9000/transcribe"
api_key = "secret"
timeout_secs = 1800
"#;
        let config: ConvertersConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.len(), 2);
        assert_eq!(config[&ConverterKind::Webpage].timeout_secs, 300);
        assert_eq!(config[&ConverterKind::Audio].api_key.as_deref(), Some("secret"));
    }
}
