use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Batch concurrency and item limit are at least 1
/// - The worker listens on at least one queue
/// - Converter URLs are http(s)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Batch validation
    if config.batch.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "batch.concurrency must be at least 1".to_string(),
        ));
    }
    if config.batch.max_items == 0 {
        return Err(ConfigError::ValidationError(
            "batch.max_items must be at least 1".to_string(),
        ));
    }

    // Queue validation
    if config.queue.queues.is_empty() {
        return Err(ConfigError::ValidationError(
            "queue.queues cannot be empty".to_string(),
        ));
    }

    // Converter validation
    for (kind, endpoint) in &config.converters {
        if !(endpoint.url.starts_with("http://") || endpoint.url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "converters.{}.url must be an http(s) URL, got '{}'",
                kind, endpoint.url
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{ConverterEndpoint, ConverterKind};

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_concurrency_fails() {
        let mut config = Config::default();
        config.batch.concurrency = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("batch.concurrency"));
    }

    #[test]
    fn test_validate_empty_queues_fails() {
        let mut config = Config::default();
        config.queue.queues.clear();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("queue.queues"));
    }

    #[test]
    fn test_validate_converter_url() {
        let mut config = Config::default();
        config.converters.insert(
            ConverterKind::Webpage,
            ConverterEndpoint {
                url: "ftp://localhost/convert".to_string(),
                api_key: None,
                timeout_secs: 30,
            },
        );
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("converters.webpage.url"));

        config.converters.get_mut(&ConverterKind::Webpage).unwrap().url =
            "http://localhost:11235/convert".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
