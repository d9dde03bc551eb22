//! Converter lookup by kind.

use std::collections::HashMap;
use std::sync::Arc;

use super::config::ConvertersConfig;
use super::error::ConverterError;
use super::http::HttpConverter;
use super::traits::ConverterInvoker;
use super::types::ConverterKind;

/// Maps each converter kind to its invoker.
///
/// A batch resolves its kind once and shares the resulting invoker across
/// every item task.
#[derive(Default, Clone)]
pub struct ConverterRegistry {
    invokers: HashMap<ConverterKind, Arc<dyn ConverterInvoker>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an HTTP invoker for every configured endpoint.
    pub fn from_config(config: &ConvertersConfig) -> Result<Self, ConverterError> {
        let mut registry = Self::new();
        for (kind, endpoint) in config {
            let converter = HttpConverter::new(*kind, endpoint.clone())?;
            registry.register(*kind, Arc::new(converter));
        }
        Ok(registry)
    }

    /// Registers (or replaces) the invoker of `kind`.
    pub fn register(&mut self, kind: ConverterKind, invoker: Arc<dyn ConverterInvoker>) {
        self.invokers.insert(kind, invoker);
    }

    pub fn resolve(&self, kind: ConverterKind) -> Result<Arc<dyn ConverterInvoker>, ConverterError> {
        self.invokers
            .get(&kind)
            .cloned()
            .ok_or(ConverterError::NotConfigured { kind })
    }

    /// Configured kinds, in a stable order.
    pub fn kinds(&self) -> Vec<ConverterKind> {
        ConverterKind::ALL
            .into_iter()
            .filter(|kind| self.invokers.contains_key(kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::ConverterEndpoint;
    use crate::testing::MockConverter;

    #[test]
    fn test_resolve_registered() {
        let mut registry = ConverterRegistry::new();
        registry.register(ConverterKind::Webpage, Arc::new(MockConverter::new()));

        let invoker = registry.resolve(ConverterKind::Webpage).unwrap();
        assert_eq!(invoker.name(), "mock");
        assert!(matches!(
            registry.resolve(ConverterKind::Audio),
            Err(ConverterError::NotConfigured { kind: ConverterKind::Audio })
        ));
        assert_eq!(registry.kinds(), vec![ConverterKind::Webpage]);
    }

    #[test]
    fn test_from_config() {
        let mut config = ConvertersConfig::new();
        config.insert(
            ConverterKind::Document,
            ConverterEndpoint {
                url: "http://localhost:5001/convert".to_string(),
                api_key: None,
                timeout_secs: 60,
            },
        );
        let registry = ConverterRegistry::from_config(&config).unwrap();
        assert_eq!(registry.resolve(ConverterKind::Document).unwrap().name(), "http-document");
    }

    #[test]
    fn test_from_config_rejects_bad_url() {
        let mut config = ConvertersConfig::new();
        config.insert(
            ConverterKind::Webpage,
            ConverterEndpoint {
                url: "localhost:11235".to_string(),
                api_key: None,
                timeout_secs: 60,
            },
        );
        assert!(ConverterRegistry::from_config(&config).is_err());
    }
}
