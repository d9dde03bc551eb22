//! Converter invokers.
//!
//! A converter turns one batch item into markdown by delegating to an
//! external engine. The batch processor only sees the
//! [`ConverterInvoker`] trait; [`ConverterRegistry`] maps each
//! [`ConverterKind`] to a concrete invoker.
//!
//! # Example
//!
//! ```ignore
//! use gobbler_core::converter::{ConverterKind, ConverterRegistry};
//!
//! let registry = ConverterRegistry::from_config(&config.converters)?;
//! let invoker = registry.resolve(ConverterKind::Webpage)?;
//! let summary = processor.run(items, invoker).await?;
//! ```

mod config;
mod error;
mod http;
mod registry;
mod traits;
mod types;

pub use config::{ConverterEndpoint, ConvertersConfig};
pub use error::ConverterError;
pub use http::{count_words, frontmatter, HttpConverter};
pub use registry::ConverterRegistry;
pub use traits::ConverterInvoker;
pub use types::{ConversionJob, ConverterKind};
