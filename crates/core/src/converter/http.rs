//! HTTP-backed converter invoker.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::config::ConverterEndpoint;
use super::error::ConverterError;
use super::traits::ConverterInvoker;
use super::types::{ConversionJob, ConverterKind};
use crate::batch::ConversionOutcome;

#[derive(Debug, Serialize)]
struct ConvertRequest<'a> {
    kind: ConverterKind,
    source: &'a str,
    options: &'a Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    markdown: String,
    #[serde(default)]
    metadata: Map<String, Value>,
}

/// Invoker that POSTs items to an external conversion engine.
///
/// The engine answers `{markdown, metadata}`. When the job carries an output
/// path the markdown is written there with a frontmatter header; otherwise it
/// is returned in the outcome metadata under `markdown`.
pub struct HttpConverter {
    kind: ConverterKind,
    name: String,
    client: Client,
    endpoint: ConverterEndpoint,
}

impl HttpConverter {
    pub fn new(kind: ConverterKind, endpoint: ConverterEndpoint) -> Result<Self, ConverterError> {
        if !endpoint.url.starts_with("http://") && !endpoint.url.starts_with("https://") {
            return Err(ConverterError::InvalidEndpoint {
                reason: format!("{} is not an http(s) URL", endpoint.url),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .build()
            .map_err(|e| ConverterError::InvalidEndpoint {
                reason: e.to_string(),
            })?;

        Ok(Self {
            kind,
            name: format!("http-{}", kind),
            client,
            endpoint,
        })
    }

    async fn request(&self, job: &ConversionJob) -> Result<ConvertResponse, ConverterError> {
        let body = ConvertRequest {
            kind: self.kind,
            source: &job.item.source,
            options: &job.item.metadata,
        };

        let mut request = self.client.post(&self.endpoint.url).json(&body);
        if let Some(key) = &self.endpoint.api_key {
            request = request.bearer_auth(key);
        }

        debug!(kind = %self.kind, source = %job.item.source, attempt = job.attempt, "Invoking converter");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ConverterError::Timeout
            } else {
                ConverterError::Request(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ConverterError::Status {
                status,
                body: body.chars().take(200).collect(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ConverterError::InvalidResponse(e.to_string()))
    }

    async fn convert(&self, job: ConversionJob) -> Result<ConversionOutcome, ConverterError> {
        let response = self.request(&job).await?;

        let mut metadata = response.metadata;
        metadata.insert(
            "word_count".to_string(),
            Value::from(count_words(&response.markdown)),
        );

        match &job.output_path {
            Some(path) => {
                let mut header = Map::new();
                header.insert("source".to_string(), Value::from(job.item.source.clone()));
                header.insert("converter".to_string(), Value::from(self.kind.as_str()));
                header.insert(
                    "converted_at".to_string(),
                    Value::from(Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
                );
                for (key, value) in &metadata {
                    header.insert(key.clone(), value.clone());
                }
                let header = frontmatter(&header).map_err(|e| ConverterError::Output {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                let document = format!("{}\n{}", header, response.markdown);
                write_output(path, &document).await?;

                Ok(ConversionOutcome::Success {
                    output_ref: path.to_string_lossy().to_string(),
                    metadata,
                })
            }
            None => {
                metadata.insert("markdown".to_string(), Value::from(response.markdown));
                Ok(ConversionOutcome::Success {
                    output_ref: job.item.source.clone(),
                    metadata,
                })
            }
        }
    }
}

#[async_trait]
impl ConverterInvoker for HttpConverter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, job: ConversionJob) -> ConversionOutcome {
        match self.convert(job).await {
            Ok(outcome) => outcome,
            Err(e) => e.into_outcome(),
        }
    }
}

async fn write_output(path: &Path, document: &str) -> Result<(), ConverterError> {
    let output_error = |e: std::io::Error| ConverterError::Output {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(output_error)?;
    }
    tokio::fs::write(path, document).await.map_err(output_error)
}

/// Renders a YAML frontmatter block delimited by `---` lines.
pub fn frontmatter(fields: &Map<String, Value>) -> Result<String, serde_yml::Error> {
    let yaml = serde_yml::to_string(fields)?;
    Ok(format!("---\n{}---\n", yaml))
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
