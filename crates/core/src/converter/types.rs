//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::batch::BatchItem;

/// Which family of external engine converts an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConverterKind {
    /// Video transcript retrieval.
    Youtube,
    /// HTML page to markdown.
    Webpage,
    /// Audio or video file transcription.
    Audio,
    /// Office and PDF documents.
    Document,
}

impl ConverterKind {
    pub const ALL: [ConverterKind; 4] = [
        ConverterKind::Youtube,
        ConverterKind::Webpage,
        ConverterKind::Audio,
        ConverterKind::Document,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Webpage => "webpage",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }

    /// Operation name recorded on progress records and summaries.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Youtube => "youtube_playlist",
            Self::Webpage => "webpage_batch",
            Self::Audio => "audio_batch",
            Self::Document => "document_batch",
        }
    }

    /// Whether items are local files rather than URLs.
    pub fn is_file_based(&self) -> bool {
        matches!(self, Self::Audio | Self::Document)
    }
}

impl fmt::Display for ConverterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversion request handed to an invoker.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// Batch the item belongs to.
    pub batch_id: String,
    /// The item to convert.
    pub item: BatchItem,
    /// Where to write the markdown, if the result goes to disk.
    pub output_path: Option<PathBuf>,
    /// Attempt number, starting at 1.
    pub attempt: u32,
}

impl ConversionJob {
    pub fn new(batch_id: impl Into<String>, item: BatchItem) -> Self {
        let output_path = item.expected_output();
        Self {
            batch_id: batch_id.into(),
            item,
            output_path,
            attempt: 1,
        }
    }
}
