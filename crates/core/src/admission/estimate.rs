//! Workload cost estimation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::converter::ConverterKind;
use crate::queue::QueueName;

/// Something that may run inline or in the background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Workload {
    /// Speech-to-text of a local media file.
    Transcription { file_size_mb: f64 },
    /// Media download at a given quality (`360p`, `720p`, `best`, ...).
    Download { quality: String },
    /// A batch of `items` conversions of one kind.
    Batch { kind: ConverterKind, items: usize },
    /// Anything else.
    Other,
}

impl Workload {
    /// Expected wall-clock cost.
    pub fn estimate(&self) -> Duration {
        let secs = match self {
            Self::Transcription { file_size_mb } => (file_size_mb.max(0.0) * 6.0) as u64,
            Self::Download { quality } => match quality.as_str() {
                "360p" => 60,
                "480p" => 90,
                "720p" => 120,
                "1080p" | "best" => 180,
                _ => 120,
            },
            Self::Batch { kind, items } => per_item_secs(*kind) * *items as u64,
            Self::Other => 120,
        };
        Duration::from_secs(secs)
    }

    /// Number of items the workload covers.
    pub fn item_count(&self) -> usize {
        match self {
            Self::Batch { items, .. } => *items,
            _ => 1,
        }
    }

    /// Queue the workload lands on when enqueued.
    pub fn queue(&self) -> QueueName {
        match self {
            Self::Transcription { .. } => QueueName::Transcription,
            Self::Download { .. } => QueueName::Download,
            Self::Batch {
                kind: ConverterKind::Audio,
                ..
            } => QueueName::Transcription,
            Self::Batch { .. } | Self::Other => QueueName::Default,
        }
    }

    /// Upper bound on the background job's run time.
    pub fn job_timeout(&self) -> Duration {
        let minutes = match self {
            Self::Transcription { .. } => 30,
            Self::Download { .. } => 20,
            Self::Batch {
                kind: ConverterKind::Audio,
                ..
            } => 4 * 60,
            Self::Batch {
                kind: ConverterKind::Document,
                ..
            } => 3 * 60,
            Self::Batch { .. } => 2 * 60,
            Self::Other => 60,
        };
        Duration::from_secs(minutes * 60)
    }
}

fn per_item_secs(kind: ConverterKind) -> u64 {
    match kind {
        ConverterKind::Webpage => 60,
        ConverterKind::Youtube => 2 * 60,
        ConverterKind::Audio => 5 * 60,
        ConverterKind::Document => 3 * 60,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcription_scales_with_size() {
        let w = Workload::Transcription { file_size_mb: 50.0 };
        assert_eq!(w.estimate(), Duration::from_secs(300));
        assert_eq!(w.queue(), QueueName::Transcription);
    }

    #[test]
    fn test_download_quality_table() {
        let est = |q: &str| {
            Workload::Download {
                quality: q.to_string(),
            }
            .estimate()
            .as_secs()
        };
        assert_eq!(est("360p"), 60);
        assert_eq!(est("480p"), 90);
        assert_eq!(est("720p"), 120);
        assert_eq!(est("1080p"), 180);
        assert_eq!(est("best"), 180);
        assert_eq!(est("4k"), 120);
    }

    #[test]
    fn test_batch_estimate_and_queue() {
        let w = Workload::Batch {
            kind: ConverterKind::Webpage,
            items: 3,
        };
        assert_eq!(w.estimate(), Duration::from_secs(180));
        assert_eq!(w.item_count(), 3);
        assert_eq!(w.queue(), QueueName::Default);

        let audio = Workload::Batch {
            kind: ConverterKind::Audio,
            items: 2,
        };
        assert_eq!(audio.queue(), QueueName::Transcription);
        assert_eq!(audio.job_timeout(), Duration::from_secs(4 * 3600));
    }

    #[test]
    fn test_batch_per_item_costs() {
        let secs = |kind| Workload::Batch { kind, items: 2 }.estimate().as_secs();
        assert_eq!(secs(ConverterKind::Webpage), 2 * 60);
        assert_eq!(secs(ConverterKind::Youtube), 2 * 2 * 60);
        assert_eq!(secs(ConverterKind::Audio), 2 * 5 * 60);
        assert_eq!(secs(ConverterKind::Document), 2 * 3 * 60);

        let docs = Workload::Batch {
            kind: ConverterKind::Document,
            items: 1,
        };
        assert_eq!(docs.job_timeout(), Duration::from_secs(3 * 3600));
    }

    #[test]
    fn test_other_is_conservative() {
        assert_eq!(Workload::Other.estimate(), Duration::from_secs(120));
        assert_eq!(Workload::Other.item_count(), 1);
    }
}
