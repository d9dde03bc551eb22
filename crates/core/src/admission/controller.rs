//! Sync-versus-enqueue decision.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use super::estimate::Workload;
use crate::queue::QueueName;

/// Thresholds for sending work to the background queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionPolicy {
    /// Work estimated above this many seconds is enqueued.
    #[serde(default = "default_threshold")]
    pub threshold_secs: u64,

    /// Batches with more items than this are enqueued.
    #[serde(default = "default_cutover")]
    pub batch_size_cutover: usize,
}

fn default_threshold() -> u64 {
    105
}

fn default_cutover() -> usize {
    10
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            threshold_secs: default_threshold(),
            batch_size_cutover: default_cutover(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionDecision {
    /// Run now and answer with the result.
    Sync,
    /// Hand off to the background queue.
    Enqueue,
}

impl AdmissionPolicy {
    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.threshold_secs)
    }

    /// Pure decision function.
    ///
    /// Without `auto_queue` everything runs inline. A missing estimate is
    /// decided on the item count alone.
    pub fn decide(
        &self,
        estimated: Option<Duration>,
        item_count: usize,
        auto_queue: bool,
    ) -> AdmissionDecision {
        if !auto_queue {
            return AdmissionDecision::Sync;
        }

        let too_long = estimated.is_some_and(|d| d > self.threshold());
        let too_many = item_count > self.batch_size_cutover;

        if too_long || too_many {
            AdmissionDecision::Enqueue
        } else {
            AdmissionDecision::Sync
        }
    }
}

/// Result of admitting a workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Admission {
    pub decision: AdmissionDecision,
    pub estimated: Duration,
    pub queue: QueueName,
}

/// Applies an [`AdmissionPolicy`] to workloads.
#[derive(Debug, Clone, Default)]
pub struct AdmissionController {
    policy: AdmissionPolicy,
}

impl AdmissionController {
    pub fn new(policy: AdmissionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    pub fn admit(&self, workload: &Workload, auto_queue: bool) -> Admission {
        let estimated = workload.estimate();
        // Batches are admitted on item count; their estimate is only reported.
        let decisive = match workload {
            Workload::Batch { .. } => None,
            _ => Some(estimated),
        };
        let decision = self
            .policy
            .decide(decisive, workload.item_count(), auto_queue);

        if decision == AdmissionDecision::Enqueue {
            info!(
                estimated_secs = estimated.as_secs(),
                threshold_secs = self.policy.threshold_secs,
                items = workload.item_count(),
                "Workload exceeds inline limits, will queue"
            );
        }

        Admission {
            decision,
            estimated,
            queue: workload.queue(),
        }
    }
}
