//! Admission control: run inline or hand off to the background queue.

mod controller;
mod estimate;

pub use controller::{Admission, AdmissionController, AdmissionDecision, AdmissionPolicy};
pub use estimate::Workload;
