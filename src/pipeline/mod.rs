// src/pipeline/mod.rs
//! The ingestion pipeline: fetch → dedup → persist → enrich → discover,
//! driven by the orchestrator and triggered manually or by the scheduler.

pub mod dedup;
pub mod orchestrator;
pub mod scheduler;
pub mod summarizer;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fetch::RawItem;

pub use orchestrator::Pipeline;
pub use scheduler::Scheduler;

/// What started a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Manual,
    Scheduled,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Manual => "manual",
            Trigger::Scheduled => "scheduled",
        }
    }
}

/// One per-source error recorded on a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceError {
    pub source: String,
    pub error: String,
}

/// A fetched item still tied to the source that produced it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub source_id: Uuid,
    pub item: RawItem,
}
