//! Run-level aggregation of combination reports

use std::time::Duration;

use serde::Serialize;

use super::outcome::{CombinationOutcome, CombinationReport};

/// Everything one run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Per-combination reports, in execution order
    pub combinations: Vec<CombinationReport>,

    /// Whether the config snapshot reached durable storage
    pub snapshot_uploaded: bool,

    /// Wall time of the whole run
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunReport {
    /// Number of combinations executed
    pub fn total(&self) -> usize {
        self.combinations.len()
    }

    /// Combinations that completed
    pub fn done(&self) -> usize {
        self.count(|o| matches!(o, CombinationOutcome::Done))
    }

    /// Combinations that were skipped
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, CombinationOutcome::Skipped(_)))
    }

    /// Combinations that failed
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, CombinationOutcome::Failed { .. }))
    }

    /// Teardown attempts across all combinations
    pub fn teardowns(&self) -> usize {
        self.combinations.iter().filter(|c| c.torn_down()).count()
    }

    /// Data points published across all combinations
    pub fn published(&self) -> usize {
        self.combinations.iter().map(|c| c.published).sum()
    }

    fn count(&self, pred: impl Fn(&CombinationOutcome) -> bool) -> usize {
        self.combinations.iter().filter(|c| pred(&c.outcome)).count()
    }
}
