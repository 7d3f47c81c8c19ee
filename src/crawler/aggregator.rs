use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::crawler::record::Record;
use crate::crawler::task::{Readiness, TaskError, TaskOutcome};
use crate::extract::Field;
use crate::utils::metrics::RunMetrics;

/// Single consumer of task outcomes. Records are kept in arrival order.
pub struct Aggregator {
    run_id: Uuid,
    submitted: usize,
    records: Vec<Record>,
    failures: Vec<TaskError>,
    metrics: RunMetrics,
}

/// Everything a finished run produced
#[derive(Debug, Serialize)]
pub struct HarvestReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub submitted: usize,
    pub records: Vec<Record>,
    pub failures: Vec<TaskError>,
    pub metrics: RunMetrics,
}

impl HarvestReport {
    pub fn produced(&self) -> usize {
        self.records.len()
    }

    pub fn dropped(&self) -> usize {
        self.failures.len()
    }

    pub fn log_summary(&self) {
        info!(
            "Run {} finished: submitted {}, produced {}, dropped {}",
            self.run_id,
            self.submitted,
            self.produced(),
            self.dropped()
        );
        info!(
            "Readiness: {} ready, {} degraded, {} timed out; mean task time {} ms",
            self.metrics.ready,
            self.metrics.degraded,
            self.metrics.timed_out,
            self.metrics.mean_duration_ms()
        );
        for failure in &self.failures {
            warn!("Dropped {} ({}): {}", failure.identifier, failure.error_type, failure.error);
        }
    }
}

impl Aggregator {
    pub fn new(submitted: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            submitted,
            records: Vec::with_capacity(submitted),
            failures: Vec::new(),
            metrics: RunMetrics::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn seen(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    /// Take one task outcome
    pub fn accept(&mut self, outcome: TaskOutcome) {
        let position = self.seen() + 1;

        match outcome {
            TaskOutcome::Completed(result) => {
                let name: String = result.record.get(Field::Name).chars().take(30).collect();
                match result.readiness {
                    Readiness::TimedOut => warn!(
                        "[{}/{}] {} page never became ready, defaults kept",
                        position,
                        self.submitted,
                        result.record.identifier()
                    ),
                    _ => info!(
                        "[{}/{}] processed {} - {}",
                        position,
                        self.submitted,
                        result.record.identifier(),
                        name
                    ),
                }
                self.metrics.record_completion(result.readiness, result.elapsed_ms);
                self.records.push(result.record);
            }
            TaskOutcome::Failed(failure) => {
                error!(
                    "[{}/{}] {} dropped after {} failure: {}",
                    position, self.submitted, failure.identifier, failure.error_type, failure.error
                );
                self.metrics.record_failure();
                self.failures.push(failure);
            }
        }
    }

    /// Close the run. With `sort` the records are ordered by identifier.
    pub fn finish(mut self, sort: bool) -> HarvestReport {
        if self.seen() != self.submitted {
            warn!(
                "Run {} accounted for {} of {} identifiers",
                self.run_id,
                self.seen(),
                self.submitted
            );
        }

        if sort {
            self.records.sort_by(|a, b| a.identifier().cmp(b.identifier()));
        }

        HarvestReport {
            run_id: self.run_id,
            started_at: self.metrics.start_time,
            finished_at: Utc::now(),
            submitted: self.submitted,
            records: self.records,
            failures: self.failures,
            metrics: self.metrics,
        }
    }
}
