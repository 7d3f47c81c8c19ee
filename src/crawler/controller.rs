use futures::FutureExt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::browser::{PageSession, SessionError, SessionFactory};
use crate::cli::config::HarvesterConfig;
use crate::crawler::aggregator::{Aggregator, HarvestReport};
use crate::crawler::readiness::{acquire, PageOutcome};
use crate::crawler::record::build_record;
use crate::crawler::task::{
    HarvestTask, Readiness, TaskError, TaskFailure, TaskOutcome, TaskResult,
};
use crate::utils::metrics::TaskTimer;

/// Runs one task per identifier on a bounded pool of workers
pub struct HarvestController {
    config: Arc<HarvesterConfig>,
    factory: Arc<dyn SessionFactory>,
}

impl HarvestController {
    pub fn new(config: HarvesterConfig, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            config: Arc::new(config),
            factory,
        }
    }

    /// Harvest every identifier and return the aggregated report.
    ///
    /// At most `scraper.workers` tasks (and so browser sessions) are in flight
    /// at any time. Outcomes are aggregated in completion order.
    pub async fn run(&self, identifiers: Vec<String>) -> HarvestReport {
        let submitted = identifiers.len();
        let mut aggregator = Aggregator::new(submitted);
        let worker_count = self.config.scraper.effective_workers().min(submitted.max(1));

        info!(
            "Run {}: {} identifiers on {} workers",
            aggregator.run_id(),
            submitted,
            worker_count
        );

        let (task_tx, task_rx) = mpsc::channel::<HarvestTask>(submitted.max(1));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<TaskOutcome>();

        for identifier in &identifiers {
            let task = HarvestTask::new(identifier, &self.config.scraper);
            if task_tx.send(task).await.is_err() {
                error!("Task queue closed before {} was queued", identifier);
            }
        }
        drop(task_tx);

        let task_rx = Arc::new(Mutex::new(task_rx));
        let mut workers = JoinSet::new();

        for worker_id in 0..worker_count {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let factory = self.factory.clone();
            let config = self.config.clone();

            workers.spawn(async move {
                debug!("Worker {} started", worker_id);

                loop {
                    // Hold the lock only while taking the next task
                    let next = task_rx.lock().await.recv().await;
                    let Some(task) = next else {
                        break;
                    };

                    debug!("Worker {} processing {}", worker_id, task.identifier);
                    let outcome = Self::process_guarded(task, &factory, &config).await;

                    if result_tx.send(outcome).is_err() {
                        error!("Worker {} lost the result channel", worker_id);
                        break;
                    }
                }

                debug!("Worker {} finished", worker_id);
            });
        }
        drop(result_tx);

        while let Some(outcome) = result_rx.recv().await {
            aggregator.accept(outcome);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Worker task failed: {}", e);
            }
        }

        let report = aggregator.finish(self.config.scraper.sort_output);
        report.log_summary();
        report
    }

    /// Process a task, turning a panic anywhere inside it into a dropped record
    async fn process_guarded(
        task: HarvestTask,
        factory: &Arc<dyn SessionFactory>,
        config: &HarvesterConfig,
    ) -> TaskOutcome {
        let fallback = task.clone();

        match AssertUnwindSafe(Self::process_task(task, factory, config))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                TaskOutcome::Failed(TaskError::new(&fallback, TaskFailure::Panic(message)))
            }
        }
    }

    /// One wall-clock deadline covers opening the session and the whole
    /// readiness protocol.
    async fn process_task(
        task: HarvestTask,
        factory: &Arc<dyn SessionFactory>,
        config: &HarvesterConfig,
    ) -> TaskOutcome {
        let timer = TaskTimer::start();
        let limit = Duration::from_secs(config.scraper.task_timeout_secs);
        let deadline = Instant::now() + limit;

        let session = match Self::open_session(factory, deadline).await {
            Ok(session) => session,
            Err(SessionOpen::Failed(e)) => {
                return TaskOutcome::Failed(TaskError::new(&task, e.into()))
            }
            Err(SessionOpen::Expired) => {
                warn!("{}: no browser session before the deadline", task.identifier);
                return TaskOutcome::Failed(TaskError::new(&task, TaskFailure::Deadline(limit)));
            }
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let acquired = if remaining.is_zero() {
            let mut session = session;
            if let Err(e) = session.close().await {
                error!("{}: failed to release browser session: {}", task.identifier, e);
            }
            Err(TaskFailure::Deadline(limit))
        } else {
            acquire(session, &task, &config.readiness, remaining).await
        };

        let (source, readiness) = match acquired {
            Ok(PageOutcome::Ready { document, degraded }) => {
                let readiness = if degraded { Readiness::Degraded } else { Readiness::Ready };
                (Some(document), readiness)
            }
            Ok(PageOutcome::TimedOut) => (None, Readiness::TimedOut),
            Err(TaskFailure::Deadline(_)) => {
                return TaskOutcome::Failed(TaskError::new(&task, TaskFailure::Deadline(limit)))
            }
            Err(failure) => return TaskOutcome::Failed(TaskError::new(&task, failure)),
        };

        let record = build_record(&task.identifier, &task.url, source.as_deref());

        TaskOutcome::Completed(TaskResult {
            record,
            readiness,
            elapsed_ms: timer.end(),
        })
    }

    /// Open a session on its own task so the deadline never cuts a WebDriver
    /// handshake short. A session that arrives too late is closed once it does.
    async fn open_session(
        factory: &Arc<dyn SessionFactory>,
        deadline: Instant,
    ) -> Result<Box<dyn PageSession>, SessionOpen> {
        let factory = factory.clone();
        let mut opening = tokio::spawn(async move { factory.open().await });

        match timeout_at(deadline, &mut opening).await {
            Ok(Ok(opened)) => opened.map_err(SessionOpen::Failed),
            Ok(Err(join)) if join.is_panic() => panic::resume_unwind(join.into_panic()),
            Ok(Err(join)) => Err(SessionOpen::Failed(SessionError::Connect(join.to_string()))),
            Err(_) => {
                tokio::spawn(async move {
                    if let Ok(Ok(mut late)) = opening.await {
                        match late.close().await {
                            Ok(()) => debug!("Closed browser session that opened after its deadline"),
                            Err(e) => error!("Failed to close late browser session: {}", e),
                        }
                    }
                });
                Err(SessionOpen::Expired)
            }
        }
    }
}

enum SessionOpen {
    Failed(SessionError),
    Expired,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::browser::testing::{FakeFactory, PageScript};
    use crate::cli::config::ScraperSettings;
    use crate::extract::fixtures::PRODUCT_PAGE;
    use crate::extract::{Field, ALL_FIELDS};
    use crate::crawler::record::Record;
    use crate::crawler::task::FailureKind;
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;

    fn config(workers: usize) -> HarvesterConfig {
        let mut config = HarvesterConfig::default();
        config.scraper.workers = workers;
        config.readiness.settle_ms = 0;
        config
    }

    fn url(id: &str) -> String {
        ScraperSettings::default().page_url(id)
    }

    #[tokio::test]
    async fn test_mixed_run_defaults_timeouts_and_drops_session_faults() {
        let config = config(2);
        let mut pages = HashMap::new();
        pages.insert(url("A"), PageScript::blank(PRODUCT_PAGE));
        pages.insert(url("B"), PageScript::rendered(PRODUCT_PAGE, &config.readiness));
        pages.insert(url("C"), PageScript::broken());
        let factory = Arc::new(FakeFactory::new(pages));

        let controller = HarvestController::new(config, factory.clone());
        let report = controller
            .run(vec!["A".to_string(), "B".to_string(), "C".to_string()])
            .await;

        assert_eq!(report.submitted, 3);
        assert_eq!(report.produced(), 2);
        assert_eq!(report.dropped(), 1);

        let a = report.records.iter().find(|r| r.identifier() == "A").unwrap();
        assert_eq!(*a, Record::seeded("A", &url("A")));
        assert_eq!(a.get(Field::Url), url("A"));

        let b = report.records.iter().find(|r| r.identifier() == "B").unwrap();
        assert_eq!(b.get(Field::Name), "Куртка демисезонная стеганая");
        assert_eq!(b.get(Field::CountryOfOrigin), "Китай");

        assert!(report.records.iter().all(|r| r.len() == ALL_FIELDS.len()));
        assert!(report.records.iter().all(|r| r.identifier() != "C"));
        assert_eq!(report.failures[0].identifier, "C");
        assert_eq!(report.failures[0].error_type, FailureKind::Session);

        assert_eq!(factory.stats.opened.load(Ordering::SeqCst), 3);
        assert_eq!(factory.stats.closed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_active_sessions_never_exceed_worker_bound() {
        let workers = 3;
        let config = config(workers);
        let ids: Vec<String> = (0..12).map(|i| format!("{}", 1000 + i)).collect();

        let mut pages = HashMap::new();
        for id in &ids {
            let script = PageScript::rendered(PRODUCT_PAGE, &config.readiness)
                .with_load_time(Duration::from_millis(15));
            pages.insert(url(id), script);
        }
        let factory = Arc::new(FakeFactory::new(pages));

        let report = HarvestController::new(config, factory.clone()).run(ids).await;

        assert_eq!(report.produced(), 12);
        let peak = factory.stats.peak.load(Ordering::SeqCst);
        assert!(peak <= workers, "peak {} exceeded {}", peak, workers);
        assert!(peak >= 2, "tasks never overlapped");
        assert_eq!(factory.stats.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_produced_plus_dropped_equals_submitted() {
        let config = config(4);
        let ids: Vec<String> = (0..9).map(|i| i.to_string()).collect();

        let mut pages = HashMap::new();
        for (i, id) in ids.iter().enumerate() {
            let script = match i % 3 {
                0 => PageScript::rendered(PRODUCT_PAGE, &config.readiness),
                1 => PageScript::blank(PRODUCT_PAGE),
                _ => PageScript::broken(),
            };
            pages.insert(url(id), script);
        }
        let factory = Arc::new(FakeFactory::new(pages));

        let report = HarvestController::new(config, factory).run(ids).await;

        assert_eq!(report.produced(), 6);
        assert_eq!(report.dropped(), 3);
        assert_eq!(report.produced() + report.dropped(), report.submitted);
        assert_eq!(report.metrics.ready, 3);
        assert_eq!(report.metrics.timed_out, 3);
    }

    #[tokio::test]
    async fn test_slow_open_counts_against_the_task_deadline() {
        let mut config = config(1);
        config.scraper.task_timeout_secs = 1;
        let mut pages = HashMap::new();
        pages.insert(
            url("A"),
            PageScript::rendered(PRODUCT_PAGE, &config.readiness)
                .with_load_time(Duration::from_millis(700)),
        );
        let factory = Arc::new(FakeFactory::new(pages).with_open_delay(Duration::from_millis(700)));

        let started = std::time::Instant::now();
        let report = HarvestController::new(config, factory.clone())
            .run(vec!["A".to_string()])
            .await;

        assert!(started.elapsed() < Duration::from_millis(1300));
        assert_eq!(report.produced(), 0);
        assert_eq!(report.failures[0].error_type, FailureKind::Deadline);
        assert_eq!(factory.stats.opened.load(Ordering::SeqCst), 1);
        assert_eq!(factory.stats.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_opened_after_deadline_is_still_closed() {
        let mut config = config(1);
        config.scraper.task_timeout_secs = 1;
        let factory = Arc::new(
            FakeFactory::new(HashMap::new()).with_open_delay(Duration::from_millis(1200)),
        );

        let report = HarvestController::new(config, factory.clone())
            .run(vec!["A".to_string()])
            .await;

        assert_eq!(report.dropped(), 1);
        assert_eq!(report.failures[0].error_type, FailureKind::Deadline);

        // The handshake finishes in the background and the late session is quit
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(factory.stats.opened.load(Ordering::SeqCst), 1);
        assert_eq!(factory.stats.closed.load(Ordering::SeqCst), 1);
        assert_eq!(factory.stats.active.load(Ordering::SeqCst), 0);
    }

    struct PanickingFactory;

    #[async_trait]
    impl SessionFactory for PanickingFactory {
        async fn open(&self) -> Result<Box<dyn PageSession>, SessionError> {
            panic!("chromedriver binary not found")
        }
    }

    #[tokio::test]
    async fn test_panic_while_opening_drops_only_that_task() {
        let ids: Vec<String> = (0..3).map(|i| i.to_string()).collect();

        let report = HarvestController::new(config(2), Arc::new(PanickingFactory))
            .run(ids)
            .await;

        assert_eq!(report.produced(), 0);
        assert_eq!(report.dropped(), 3);
        assert_eq!(report.produced() + report.dropped(), report.submitted);
        assert!(report.failures.iter().all(|f| f.error_type == FailureKind::Panic));
        assert!(report.failures[0].error.contains("chromedriver binary not found"));
    }

    #[tokio::test]
    async fn test_sorted_output() {
        let mut config = config(2);
        config.scraper.sort_output = true;
        let ids = vec!["300".to_string(), "100".to_string(), "200".to_string()];
        let factory = Arc::new(FakeFactory::new(HashMap::new()));

        let report = HarvestController::new(config, factory).run(ids).await;

        let order: Vec<&str> = report.records.iter().map(|r| r.identifier()).collect();
        assert_eq!(order, vec!["100", "200", "300"]);
    }

    #[tokio::test]
    async fn test_empty_input_produces_empty_report() {
        let factory = Arc::new(FakeFactory::new(HashMap::new()));
        let report = HarvestController::new(config(2), factory.clone()).run(Vec::new()).await;

        assert_eq!(report.submitted, 0);
        assert_eq!(report.produced(), 0);
        assert_eq!(factory.stats.opened.load(Ordering::SeqCst), 0);
    }
}
