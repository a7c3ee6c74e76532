//! Geocoding service: interval scheduler, batch fan-out and workers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use atlas_core::{AtlasConfig, Task};
use atlas_geocode::{GeocodeError, Provider};
use atlas_store::TaskRepository;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics::GeocodingMetrics;

/// Maximum number of tasks fetched per cycle.
pub const BATCH_SIZE: usize = 100;

/// Tunables read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub workers: usize,
    pub interval: Duration,
    pub address_prefix: String,
}

impl ServiceSettings {
    pub fn from_config(config: &AtlasConfig) -> Self {
        Self {
            workers: config.workers,
            interval: config.interval,
            address_prefix: config.address_prefix.clone(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            workers: 10,
            interval: Duration::from_secs(600),
            address_prefix: String::new(),
        }
    }
}

type JobQueue = Arc<Mutex<mpsc::Receiver<Task>>>;

/// State shared by every worker of a batch.
struct WorkerContext {
    repo: Arc<dyn TaskRepository>,
    provider: Arc<dyn Provider>,
    metrics: Arc<GeocodingMetrics>,
    address_prefix: String,
}

impl WorkerContext {
    fn full_address(&self, address: &str) -> String {
        let prefix = self.address_prefix.trim_end_matches([',', ' ']);
        if prefix.is_empty() {
            address.to_string()
        } else {
            format!("{}, {}", prefix, address)
        }
    }

    async fn run(self: Arc<Self>, id: usize, jobs: JobQueue, token: CancellationToken) {
        loop {
            let next = jobs.lock().await.recv().await;
            let Some(task) = next else {
                break;
            };
            self.process(id, task, &token).await;
        }
        debug!(worker = id, "Worker finished");
    }

    async fn process(&self, worker: usize, task: Task, token: &CancellationToken) {
        self.metrics.active_workers.inc();
        debug!(worker, task = task.id, "Processing task");

        let address = self.full_address(&task.address);
        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(GeocodeError::Cancelled),
            result = self.provider.geocode(&address) => result,
        };
        self.metrics
            .observe_request(self.provider.name(), started.elapsed().as_secs_f64());

        match result {
            Err(GeocodeError::Cancelled) => {
                warn!(worker, task = task.id, "Geocoding cancelled, task left pending");
            }
            Err(e) => {
                error!(worker, task = task.id, error = %e, "Failed to geocode");
                self.metrics.record_failure();
                if let Err(e) = self
                    .repo
                    .increment_failure_count(task.id, &e.to_string())
                    .await
                {
                    error!(
                        worker,
                        task = task.id,
                        error = %e,
                        "Could not update failure count for task"
                    );
                }
            }
            Ok(coords) => {
                self.metrics.record_success();
                match self.repo.update_task_coordinates(task.id, coords).await {
                    Ok(()) => debug!(worker, task = task.id, "Worker successfully processed the task"),
                    Err(e) => error!(
                        worker,
                        task = task.id,
                        error = %e,
                        "Failed to update coordinates for task"
                    ),
                }
            }
        }

        self.metrics.active_workers.dec();
    }
}

/// Periodically geocodes pending tasks with a fixed-size worker pool.
pub struct GeocodingService {
    ctx: Arc<WorkerContext>,
    workers: usize,
    interval: Duration,
}

impl GeocodingService {
    pub fn new(
        repo: Arc<dyn TaskRepository>,
        provider: Arc<dyn Provider>,
        metrics: Arc<GeocodingMetrics>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            ctx: Arc::new(WorkerContext {
                repo,
                provider,
                metrics,
                address_prefix: settings.address_prefix,
            }),
            workers: settings.workers.max(1),
            interval: settings.interval,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one batch per interval until `token` is cancelled.
    ///
    /// The first batch starts one full interval after the call. A batch that
    /// overruns the interval delays the next tick instead of queueing extra ones.
    pub async fn run(&self, token: CancellationToken) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            workers = self.workers,
            interval_secs = self.interval.as_secs(),
            provider = self.ctx.provider.name(),
            "Geocoding service started"
        );

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    info!("Polling for new tasks to geocode");
                    self.process_batch(&token).await;
                }
            }
        }

        info!("Geocoding service stopped");
    }

    /// Fetch one batch and wait for every worker to drain it.
    ///
    /// Returns the number of tasks dispatched.
    pub async fn process_batch(&self, token: &CancellationToken) -> usize {
        let tasks = match self.ctx.repo.fetch_tasks_for_geocoding(BATCH_SIZE).await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(error = %e, "Failed to fetch tasks");
                return 0;
            }
        };
        if tasks.is_empty() {
            info!("No tasks to process");
            return 0;
        }

        let total = tasks.len();
        info!(
            jobs = total,
            num_workers = self.workers,
            "Found tasks to process, starting worker pool"
        );

        let (tx, rx) = mpsc::channel(total);
        let jobs: JobQueue = Arc::new(Mutex::new(rx));

        let mut pool = JoinSet::new();
        for id in 1..=self.workers {
            pool.spawn(self.ctx.clone().run(id, jobs.clone(), token.clone()));
        }

        for task in tasks {
            // Capacity equals the batch size, so this never waits.
            if tx.send(task).await.is_err() {
                error!("Job queue closed before all tasks were dispatched");
                break;
            }
        }
        drop(tx);

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker terminated abnormally");
            }
        }

        info!(jobs = total, "Processing batch finished");
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use atlas_core::{Coordinates, Error, Result, TaskId};
    use parking_lot::Mutex as SyncMutex;
    use prometheus::Registry;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum Write {
        Update(TaskId, Coordinates),
        Failure(TaskId, String),
    }

    #[derive(Default)]
    struct FakeRepo {
        tasks: SyncMutex<Option<Result<Vec<Task>>>>,
        limits: SyncMutex<Vec<usize>>,
        writes: SyncMutex<Vec<Write>>,
        fail_writes: bool,
    }

    impl FakeRepo {
        fn with_tasks(tasks: Vec<Task>) -> Self {
            Self {
                tasks: SyncMutex::new(Some(Ok(tasks))),
                ..Default::default()
            }
        }

        fn failing_writes(tasks: Vec<Task>) -> Self {
            Self {
                fail_writes: true,
                ..Self::with_tasks(tasks)
            }
        }

        fn writes(&self) -> Vec<Write> {
            self.writes.lock().clone()
        }
    }

    #[async_trait]
    impl TaskRepository for FakeRepo {
        async fn fetch_tasks_for_geocoding(&self, limit: usize) -> Result<Vec<Task>> {
            self.limits.lock().push(limit);
            self.tasks.lock().take().unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn update_task_coordinates(&self, task_id: TaskId, coords: Coordinates) -> Result<()> {
            self.writes.lock().push(Write::Update(task_id, coords));
            if self.fail_writes {
                return Err(Error::Database("disk full".into()));
            }
            Ok(())
        }

        async fn increment_failure_count(&self, task_id: TaskId, error: &str) -> Result<()> {
            self.writes
                .lock()
                .push(Write::Failure(task_id, error.to_string()));
            if self.fail_writes {
                return Err(Error::Database("disk full".into()));
            }
            Ok(())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Answers from a fixed address table; unknown addresses are soft misses.
    #[derive(Default)]
    struct FakeProvider {
        known: HashMap<String, Coordinates>,
        calls: SyncMutex<Vec<String>>,
        hang: bool,
    }

    impl FakeProvider {
        fn knowing(entries: &[(&str, Coordinates)]) -> Self {
            Self {
                known: entries
                    .iter()
                    .map(|(a, c)| (a.to_string(), *c))
                    .collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Provider for FakeProvider {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn geocode(&self, address: &str) -> std::result::Result<Coordinates, GeocodeError> {
            self.calls.lock().push(address.to_string());
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.known
                .get(address)
                .copied()
                .ok_or(GeocodeError::EmptyResponse { provider: "fake" })
        }
    }

    fn kyiv() -> Coordinates {
        Coordinates::new(50.45, 30.52).unwrap()
    }

    fn service(
        repo: Arc<FakeRepo>,
        provider: Arc<FakeProvider>,
        settings: ServiceSettings,
    ) -> (GeocodingService, Arc<GeocodingMetrics>) {
        let metrics = Arc::new(GeocodingMetrics::new(&Registry::new()).unwrap());
        let svc = GeocodingService::new(repo, provider, metrics.clone(), settings);
        (svc, metrics)
    }

    fn settings(workers: usize) -> ServiceSettings {
        ServiceSettings {
            workers,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_success_updates_coordinates_only() {
        let repo = Arc::new(FakeRepo::with_tasks(vec![Task::new(1, "Kyiv")]));
        let provider = Arc::new(FakeProvider::knowing(&[("Kyiv", kyiv())]));
        let (svc, metrics) = service(repo.clone(), provider.clone(), settings(2));

        let dispatched = svc.process_batch(&CancellationToken::new()).await;

        assert_eq!(dispatched, 1);
        assert_eq!(*repo.limits.lock(), vec![BATCH_SIZE]);
        assert_eq!(repo.writes(), vec![Write::Update(1, kyiv())]);
        assert_eq!(metrics.processed("success"), 1);
        assert_eq!(metrics.processed("failure"), 0);
        assert_eq!(metrics.active_workers.get(), 0);
    }

    #[tokio::test]
    async fn test_failure_increments_with_error_text() {
        let repo = Arc::new(FakeRepo::with_tasks(vec![Task::new(2, "Invalid Address")]));
        let provider = Arc::new(FakeProvider::default());
        let (svc, metrics) = service(repo.clone(), provider, settings(2));

        svc.process_batch(&CancellationToken::new()).await;

        assert_eq!(
            repo.writes(),
            vec![Write::Failure(2, "fake API returned empty response".into())]
        );
        assert_eq!(metrics.processed("failure"), 1);
        assert_eq!(metrics.api_errors.get(), 1);
    }

    #[tokio::test]
    async fn test_one_write_and_one_sample_per_task() {
        let tasks: Vec<Task> = (1..=25)
            .map(|id| {
                let address = if id % 3 == 0 { "Nowhere" } else { "Kyiv" };
                Task::new(id, address)
            })
            .collect();
        let repo = Arc::new(FakeRepo::with_tasks(tasks));
        let provider = Arc::new(FakeProvider::knowing(&[("Kyiv", kyiv())]));
        let (svc, metrics) = service(repo.clone(), provider.clone(), settings(4));

        svc.process_batch(&CancellationToken::new()).await;

        let writes = repo.writes();
        assert_eq!(writes.len(), 25);
        let mut ids: Vec<TaskId> = writes
            .iter()
            .map(|w| match w {
                Write::Update(id, _) | Write::Failure(id, _) => *id,
            })
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=25).collect::<Vec<_>>());

        let failures = writes
            .iter()
            .filter(|w| matches!(w, Write::Failure(..)))
            .count();
        assert_eq!(failures, 8);
        assert_eq!(metrics.processed("success"), 17);
        assert_eq!(metrics.processed("failure"), 8);
        assert_eq!(metrics.request_count("fake"), 25);
        assert_eq!(provider.calls().len(), 25);
    }

    #[tokio::test]
    async fn test_more_workers_than_tasks() {
        let repo = Arc::new(FakeRepo::with_tasks(vec![Task::new(1, "Kyiv")]));
        let provider = Arc::new(FakeProvider::knowing(&[("Kyiv", kyiv())]));
        let (svc, _) = service(repo.clone(), provider, settings(16));

        assert_eq!(svc.process_batch(&CancellationToken::new()).await, 1);
        assert_eq!(repo.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_dispatches_nothing() {
        let repo = Arc::new(FakeRepo {
            tasks: SyncMutex::new(Some(Err(Error::Database("connection lost".into())))),
            ..Default::default()
        });
        let provider = Arc::new(FakeProvider::default());
        let (svc, metrics) = service(repo.clone(), provider.clone(), settings(2));

        assert_eq!(svc.process_batch(&CancellationToken::new()).await, 0);
        assert!(provider.calls().is_empty());
        assert!(repo.writes().is_empty());
        assert_eq!(metrics.request_count("fake"), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_dispatches_nothing() {
        let repo = Arc::new(FakeRepo::with_tasks(Vec::new()));
        let provider = Arc::new(FakeProvider::default());
        let (svc, _) = service(repo.clone(), provider.clone(), settings(2));

        assert_eq!(svc.process_batch(&CancellationToken::new()).await, 0);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_write_errors_are_not_escalated() {
        let repo = Arc::new(FakeRepo::failing_writes(vec![
            Task::new(1, "Kyiv"),
            Task::new(2, "Nowhere"),
        ]));
        let provider = Arc::new(FakeProvider::knowing(&[("Kyiv", kyiv())]));
        let (svc, metrics) = service(repo.clone(), provider, settings(1));

        assert_eq!(svc.process_batch(&CancellationToken::new()).await, 2);
        assert_eq!(repo.writes().len(), 2);
        assert_eq!(metrics.processed("success"), 1);
        assert_eq!(metrics.processed("failure"), 1);
        assert_eq!(metrics.active_workers.get(), 0);
    }

    #[tokio::test]
    async fn test_address_prefix_is_prepended() {
        let repo = Arc::new(FakeRepo::with_tasks(vec![Task::new(1, "вул. Польова, 3")]));
        let provider = Arc::new(FakeProvider::default());
        let (svc, _) = service(
            repo,
            provider.clone(),
            ServiceSettings {
                workers: 1,
                address_prefix: "Тернопільська обл., ".into(),
                ..Default::default()
            },
        );

        svc.process_batch(&CancellationToken::new()).await;
        assert_eq!(provider.calls(), vec!["Тернопільська обл., вул. Польова, 3"]);
    }

    #[tokio::test]
    async fn test_cancelled_batch_leaves_tasks_untouched() {
        let repo = Arc::new(FakeRepo::with_tasks(vec![
            Task::new(1, "Kyiv"),
            Task::new(2, "Kyiv"),
        ]));
        let provider = Arc::new(FakeProvider {
            hang: true,
            ..Default::default()
        });
        let (svc, metrics) = service(repo.clone(), provider, settings(2));

        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let dispatched = tokio::time::timeout(Duration::from_secs(5), svc.process_batch(&token))
            .await
            .expect("batch should end after cancellation");

        assert_eq!(dispatched, 2);
        assert!(repo.writes().is_empty());
        assert_eq!(metrics.processed("success") + metrics.processed("failure"), 0);
        assert_eq!(metrics.request_count("fake"), 2);
        assert_eq!(metrics.active_workers.get(), 0);
    }

    struct CountingRepo {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl TaskRepository for CountingRepo {
        async fn fetch_tasks_for_geocoding(&self, _limit: usize) -> Result<Vec<Task>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn update_task_coordinates(&self, _: TaskId, _: Coordinates) -> Result<()> {
            Ok(())
        }

        async fn increment_failure_count(&self, _: TaskId, _: &str) -> Result<()> {
            Ok(())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_after_interval_and_stops_on_cancel() {
        let repo = Arc::new(CountingRepo {
            fetches: AtomicUsize::new(0),
        });
        let metrics = Arc::new(GeocodingMetrics::new(&Registry::new()).unwrap());
        let svc = Arc::new(GeocodingService::new(
            repo.clone(),
            Arc::new(FakeProvider::default()),
            metrics,
            ServiceSettings {
                workers: 1,
                interval: Duration::from_secs(60),
                address_prefix: String::new(),
            },
        ));

        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let svc = svc.clone();
            let token = token.clone();
            async move { svc.run(token).await }
        });

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(repo.fetches.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(repo.fetches.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(repo.fetches.load(Ordering::SeqCst), 2);

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("run should return after cancellation")
            .unwrap();
    }

    #[test]
    fn test_settings_from_config() {
        let config = AtlasConfig::from_lookup(|key| match key {
            "ATLAS_WORKERS" => Some("3".into()),
            "ATLAS_INTERVAL" => Some("30s".into()),
            "ATLAS_ADDRESS_PREFIX" => Some("Kyiv".into()),
            _ => None,
        })
        .unwrap();
        let settings = ServiceSettings::from_config(&config);
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.interval, Duration::from_secs(30));
        assert_eq!(settings.address_prefix, "Kyiv");
    }
}
