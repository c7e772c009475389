//! Scenario scheduler: spawns, replaces, drains and stops virtual users

use super::runner::{RunnerSummary, VirtualUser};
use crate::{
    client::{HttpClient, PreparedRequest},
    error::{AppError, Result},
    models::{RequestOutcome, RequestSpec, RunReport, ScenarioConfig, StatusExpectation, ThresholdRule},
    stats::ResultAggregator,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Tracks how many virtual users are live and the highest count seen
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicU32,
    peak: AtomicU32,
}

impl ConcurrencyGauge {
    pub fn enter(self: &Arc<Self>) -> GaugeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(self.clone())
    }

    pub fn current(&self) -> u32 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> u32 {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Decrements the gauge when the virtual user's task ends
#[derive(Debug)]
pub struct GaugeGuard(Arc<ConcurrencyGauge>);

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Report plus per-runner accounting
#[derive(Debug, Clone)]
pub struct RunResult {
    pub report: RunReport,
    pub runners: Vec<RunnerSummary>,
}

impl RunResult {
    /// Outcomes the runners say they sent
    pub fn emitted(&self) -> u64 {
        self.runners.iter().map(|r| r.emitted).sum()
    }
}

/// Drives one scenario against one request
pub struct ScenarioScheduler {
    scenario: ScenarioConfig,
    client: Arc<dyn HttpClient>,
    rules: Vec<ThresholdRule>,
    expectation: Arc<StatusExpectation>,
    stop: CancellationToken,
    channel_capacity: usize,
}

impl ScenarioScheduler {
    pub fn new(scenario: ScenarioConfig, client: Arc<dyn HttpClient>) -> Self {
        Self {
            scenario,
            client,
            rules: Vec::new(),
            expectation: Arc::new(StatusExpectation::default()),
            stop: CancellationToken::new(),
            channel_capacity: crate::defaults::OUTCOME_CHANNEL_CAPACITY,
        }
    }

    pub fn with_thresholds(mut self, rules: Vec<ThresholdRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_expectation(mut self, expectation: StatusExpectation) -> Self {
        self.expectation = Arc::new(expectation);
        self
    }

    /// Cancelling `stop` ends the run early with a graceful stop
    pub fn with_stop_token(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn scenario(&self) -> &ScenarioConfig {
        &self.scenario
    }

    /// Run the scenario and produce the final report
    pub async fn execute(&self, spec: &RequestSpec) -> Result<RunReport> {
        self.run(spec).await.map(|result| result.report)
    }

    /// Run the scenario, keeping per-runner summaries
    pub async fn run(&self, spec: &RequestSpec) -> Result<RunResult> {
        // Encoding and header errors surface here, before any runner starts.
        let request = Arc::new(spec.prepare()?);

        let aggregator = Arc::new(ResultAggregator::new(self.rules.clone()));
        let (tx, mut rx) = mpsc::channel::<RequestOutcome>(self.channel_capacity);
        let collector = {
            let aggregator = aggregator.clone();
            tokio::spawn(async move {
                let mut received: u64 = 0;
                while let Some(outcome) = rx.recv().await {
                    aggregator.record(outcome);
                    received += 1;
                }
                received
            })
        };

        tracing::info!(
            run_id = aggregator.run_id(),
            method = %request.method,
            url = %request.url,
            vus = self.scenario.concurrency(),
            stop = ?self.scenario.stop(),
            stages = self.scenario.stages().len(),
            "starting run"
        );

        let mut pool = RunnerPool {
            client: self.client.clone(),
            request,
            expectation: self.expectation.clone(),
            run: self.stop.child_token(),
            abort: CancellationToken::new(),
            outcomes: tx,
            gauge: Arc::new(ConcurrencyGauge::default()),
            tasks: JoinSet::new(),
            task_vus: HashMap::new(),
            active: Vec::new(),
            next_vu: 0,
            finished: Vec::new(),
        };

        let started_at = Utc::now();
        let start = Instant::now();

        if let Some(iterations) = self.scenario.stop().iterations_per_vu() {
            self.run_iterations(&mut pool, start, iterations).await;
        } else {
            self.run_duration(&mut pool, start).await;
        }

        self.shutdown(&mut pool).await;
        let finished_at = Utc::now();

        let RunnerPool { outcomes, gauge, finished, .. } = pool;
        drop(outcomes);
        let received = collector
            .await
            .map_err(|e| AppError::internal(format!("Outcome collector failed: {}", e)))?;

        let emitted: u64 = finished.iter().map(|r| r.emitted).sum();
        if emitted != received {
            tracing::warn!(emitted, received, "runner accounting does not match collected outcomes");
        }

        aggregator.record_peak_vus(gauge.peak());
        aggregator.seal(started_at, finished_at);
        let report = aggregator.finalize();

        tracing::info!(
            run_id = %report.run_id,
            total = report.total_requests,
            failed = report.failed_requests,
            passed = report.passed,
            "run finished"
        );

        Ok(RunResult { report, runners: finished })
    }

    /// Keep the live count at the current target until the duration ends.
    /// Runners that exit early are replaced; surplus runners are drained.
    async fn run_duration(&self, pool: &mut RunnerPool, start: Instant) {
        let deadline = start + self.scenario.stop().time_limit();
        let pause = self.scenario.pause();
        let mut target = self.scenario.target_at(start.elapsed());

        loop {
            pool.reconcile(target, pause);

            let next_change = self
                .scenario
                .next_stage_change(start.elapsed())
                .map(|offset| start + offset);

            tokio::select! {
                _ = pool.run.cancelled() => {
                    tracing::info!("stop requested, ending run early");
                    break;
                }
                _ = sleep_until(deadline) => break,
                _ = sleep_until_opt(next_change) => {
                    let next = self.scenario.target_at(start.elapsed());
                    if next != target {
                        tracing::info!(from = target, to = next, "stage target changed");
                        target = next;
                    }
                }
                Some(joined) = pool.tasks.join_next_with_id() => {
                    pool.handle_join(joined);
                }
            }
        }
    }

    /// Spawn every runner once; the run ends when all are done
    async fn run_iterations(&self, pool: &mut RunnerPool, start: Instant, iterations: u64) {
        let deadline = start + self.scenario.stop().time_limit();
        for _ in 0..self.scenario.concurrency() {
            pool.spawn(Some(iterations), self.scenario.pause());
        }

        loop {
            tokio::select! {
                _ = pool.run.cancelled() => {
                    tracing::info!("stop requested, ending run early");
                    break;
                }
                _ = sleep_until(deadline) => {
                    tracing::warn!(
                        max_duration = %humantime::format_duration(self.scenario.stop().time_limit()),
                        "maximum duration reached before all iterations completed"
                    );
                    break;
                }
                joined = pool.tasks.join_next_with_id() => match joined {
                    Some(joined) => pool.handle_join(joined),
                    None => break,
                },
            }
        }
    }

    /// Soft-stop everything, wait out the graceful period, then hard-stop
    async fn shutdown(&self, pool: &mut RunnerPool) {
        pool.run.cancel();

        let grace = tokio::time::sleep(self.scenario.graceful_stop());
        tokio::pin!(grace);

        loop {
            tokio::select! {
                joined = pool.tasks.join_next_with_id() => match joined {
                    Some(joined) => pool.handle_join(joined),
                    None => return,
                },
                _ = &mut grace => {
                    tracing::warn!(
                        remaining = pool.tasks.len(),
                        "graceful stop period elapsed, abandoning in-flight requests"
                    );
                    pool.abort.cancel();
                    break;
                }
            }
        }

        while let Some(joined) = pool.tasks.join_next_with_id().await {
            pool.handle_join(joined);
        }
    }
}

/// Live runner tasks and the shared pieces every runner gets
struct RunnerPool {
    client: Arc<dyn HttpClient>,
    request: Arc<PreparedRequest>,
    expectation: Arc<StatusExpectation>,
    run: CancellationToken,
    abort: CancellationToken,
    outcomes: mpsc::Sender<RequestOutcome>,
    gauge: Arc<ConcurrencyGauge>,
    tasks: JoinSet<RunnerSummary>,
    task_vus: HashMap<Id, u32>,
    /// Runners not asked to drain, oldest first
    active: Vec<(u32, CancellationToken)>,
    next_vu: u32,
    finished: Vec<RunnerSummary>,
}

impl RunnerPool {
    fn spawn(&mut self, iterations: Option<u64>, pause: Option<std::time::Duration>) {
        let vu = self.next_vu;
        self.next_vu += 1;

        let stop = self.run.child_token();
        let runner = VirtualUser::new(vu, self.client.clone(), self.request.clone(), self.outcomes.clone())
            .with_expectation(self.expectation.clone())
            .with_iterations(iterations)
            .with_pause(pause)
            .with_stop_token(stop.clone())
            .with_abort_token(self.abort.clone());

        let guard = self.gauge.enter();
        let handle = self.tasks.spawn(async move {
            let _guard = guard;
            runner.run().await
        });

        self.task_vus.insert(handle.id(), vu);
        self.active.push((vu, stop));
        tracing::debug!(vu, live = self.tasks.len(), "virtual user started");
    }

    /// Move toward `target` live runners. Never spawns while the live count,
    /// draining runners included, is at or above target.
    fn reconcile(&mut self, target: u32, pause: Option<std::time::Duration>) {
        let target = target as usize;

        while self.active.len() > target {
            if let Some((vu, stop)) = self.active.pop() {
                tracing::debug!(vu, "draining virtual user");
                stop.cancel();
            }
        }

        while self.tasks.len() < target && self.active.len() < target {
            self.spawn(None, pause);
        }
    }

    fn handle_join(&mut self, joined: std::result::Result<(Id, RunnerSummary), JoinError>) {
        let id = match &joined {
            Ok((id, _)) => *id,
            Err(e) => e.id(),
        };
        let vu = self.task_vus.remove(&id);
        if let Some(vu) = vu {
            self.active.retain(|(active, _)| *active != vu);
        }

        match joined {
            Ok((_, summary)) => self.finished.push(summary),
            Err(e) if e.is_panic() => {
                tracing::error!(vu = ?vu, "virtual user panicked");
            }
            Err(e) => {
                tracing::warn!(vu = ?vu, error = %e, "virtual user task did not complete");
            }
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
