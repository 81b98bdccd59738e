//! Bounded-parallel dispatch of an [`Analyzer`] over a target list.
//!
//! The [`Orchestrator`] keeps at most `concurrency` analyses in flight,
//! gives every target its own timeout, and turns every per-target problem
//! (error, timeout, panic) into a failed [`Outcome`] instead of aborting the
//! batch. An interrupt stops the run early and returns whatever completed.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use techsweep::analyzer::{select_analyzer, Backend};
//! use techsweep::orchestrator::{ctrl_c, Orchestrator};
//! use techsweep::Target;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let analyzer = select_analyzer(Backend::Headers, "", "")?;
//!     let orchestrator = Orchestrator::new(analyzer, 5, Duration::from_secs(30))?;
//!
//!     let targets = vec![Target::parse("example.com").unwrap()];
//!     let report = orchestrator.run(targets, ctrl_c()).await;
//!     println!("{} outcomes", report.outcomes.len());
//!     Ok(())
//! }
//! ```

use crate::analyzer::Analyzer;
use crate::error::{AnalysisError, SetupError};
use crate::model::{Outcome, Target};
use chrono::{DateTime, Utc};
use futures::future::{self, FutureExt};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default per-target timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(500);

/// Runs one analyzer over many targets.
pub struct Orchestrator {
    analyzer: Arc<dyn Analyzer>,
    concurrency: usize,
    timeout: Duration,
    progress: Option<ProgressBar>,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunReport {
    /// One outcome per completed target, in submission order.
    pub outcomes: Vec<Outcome>,
    /// Number of targets submitted to the run.
    pub submitted: usize,
    /// True if the run was stopped before every target completed.
    pub interrupted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Indexed outcome store shared by all in-flight analyses of one run.
#[derive(Default)]
struct Collector {
    slots: Mutex<Vec<(usize, Outcome)>>,
}

impl Collector {
    fn push(&self, index: usize, outcome: Outcome) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((index, outcome));
    }

    /// Outcomes in submission order.
    fn into_outcomes(self) -> Vec<Outcome> {
        let mut slots = self
            .slots
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        slots.sort_by_key(|(index, _)| *index);
        slots.into_iter().map(|(_, outcome)| outcome).collect()
    }
}

impl Orchestrator {
    /// Creates an orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::ZeroConcurrency`] if `concurrency` is 0.
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        concurrency: usize,
        timeout: Duration,
    ) -> Result<Self, SetupError> {
        if concurrency == 0 {
            return Err(SetupError::ZeroConcurrency);
        }

        Ok(Self {
            analyzer,
            concurrency,
            timeout,
            progress: None,
        })
    }

    /// Attaches a progress bar that is ticked once per outcome.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Analyzes every target, stopping early if `interrupt` completes first.
    ///
    /// Never fails: per-target problems become failed outcomes and an
    /// interrupt yields the outcomes completed so far.
    pub async fn run<I>(&self, targets: Vec<Target>, interrupt: I) -> RunReport
    where
        I: Future<Output = ()>,
    {
        let started_at = Utc::now();
        let submitted = targets.len();
        let collector = Collector::default();

        if let Some(pb) = &self.progress {
            pb.set_length(submitted as u64);
        }

        info!(
            targets = submitted,
            concurrency = self.concurrency,
            analyzer = self.analyzer.name(),
            "starting run"
        );

        let interrupted = {
            let work = stream::iter(targets.into_iter().enumerate())
                .map(|(index, target)| async move { (index, self.analyze_one(target).await) })
                .buffer_unordered(self.concurrency)
                .for_each(|(index, outcome)| {
                    if let Some(pb) = &self.progress {
                        pb.inc(1);
                    }
                    collector.push(index, outcome);
                    future::ready(())
                });

            tokio::select! {
                _ = work => false,
                _ = interrupt => true,
            }
        };

        let outcomes = collector.into_outcomes();
        if interrupted {
            warn!(
                completed = outcomes.len(),
                submitted, "run interrupted, keeping partial results"
            );
        }

        if let Some(pb) = &self.progress {
            pb.finish_with_message(format!("{}/{} targets analyzed", outcomes.len(), submitted));
        }

        RunReport {
            outcomes,
            submitted,
            interrupted,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn analyze_one(&self, target: Target) -> Outcome {
        debug!(target = %target, "dispatching");

        let analysis = AssertUnwindSafe(self.analyzer.analyze(&target)).catch_unwind();
        let result = match tokio::time::timeout(self.timeout, analysis).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(AnalysisError::Execution(format!(
                "analyzer panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Err(_) => Err(AnalysisError::Timeout(self.timeout)),
        };

        match &result {
            Ok(analysis) => debug!(
                target = %target,
                findings = analysis.findings.len(),
                "analysis complete"
            ),
            Err(e) => warn!(target = %target, error = %e, "analysis failed"),
        }

        Outcome { target, result }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Completes on Ctrl-C. Never completes if the handler cannot be installed.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for Ctrl-C");
        future::pending::<()>().await;
    }
}

/// Runs `on_signal` in a background task once `signal` completes.
///
/// After [`ctrl_c`] has been awaited the runtime keeps its handler for the
/// rest of the process, so a later Ctrl-C no longer terminates it. Spawn this
/// with a fresh [`ctrl_c`] to turn that second Ctrl-C into a hard exit.
pub fn spawn_exit_on<F, H>(signal: F, on_signal: H) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
    H: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        signal.await;
        on_signal();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Analysis, Finding};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Sleeps for the delay encoded in the target (`http://slow-<ms>`),
    /// fails for targets containing `fail`, panics for `panic`.
    #[derive(Default)]
    struct StubAnalyzer {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Analyzer for StubAnalyzer {
        fn name(&self) -> &'static str {
            "Stub"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn analyze(&self, target: &Target) -> Result<Analysis, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            let delay = target
                .as_str()
                .rsplit_once("slow-")
                .and_then(|(_, ms)| ms.parse::<u64>().ok())
                .unwrap_or(10);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if target.as_str().contains("panic") {
                panic!("stub panic");
            }
            if target.as_str().contains("fail") {
                return Err(AnalysisError::Execution("stub failure".into()));
            }
            Ok(Analysis::new(vec![Finding::new(
                "Nginx",
                Some("1.18"),
                target.clone(),
            )]))
        }
    }

    fn targets(names: &[&str]) -> Vec<Target> {
        names.iter().map(|n| Target::parse(n).unwrap()).collect()
    }

    fn orchestrator(analyzer: Arc<StubAnalyzer>, concurrency: usize) -> Orchestrator {
        Orchestrator::new(analyzer, concurrency, Duration::from_secs(30)).unwrap()
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let analyzer = Arc::new(StubAnalyzer::default());
        let result = Orchestrator::new(analyzer, 0, DEFAULT_TIMEOUT);
        assert!(matches!(result, Err(SetupError::ZeroConcurrency)));
    }

    #[tokio::test]
    async fn test_never_exceeds_concurrency() {
        let analyzer = Arc::new(StubAnalyzer::default());
        let names: Vec<String> = (0..20).map(|i| format!("host{}.test/slow-20", i)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();

        let report = orchestrator(analyzer.clone(), 3)
            .run(targets(&names), future::pending())
            .await;

        assert_eq!(report.outcomes.len(), 20);
        assert_eq!(analyzer.max_in_flight.load(Ordering::SeqCst), 3);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn test_outcomes_keep_submission_order() {
        let analyzer = Arc::new(StubAnalyzer::default());
        let input = targets(&["a.test/slow-60", "b.test/slow-30", "c.test/slow-1"]);

        let report = orchestrator(analyzer, 3).run(input.clone(), future::pending()).await;

        let order: Vec<_> = report.outcomes.iter().map(|o| o.target.clone()).collect();
        assert_eq!(order, input);
        assert!(!report.interrupted);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let analyzer = Arc::new(StubAnalyzer::default());
        let input = targets(&["a.test", "fail.test", "panic.test", "d.test"]);

        let report = orchestrator(analyzer, 2).run(input, future::pending()).await;

        assert_eq!(report.outcomes.len(), 4);
        assert!(report.outcomes[0].is_success());
        assert!(matches!(
            report.outcomes[1].result,
            Err(AnalysisError::Execution(ref msg)) if msg == "stub failure"
        ));
        assert!(matches!(
            report.outcomes[2].result,
            Err(AnalysisError::Execution(ref msg)) if msg.contains("stub panic")
        ));
        assert!(report.outcomes[3].is_success());
        assert_eq!(report.outcomes.iter().filter(|o| !o.is_success()).count(), 2);
    }

    #[tokio::test]
    async fn test_timeout_only_affects_slow_target() {
        let analyzer = Arc::new(StubAnalyzer::default());
        let orchestrator = Orchestrator::new(analyzer, 2, Duration::from_millis(100)).unwrap();
        let input = targets(&["a.test", "b.test/slow-5000"]);

        let report = orchestrator.run(input, future::pending()).await;

        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes[0].is_success());
        assert_eq!(
            report.outcomes[1].result,
            Err(AnalysisError::Timeout(Duration::from_millis(100)))
        );
    }

    #[tokio::test]
    async fn test_interrupt_returns_partial_results() {
        let analyzer = Arc::new(StubAnalyzer::default());
        let input = targets(&["a.test", "b.test/slow-10000", "c.test", "d.test/slow-10000"]);
        let interrupt = tokio::time::sleep(Duration::from_millis(200));

        let report = orchestrator(analyzer, 4).run(input, interrupt).await;

        assert!(report.interrupted);
        assert_eq!(report.submitted, 4);
        let completed: Vec<_> = report.outcomes.iter().map(|o| o.target.as_str()).collect();
        assert_eq!(completed, vec!["http://a.test", "http://c.test"]);
    }

    #[tokio::test]
    async fn test_empty_target_list() {
        let analyzer = Arc::new(StubAnalyzer::default());
        let report = orchestrator(analyzer, 5).run(Vec::new(), future::pending()).await;

        assert!(report.outcomes.is_empty());
        assert!(!report.interrupted);
    }

    #[tokio::test]
    async fn test_progress_ticks_once_per_outcome() {
        let analyzer = Arc::new(StubAnalyzer::default());
        let progress = ProgressBar::hidden();
        let orchestrator = orchestrator(analyzer, 2).with_progress(progress.clone());

        orchestrator
            .run(targets(&["a.test", "fail.test", "c.test"]), future::pending())
            .await;

        assert_eq!(progress.position(), 3);
        assert_eq!(progress.length(), Some(3));
    }

    #[tokio::test]
    async fn test_exit_hook_runs_after_signal() {
        let fired = Arc::new(AtomicBool::new(false));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let flag = fired.clone();
        let handle = spawn_exit_on(
            async move {
                let _ = rx.await;
            },
            move || flag.store(true, Ordering::SeqCst),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!fired.load(Ordering::SeqCst));

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_exit_hook_never_runs_without_signal() {
        let fired = Arc::new(AtomicBool::new(false));

        let flag = fired.clone();
        let handle = spawn_exit_on(future::pending(), move || flag.store(true, Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(!fired.load(Ordering::SeqCst));
    }
}
