//! Periodic sampling of tc statistics into the namespace.
//!
//! Every cycle takes the namespace lock, erases the tree, runs `tc` twice
//! per interface and parses both listings into the tree. The lock is held
//! for the whole cycle, so queries wait for a finished tree instead of
//! seeing a partial one.
//!
//! A failing command or unparsable output aborts the cycle. The tree keeps
//! whatever was written before the failure and the next tick starts over.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tc_reader_common::{CommandExecutor, TcReaderResult};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::TcReaderConfig;
use crate::namespace::SharedNamespace;
use crate::parser::{parse_output, StatsKind};
use crate::types::UserClass;

/// Snapshot of the sampler's cycle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    /// Failures from commands that ran and exited non-zero.
    pub retryable_failures: u64,
    /// Failed cycles since the last successful one.
    pub consecutive_failures: u64,
    /// Samples written by the last successful cycle.
    pub last_sample_count: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    retryable_failures: AtomicU64,
    consecutive_failures: AtomicU64,
    last_sample_count: AtomicU64,
}

impl StatsCounters {
    fn record_success(&self, samples: usize) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.last_sample_count
            .store(samples as u64, Ordering::Relaxed);
    }

    /// Returns the number of consecutive failures including this one.
    fn record_failure(&self, retryable: bool) -> u64 {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        if retryable {
            self.retryable_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn snapshot(&self) -> SamplerStats {
        SamplerStats {
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            retryable_failures: self.retryable_failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            last_sample_count: self.last_sample_count.load(Ordering::Relaxed),
        }
    }
}

/// Runs `tc` and rebuilds the namespace from its output.
pub struct Sampler {
    config: Arc<TcReaderConfig>,
    executor: Arc<dyn CommandExecutor>,
    namespace: SharedNamespace,
    /// Composite class name -> user, built once from the config.
    users: HashMap<String, UserClass>,
    stats: Arc<StatsCounters>,
}

impl Sampler {
    /// Creates a sampler for `config`.
    ///
    /// Fails when the config does not pass [`TcReaderConfig::validate`], so a
    /// zero interval never reaches the ticker.
    pub fn new(
        config: Arc<TcReaderConfig>,
        executor: Arc<dyn CommandExecutor>,
        namespace: SharedNamespace,
    ) -> TcReaderResult<Self> {
        config.validate()?;
        let users = config.user_classes();
        Ok(Self {
            config,
            executor,
            namespace,
            users,
            stats: Arc::new(StatsCounters::default()),
        })
    }

    /// Current cycle counters.
    pub fn stats(&self) -> SamplerStats {
        self.stats.snapshot()
    }

    /// Runs one full rebuild and returns the number of samples written.
    ///
    /// Both listings of an interface are fetched before either is parsed.
    /// The first error ends the cycle; the namespace lock is released (and
    /// the keys sorted) on every path out.
    #[instrument(skip(self), fields(ifaces = self.config.ifaces.len()))]
    pub async fn run_cycle(&self) -> TcReaderResult<usize> {
        let mut namespace = self.namespace.rebuild().await;
        let mut samples = 0;

        for iface in &self.config.ifaces {
            let qdisc_output = self
                .executor
                .execute(&self.config.tc_cmd_path, &self.config.qdisc_args(iface))
                .await?;
            let class_output = self
                .executor
                .execute(&self.config.tc_cmd_path, &self.config.class_args(iface))
                .await?;

            samples += parse_output(
                &qdisc_output,
                iface,
                StatsKind::Qdisc,
                &self.users,
                &mut *namespace,
            )?;
            samples += parse_output(
                &class_output,
                iface,
                StatsKind::Class,
                &self.users,
                &mut *namespace,
            )?;
        }

        Ok(samples)
    }

    /// Runs one cycle, logging and counting the outcome.
    async fn cycle(&self) {
        match self.run_cycle().await {
            Ok(samples) => {
                self.stats.record_success(samples);
                debug!(samples, "Sampling cycle complete");
            }
            Err(e) => {
                let retryable = e.is_retryable();
                let consecutive_failures = self.stats.record_failure(retryable);
                error!(
                    error = %e,
                    retryable,
                    consecutive_failures,
                    "Sampling cycle failed, retrying on next tick"
                );
            }
        }
    }

    /// Runs the first cycle, then keeps sampling every `parse_interval` on
    /// a background task until the returned handle is stopped.
    pub async fn start(self) -> SamplerHandle {
        let period = self.config.parse_interval();
        info!(
            tc_cmd_path = %self.config.tc_cmd_path,
            interval_secs = period.as_secs(),
            ifaces = ?self.config.ifaces,
            users = self.config.users.len(),
            "Starting sampler"
        );
        debug!(config = ?self.config, "Sampler configuration");

        self.cycle().await;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let stats = Arc::clone(&self.stats);

        let join = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => self.cycle().await,
                }
            }
            debug!("Sampler task exiting");
        });

        SamplerHandle {
            cancel,
            join,
            stats,
        }
    }
}

/// Owns the background sampling task.
pub struct SamplerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
    stats: Arc<StatsCounters>,
}

impl SamplerHandle {
    /// Current cycle counters.
    pub fn stats(&self) -> SamplerStats {
        self.stats.snapshot()
    }

    /// Stops sampling and waits for the task to finish.
    ///
    /// A cycle in progress runs to completion first. Returns the final
    /// counters.
    pub async fn stop(self) -> SamplerStats {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            warn!(error = %e, "Sampler task did not exit cleanly");
        }
        let stats = self.stats.snapshot();
        info!(
            cycles_completed = stats.cycles_completed,
            cycles_failed = stats.cycles_failed,
            "Sampler stopped"
        );
        stats
    }
}
