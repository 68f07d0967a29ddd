//! Task supervision and ordered shutdown
//!
//! Publishers and consumers run in separate `JoinSet`s with separate
//! cancellation tokens. On shutdown publishers are stopped first, so every
//! event they managed to send is still picked up by consumers, which are
//! cancelled (and drain) only once all publishers have exited.

use std::future::Future;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::pipeline::PipelineError;

pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

type TaskResult = (String, Result<(), PipelineError>);

/// Totals for one supervised run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, result: Result<TaskResult, JoinError>) {
        match result {
            Ok((name, Ok(()))) => {
                self.completed += 1;
                tracing::info!("✅ Task {} finished", name);
            }
            Ok((name, Err(e))) => {
                self.failed += 1;
                tracing::error!("❌ Task {} failed: {}", name, e);
            }
            Err(e) if e.is_cancelled() => {
                self.failed += 1;
                tracing::warn!("Task aborted before it finished draining");
            }
            Err(e) => {
                self.failed += 1;
                tracing::error!("❌ Task panicked: {}", e);
            }
        }
    }
}

/// Supervisor for publisher and consumer tasks
pub struct Lifecycle {
    root: CancellationToken,
    publishers_token: CancellationToken,
    consumers_token: CancellationToken,
    publishers: JoinSet<TaskResult>,
    consumers: JoinSet<TaskResult>,
    drain_timeout: Duration,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            publishers_token: CancellationToken::new(),
            consumers_token: CancellationToken::new(),
            publishers: JoinSet::new(),
            consumers: JoinSet::new(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Upper bound for each shutdown phase; tasks still running after it are aborted
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Token that starts a shutdown when cancelled, same as a signal
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Spawn a publisher task. `task` receives the publishers' cancellation token.
    pub fn spawn_publisher<F, Fut, E>(&mut self, name: impl Into<String>, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<PipelineError> + Send + 'static,
    {
        let name = name.into();
        tracing::debug!("Spawning publisher task {}", name);
        spawn_task(&mut self.publishers, name, task(self.publishers_token.clone()));
    }

    /// Spawn a consumer task. `task` receives the consumers' cancellation token.
    pub fn spawn_consumer<F, Fut, E>(&mut self, name: impl Into<String>, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<PipelineError> + Send + 'static,
    {
        let name = name.into();
        tracing::debug!("Spawning consumer task {}", name);
        spawn_task(&mut self.consumers, name, task(self.consumers_token.clone()));
    }

    /// Supervise tasks until `signal` resolves, the shutdown handle is
    /// cancelled or every task has ended, then shut down in order.
    pub async fn run_until<S>(mut self, signal: S) -> RunSummary
    where
        S: Future<Output = ()>,
    {
        let mut summary = RunSummary::default();
        tokio::pin!(signal);

        tracing::info!(
            "🚀 Supervising {} publisher(s) and {} consumer(s)",
            self.publishers.len(),
            self.consumers.len()
        );

        loop {
            if self.publishers.is_empty() && self.consumers.is_empty() {
                tracing::info!("All tasks have ended");
                return summary;
            }

            tokio::select! {
                _ = &mut signal => {
                    tracing::info!("🛑 Shutdown signal received");
                    break;
                }
                _ = self.root.cancelled() => {
                    tracing::info!("🛑 Shutdown requested");
                    break;
                }
                Some(result) = self.publishers.join_next(), if !self.publishers.is_empty() => {
                    summary.record(result);
                }
                Some(result) = self.consumers.join_next(), if !self.consumers.is_empty() => {
                    summary.record(result);
                }
            }
        }

        self.publishers_token.cancel();
        drain_set(&mut self.publishers, self.drain_timeout, "publisher", &mut summary).await;

        self.consumers_token.cancel();
        drain_set(&mut self.consumers, self.drain_timeout, "consumer", &mut summary).await;

        tracing::info!(
            "🔴 Shutdown complete ({} finished, {} failed)",
            summary.completed,
            summary.failed
        );

        summary
    }
}

fn spawn_task<Fut, E>(set: &mut JoinSet<TaskResult>, name: String, fut: Fut)
where
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<PipelineError> + Send + 'static,
{
    set.spawn(async move { (name, fut.await.map_err(Into::into)) });
}

async fn drain_set(
    set: &mut JoinSet<TaskResult>,
    timeout: Duration,
    kind: &str,
    summary: &mut RunSummary,
) {
    if set.is_empty() {
        return;
    }

    tracing::info!("Waiting for {} {} task(s) to stop", set.len(), kind);

    let joined = tokio::time::timeout(timeout, async {
        while let Some(result) = set.join_next().await {
            summary.record(result);
        }
    })
    .await;

    if joined.is_err() {
        tracing::warn!(
            "⚠️  {} {} task(s) still running after {:?}, aborting",
            set.len(),
            kind,
            timeout
        );
        set.abort_all();
        while let Some(result) = set.join_next().await {
            summary.record(result);
        }
    }
}

/// Resolve on SIGTERM or ctrl-c
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            return ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("SIGTERM received"),
        _ = ctrl_c() => {}
    }
}

#[cfg(not(unix))]
pub async fn shutdown_signal() {
    ctrl_c().await
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("ctrl-c received"),
        Err(e) => {
            // Without a handler only the shutdown handle can stop the process
            tracing::error!("Cannot listen for ctrl-c: {}", e);
            std::future::pending::<()>().await
        }
    }
}
