// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, shutdown, logging.
//!
//! Startup order matters: database presence, then the exclusive lock, then
//! store open + freshness, then the executor and the control socket.
//! Failures before the lock leave no trace; failures after release the lock
//! on drop.

use crate::listener::ControlSocket;
use crate::lock::{ExclusiveLock, LockError, LockOwner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use vc_core::{InstanceId, SystemClock, UuidIdGen};
use vc_engine::{
    CliGit, CostTracker, DedupConfig, DedupEngine, Executor, ExecutorConfig, GateRunner,
    HeuristicSupervisor, PipelineDeps, SandboxManager,
};
use vc_store::{validate_freshness, EmbeddedStore, FreshnessReport, IssueStore, StorePaths};

/// Feed-vs-database skew tolerated before the store counts as stale.
const FRESHNESS_TOLERANCE: Duration = Duration::from_secs(5);

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (vc.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// The executor type the daemon runs.
pub type DaemonExecutor = Executor<SystemClock, UuidIdGen>;

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub project_root: PathBuf,
    pub paths: StorePaths,
    pub executor: ExecutorConfig,
    pub freshness_tolerance: Duration,
}

impl DaemonConfig {
    /// Default layout for a project root.
    pub fn for_project(project_root: &Path) -> Self {
        let paths = StorePaths::for_project(project_root);
        let executor = ExecutorConfig {
            parent_repo: project_root.to_path_buf(),
            sandbox_root: paths.store_dir().join("sandboxes"),
            ..ExecutorConfig::default()
        }
        .with_env_overrides();

        Self {
            project_root: project_root.to_path_buf(),
            paths,
            executor,
            freshness_tolerance: FRESHNESS_TOLERANCE,
        }
    }
}

/// Lifecycle errors. Precondition-class errors exit 2 at the CLI.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no database at {path} — run `vc init` first")]
    NoDatabase { path: PathBuf },

    #[error(
        "database is stale: issues.jsonl is newer than the last import — run `vc doctor --fix`"
    )]
    StaleDatabase { feed_mtime_ms: u64, last_import_ms: u64 },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("store error: {0}")]
    Store(#[from] vc_store::StoreError),

    #[error(transparent)]
    Engine(#[from] vc_engine::EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LifecycleError {
    /// Exit-code mapping: 2 for preconditions, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleError::NoDatabase { .. }
            | LifecycleError::StaleDatabase { .. }
            | LifecycleError::Lock(_) => 2,
            LifecycleError::Engine(e) if e.is_precondition() => 2,
            _ => 1,
        }
    }
}

/// A running daemon: executor + control socket + held lock.
pub struct Daemon {
    pub store: Arc<EmbeddedStore>,
    pub executor: Arc<DaemonExecutor>,
    pub config: DaemonConfig,
    listener_task: JoinHandle<()>,
    // NOTE(lifetime): held for the daemon's life; dropping releases the sentinel
    lock: ExclusiveLock,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon").finish_non_exhaustive()
    }
}

impl Daemon {
    /// Graceful shutdown: stop the executor (checkpoint/release in-flight
    /// claim), tear down the socket, release the lock.
    pub async fn shutdown(self) {
        self.executor.stop().await;
        self.listener_task.abort();
        if self.config.paths.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.paths.socket_path) {
                tracing::warn!(error = %e, "failed to remove control socket");
            }
        }
        self.lock.release();
        tracing::info!("daemon shutdown complete");
    }
}

/// Bring the executor up. Returns once every task is launched.
pub async fn startup(config: DaemonConfig) -> Result<Daemon, LifecycleError> {
    // 1. Database must exist
    if !config.paths.database_exists() {
        return Err(LifecycleError::NoDatabase {
            path: config.paths.db_path.clone(),
        });
    }

    // 2. Exclusive lock FIRST: even opening the store can repair a torn WAL,
    // and that must never race a live owner. Early-return paths below release
    // it on drop.
    let instance_id = InstanceId::new(uuid::Uuid::new_v4().to_string());
    let owner = LockOwner {
        pid: std::process::id(),
        hostname: hostname(),
        instance_id: instance_id.to_string(),
        acquired_at_ms: std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64,
    };
    let lock = ExclusiveLock::acquire(&config.paths.lock_path, &owner)?;

    // 3. Open the store and validate freshness against the canonical feed
    let store = Arc::new(EmbeddedStore::open(config.paths.clone())?);
    match validate_freshness(
        store.last_import_ms()?,
        &config.paths.feed_path,
        config.freshness_tolerance.as_millis() as u64,
    ) {
        FreshnessReport::Fresh => {}
        FreshnessReport::NoFeed => {
            tracing::warn!("no issues.jsonl feed; skipping freshness check");
        }
        FreshnessReport::Stale {
            feed_mtime_ms,
            last_import_ms,
        } => {
            return Err(LifecycleError::StaleDatabase {
                feed_mtime_ms,
                last_import_ms,
            });
        }
    }

    // 4. Wire the engine
    let git = Arc::new(CliGit);
    let supervisor = Arc::new(HeuristicSupervisor);
    let deps = PipelineDeps {
        store: store.clone() as Arc<dyn IssueStore>,
        supervisor: supervisor.clone(),
        git: git.clone(),
        sandboxes: SandboxManager::new(
            config.executor.sandbox_root.clone(),
            config.executor.parent_repo.clone(),
            config.executor.sandboxes_enabled,
            git,
        ),
        gates: GateRunner::new(config.executor.gates.clone(), SystemClock),
        dedup: DedupEngine::new(
            store.clone() as Arc<dyn IssueStore>,
            supervisor,
            UuidIdGen,
            DedupConfig::default(),
        ),
        budget: Arc::new(CostTracker::new(config.executor.budget.clone(), SystemClock)),
        config: config.executor.clone(),
        clock: SystemClock,
    };

    let executor = Arc::new(Executor::with_instance_id(deps, instance_id));
    executor.start()?;

    // 5. Control socket last: only advertise once the executor is live
    let socket = ControlSocket::bind(&config.paths.socket_path)?;
    let listener_task = tokio::spawn(socket.run(executor.control()));

    tracing::info!(
        instance_id = %executor.instance_id(),
        socket = %config.paths.socket_path.display(),
        "executor daemon ready"
    );

    Ok(Daemon {
        store,
        executor,
        config,
        listener_task,
        lock,
    })
}

/// Rotate the daemon log if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `vc.log` -> `vc.log.1` -> `vc.log.2` -> `vc.log.3`, deleting the
/// oldest. Best-effort: rotation failures do not block startup.
pub fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Set up file logging for daemon mode. Returns the guard that flushes the
/// non-blocking writer; keep it alive for the process lifetime.
pub fn setup_logging(
    log_path: &Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let parent = log_path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;
    rotate_log_if_needed(log_path);

    let file_name = log_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "vc.log".to_string());
    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
