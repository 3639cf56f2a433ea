mod leaderboard_snapshot;
mod session_cleanup;

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{broadcast, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::Database;

pub use leaderboard_snapshot::refresh_snapshots;
pub use session_cleanup::{cleanup_sessions, CleanupStats, ABANDONED_QUIZ_MAX_AGE_HOURS};

const SESSION_CLEANUP_SCHEDULE: &str = "0 */30 * * * *";

pub struct WorkerManager {
    scheduler: Mutex<JobScheduler>,
    shutdown_tx: broadcast::Sender<()>,
    db: Database,
    leader: bool,
    snapshot_schedule: String,
    running: AtomicBool,
}

impl WorkerManager {
    pub async fn new(db: Database, config: &Config) -> Result<Self, WorkerError> {
        let scheduler = JobScheduler::new().await?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            shutdown_tx,
            db,
            leader: config.worker_leader,
            snapshot_schedule: config.leaderboard_snapshot_schedule.clone(),
            running: AtomicBool::new(false),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub async fn start(&self) -> Result<(), WorkerError> {
        if !self.leader {
            info!("WORKER_LEADER not set, skipping worker startup");
            return Ok(());
        }

        info!("Starting workers (leader mode)");
        let scheduler = self.scheduler.lock().await;

        {
            let db = self.db.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();
            let job = Job::new_async(self.snapshot_schedule.as_str(), move |_uuid, _lock| {
                let db = db.clone();
                let mut rx = shutdown_rx.resubscribe();
                Box::pin(async move {
                    tokio::select! {
                        _ = rx.recv() => {},
                        result = refresh_snapshots(&db) => {
                            if let Err(e) = result {
                                error!(error = %e, "Leaderboard snapshot worker error");
                            }
                        }
                    }
                })
            })?;
            scheduler.add(job).await?;
            info!(schedule = %self.snapshot_schedule, "Leaderboard snapshot worker scheduled");
        }

        {
            let db = self.db.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();
            let job = Job::new_async(SESSION_CLEANUP_SCHEDULE, move |_uuid, _lock| {
                let db = db.clone();
                let mut rx = shutdown_rx.resubscribe();
                Box::pin(async move {
                    tokio::select! {
                        _ = rx.recv() => {},
                        result = cleanup_sessions(&db) => {
                            if let Err(e) = result {
                                error!(error = %e, "Session cleanup worker error");
                            }
                        }
                    }
                })
            })?;
            scheduler.add(job).await?;
            info!("Session cleanup worker scheduled (every 30 minutes)");
        }

        scheduler.start().await?;
        self.running.store(true, Ordering::Relaxed);
        info!("All workers started");
        Ok(())
    }

    pub async fn stop(&self) {
        if !self.is_running() {
            return;
        }

        info!("Stopping workers...");
        let _ = self.shutdown_tx.send(());
        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "Error shutting down scheduler");
        }
        self.running.store(false, Ordering::Relaxed);
        info!("Workers stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
