//! Per-user request quota: charging and the periodic daily reset.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::QUOTA_PERIOD_HOURS;
use crate::store::Store;

pub const QUOTA_EXCEEDED_MESSAGE: &str = "Request quota exhausted, it will be restored within 24 hours of the last reset";

/// Source of the current time, injected so sweeps can be tested without waiting.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Take one request from the user's quota and return what is left.
pub async fn charge(store: &dyn Store, user_id: Uuid) -> Result<i32, AppError> {
    store
        .charge_user(user_id)
        .await?
        .ok_or_else(|| AppError::QuotaExceeded(QUOTA_EXCEEDED_MESSAGE.to_string()))
}

/// Restores the full quota of users whose last reset is a day old.
pub struct QuotaResetJob {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl QuotaResetJob {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            store,
            clock,
            interval,
        }
    }

    /// One pass over all users. Returns how many were reset.
    pub async fn sweep(&self) -> Result<u64, sqlx::Error> {
        let now = self.clock.now();
        let due_before = now - chrono::Duration::hours(QUOTA_PERIOD_HOURS);
        let reset = self.store.reset_quotas(due_before, now).await?;
        if reset > 0 {
            tracing::info!("Quota reset for {reset} users");
        }
        Ok(reset)
    }

    /// Run a sweep every interval until the returned handle is stopped.
    pub fn start(self) -> QuotaResetHandle {
        let (shutdown_tx, mut shutdown) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!("Quota reset job started (every {:?})", self.interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep().await {
                            tracing::error!("Quota reset sweep failed: {e}");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }

            tracing::debug!("Quota reset job stopped");
        });

        QuotaResetHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

pub struct QuotaResetHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl QuotaResetHandle {
    /// Signal the job and wait for the in-flight sweep to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}
