//! Periodic reconciliation of expired sessions.
//!
//! Each tick cancels PENDING and ACTIVE sessions whose expiry has passed
//! (releasing the hosts of ACTIVE ones) and purges expired refresh tokens.
//! This is the only automatic path that frees a host stuck in INUSE.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use imperium_db::repositories::RefreshTokenRepo;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::sessions::SessionCoordinator;

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions_expired: usize,
    pub refresh_tokens_purged: u64,
}

/// Run a single sweep at the current time.
pub async fn sweep(pool: &PgPool, sessions: &SessionCoordinator) -> SweepReport {
    let now = Utc::now();
    let mut report = SweepReport::default();

    match sessions.expire_stale_sessions(now).await {
        Ok(count) => report.sessions_expired = count,
        Err(e) => tracing::error!(error = %e, "Session janitor: session sweep failed"),
    }

    match RefreshTokenRepo::delete_expired(pool, now).await {
        Ok(count) => report.refresh_tokens_purged = count,
        Err(e) => tracing::error!(error = %e, "Session janitor: refresh token purge failed"),
    }

    report
}

/// Run the janitor loop until `cancel` is triggered.
///
/// The first sweep runs immediately on start.
pub async fn run(
    pool: PgPool,
    sessions: Arc<SessionCoordinator>,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Session janitor started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session janitor stopping");
                break;
            }
            _ = ticker.tick() => {
                let report = sweep(&pool, &sessions).await;
                if report == SweepReport::default() {
                    tracing::debug!("Session janitor: nothing to reconcile");
                } else {
                    tracing::info!(
                        sessions_expired = report.sessions_expired,
                        refresh_tokens_purged = report.refresh_tokens_purged,
                        "Session janitor: sweep complete"
                    );
                }
            }
        }
    }
}
