//! Scheduled cleanup of expired revocation entries.

use crate::db::Database;
use std::time::Duration;
use tracing::{error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once. Returns the number of entries removed.
pub async fn run_cleanup(db: &Database) -> u64 {
    // A revoked token past its own expiry is rejected on expiry alone
    match db.revocations().delete_expired().await {
        Ok(count) if count > 0 => {
            info!("Cleaned up {} expired revocation entries", count);
            count
        }
        Ok(_) => 0,
        Err(e) => {
            error!("Failed to clean up revocation entries: {}", e);
            0
        }
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        // The first tick completes immediately; startup already ran a sweep
        interval.tick().await;

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}
