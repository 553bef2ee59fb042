//! Periodic refresh and backup loops.
//!
//! Three long-lived tokio tasks: lesson refresh, group roster refresh,
//! and automatic backup. Each loop sleeps for its configured interval
//! between iterations and observes the shutdown channel at the sleep
//! boundary. Cycle-level failures are logged and the cycle is skipped,
//! leaving the previous table contents in place; refresh fetches before
//! it mutates, so a failed fetch never empties a table.

use crate::backup::BackupManager;
use crate::config::AppConfig;
use crate::error::SyncError;
use crate::store::ScheduleStore;
use crate::upstream::{self, UpstreamClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Counts for one completed lesson refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshStats {
    pub inserted: usize,
    pub skipped: usize,
}

/// Spawns the three background loops. The lesson and group loops run
/// their first cycle immediately; the backup loop sleeps first, so it
/// never snapshots a store the refresh loops have not touched yet.
pub fn spawn_loops(
    store: Arc<ScheduleStore>,
    upstream: Arc<UpstreamClient>,
    backup: Arc<BackupManager>,
    config: &AppConfig,
    shutdown: watch::Receiver<()>,
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(lesson_loop(
            store.clone(),
            upstream.clone(),
            Duration::from_secs(config.rasp_update_interval),
            shutdown.clone(),
        )),
        tokio::spawn(group_loop(
            store.clone(),
            upstream,
            Duration::from_secs(config.groups_update_interval),
            shutdown.clone(),
        )),
        tokio::spawn(backup_loop(
            store,
            backup,
            Duration::from_secs(config.auto_backup_interval),
            shutdown,
        )),
    ]
}

async fn lesson_loop(
    store: Arc<ScheduleStore>,
    upstream: Arc<UpstreamClient>,
    interval: Duration,
    mut shutdown: watch::Receiver<()>,
) {
    loop {
        match refresh_lessons(&store, &upstream).await {
            Ok(stats) => info!(
                inserted = stats.inserted,
                skipped = stats.skipped,
                "Lesson refresh complete"
            ),
            Err(e) => warn!(error = %e, "Lesson refresh failed, keeping previous table"),
        }
        if sleep_or_shutdown(interval, &mut shutdown).await {
            info!("Lesson refresh loop shutting down");
            return;
        }
    }
}

async fn group_loop(
    store: Arc<ScheduleStore>,
    upstream: Arc<UpstreamClient>,
    interval: Duration,
    mut shutdown: watch::Receiver<()>,
) {
    loop {
        match refresh_groups(&store, &upstream).await {
            Ok(count) => info!(groups = count, "Group refresh complete"),
            Err(e) => warn!(error = %e, "Group refresh failed, keeping previous table"),
        }
        if sleep_or_shutdown(interval, &mut shutdown).await {
            info!("Group refresh loop shutting down");
            return;
        }
    }
}

async fn backup_loop(
    store: Arc<ScheduleStore>,
    backup: Arc<BackupManager>,
    interval: Duration,
    mut shutdown: watch::Receiver<()>,
) {
    loop {
        if sleep_or_shutdown(interval, &mut shutdown).await {
            info!("Backup loop shutting down");
            return;
        }
        match backup.save(&store) {
            Ok(name) => info!(snapshot = %name, "Automatic backup complete"),
            Err(e) => warn!(error = %e, "Automatic backup failed"),
        }
    }
}

/// Sleeps for the interval; returns true if shutdown was signalled.
async fn sleep_or_shutdown(interval: Duration, shutdown: &mut watch::Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(interval) => false,
        _ = shutdown.changed() => true,
    }
}

/// One lesson refresh cycle: fetch the full listing, extract rows with
/// per-row failure isolation, then atomically replace the table.
pub async fn refresh_lessons(
    store: &ScheduleStore,
    upstream: &UpstreamClient,
) -> Result<RefreshStats, SyncError> {
    let entries = upstream.fetch_schedule().await?;
    let (lessons, skipped) = extract_valid_lessons(&entries);

    store.replace_lessons(&lessons)?;
    Ok(RefreshStats {
        inserted: lessons.len(),
        skipped,
    })
}

/// Extracts every well-formed lesson from a schedule listing, logging
/// and counting malformed entries. One bad entry never aborts a cycle.
fn extract_valid_lessons(entries: &[serde_json::Value]) -> (Vec<crate::store::LessonRow>, usize) {
    let mut lessons = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for entry in entries {
        match upstream::extract_lesson(entry) {
            Ok(lesson) => lessons.push(lesson),
            Err(e) => {
                skipped += 1;
                warn!(
                    entry = %upstream::entry_id(entry),
                    error = %e,
                    "Skipping malformed schedule entry"
                );
            }
        }
    }
    (lessons, skipped)
}

/// One group refresh cycle: discover the group IDs referenced by the
/// latest schedule, fan out roster fetches, then atomically replace the
/// table. Any fetch failure skips the whole cycle.
pub async fn refresh_groups(
    store: &ScheduleStore,
    upstream: &UpstreamClient,
) -> Result<usize, SyncError> {
    let entries = upstream.fetch_schedule().await?;
    let group_ids = upstream::collect_group_ids(&entries);
    let rosters = upstream.fetch_rosters(&group_ids).await?;

    store.replace_groups(&rosters)?;
    Ok(rosters.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_one_malformed_entry_does_not_abort_extraction() {
        let entries = vec![
            json!({
                "name": "Math",
                "start": "2024-05-01T09:00:00+03:00",
                "end": "2024-05-01T10:30:00+03:00",
                "info": {
                    "raspItemID": 1,
                    "aud": "a101",
                    "teachersNames": "",
                    "groups": [{"groupID": 1062}]
                }
            }),
            json!({"name": "missing everything else"}),
            json!({
                "name": "Physics",
                "start": "2024-05-01T11:00:00+03:00",
                "end": "2024-05-01T12:30:00+03:00",
                "info": {
                    "raspItemID": 2,
                    "aud": "b202",
                    "teachersNames": "Petrov I. I.",
                    "groups": [{"groupID": 1063}]
                }
            }),
        ];

        let (lessons, skipped) = extract_valid_lessons(&entries);
        assert_eq!(skipped, 1);
        assert_eq!(lessons.len(), 2);
        assert_eq!(lessons[0].name, "Math");
        assert_eq!(lessons[1].name, "Physics");
    }
}
