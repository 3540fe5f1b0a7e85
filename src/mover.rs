//! Tier boundary movers.
//!
//! A [`TierMover`] is a background worker bound to one (camera, subcategory,
//! tier boundary) tuple. It loops scan -> evaluate -> act until shutdown:
//! enumerate the file units under its source directory, pick the ones the
//! retention policy says must go, then relocate them to the next tier (or
//! delete them, when the source tier is the last in its chain).
//!
//! Movers for different cameras or boundaries are fully independent tasks
//! and never block one another. Runtime I/O errors are logged and retried
//! on the next throttled cycle; they are never fatal to the process.

use crate::metadata_store::{FileAction, MetadataStore};
use crate::tiers::{Subcategory, Tier};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

/// Minimum spacing between action cycles for one mover. Bounds filesystem
/// load when many cameras and tiers are active.
pub const MOVE_FILES_THROTTLE: Duration = Duration::from_secs(10);

/// How long a notification-driven mover waits before scanning anyway.
/// Filesystem events can be missed; the periodic scan catches stragglers.
const NOTIFY_FALLBACK: Duration = Duration::from_secs(60);

/// I/O failures during a mover cycle
#[derive(Error, Debug)]
pub enum MoverError {
    #[error("Failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A filesystem object under a tier, recomputed on every scan. Never
/// persisted as the source of truth; the filesystem is.
#[derive(Debug, Clone)]
pub struct FileUnit {
    /// Absolute path under the source tier
    pub path: PathBuf,
    /// Path relative to the mover's source directory, preserved on move
    pub rel_path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

impl FileUnit {
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.modified).unwrap_or_default()
    }
}

/// Retention bounds of a source tier, extracted once at mover creation
#[derive(Debug, Clone, Default)]
pub struct RetentionPolicy {
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub min_age: Option<Duration>,
    pub max_age: Option<Duration>,
}

impl RetentionPolicy {
    pub fn from_tier(tier: &Tier) -> Self {
        Self {
            min_size: tier.min_size,
            max_size: tier.max_size,
            min_age: tier.min_age,
            max_age: tier.max_age,
        }
    }
}

/// Pick the units that must leave the tier, oldest first.
///
/// A unit goes when its age exceeds `max_age`, or when the tier's
/// cumulative size exceeds `max_size`. The min thresholds are floors:
/// units younger than `min_age` are exempt from size-based eviction, and
/// size-based eviction stops once the tier is at or below `min_size`
/// (the final eviction may overshoot the floor by one unit). Age-based
/// eviction applies regardless of the size floors. Oldest-first ordering
/// gives FIFO retention fairness within the tier.
pub fn eligible_units(
    units: &[FileUnit],
    policy: &RetentionPolicy,
    now: SystemTime,
) -> Vec<FileUnit> {
    let mut sorted: Vec<&FileUnit> = units.iter().collect();
    sorted.sort_by_key(|u| u.modified);

    let total: u64 = units.iter().map(|u| u.size).sum();
    let floor = policy.min_size.unwrap_or(0);
    let mut remaining = total;

    let mut eligible = Vec::new();
    for unit in sorted {
        let age = unit.age(now);

        let over_age = policy.max_age.is_some_and(|max| age > max);
        let over_size = policy.max_size.is_some_and(|max| remaining > max)
            && remaining > floor
            && policy.min_age.map_or(true, |min| age >= min);

        if over_age || over_size {
            eligible.push(unit.clone());
            remaining = remaining.saturating_sub(unit.size);
        }
    }

    eligible
}

/// Background worker enforcing retention between one source tier and its
/// destination (the next tier, or deletion at the end of the chain)
pub struct TierMover {
    camera: String,
    subcategory: Subcategory,
    source: Tier,
    policy: RetentionPolicy,
    source_dir: PathBuf,
    /// `None` marks a terminal mover: eligible units are deleted
    dest_dir: Option<PathBuf>,
    store: Option<Arc<MetadataStore>>,
    shutdown: CancellationToken,
}

impl TierMover {
    pub fn new(
        camera: impl Into<String>,
        subcategory: Subcategory,
        source: Tier,
        destination: Option<&Tier>,
        store: Option<Arc<MetadataStore>>,
        shutdown: CancellationToken,
    ) -> Self {
        let camera = camera.into();
        let source_dir = subcategory.dir(&source.path, &camera);
        let dest_dir = destination.map(|d| subcategory.dir(&d.path, &camera));
        let policy = RetentionPolicy::from_tier(&source);

        Self {
            camera,
            subcategory,
            source,
            policy,
            source_dir,
            dest_dir,
            store,
            shutdown,
        }
    }

    /// Directory this mover scans
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Worker entry point. Cycles sequentially until the shutdown token
    /// fires, observing it only between cycle phases, never mid-move.
    pub async fn run(self) {
        info!(
            camera = %self.camera,
            subcategory = self.subcategory.as_str(),
            source = %self.source_dir.display(),
            terminal = self.dest_dir.is_none(),
            "Tier mover started"
        );

        if let Err(e) = tokio::fs::create_dir_all(&self.source_dir).await {
            warn!(
                path = %self.source_dir.display(),
                error = %e,
                "Could not create source tier directory"
            );
        }

        // Keep the watcher alive for the task lifetime; dropping it stops
        // event delivery.
        let watcher_parts = if self.source.poll {
            None
        } else {
            match self.start_watcher() {
                Ok(parts) => Some(parts),
                Err(e) => {
                    warn!(
                        path = %self.source_dir.display(),
                        error = %e,
                        "Falling back to polling, watcher could not start"
                    );
                    None
                }
            }
        };
        let (_watcher, mut wake_rx) = match watcher_parts {
            Some((watcher, rx)) => (Some(watcher), Some(rx)),
            None => (None, None),
        };

        let mut next_allowed = Instant::now();
        loop {
            // Throttle: never cycle more often than the minimum spacing,
            // notification-driven or not.
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep_until(next_allowed) => {}
            }

            if let Some(rx) = wake_rx.as_mut() {
                // Wait for a change notification, with a periodic fallback
                // scan so missed events only delay action, never lose it.
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(NOTIFY_FALLBACK) => {}
                    _ = rx.recv() => {
                        // Coalesce the burst that accompanies every write
                        while rx.try_recv().is_ok() {}
                    }
                }
            }

            if self.shutdown.is_cancelled() {
                break;
            }

            if let Err(e) = self.run_cycle(false).await {
                warn!(
                    camera = %self.camera,
                    subcategory = self.subcategory.as_str(),
                    error = %e,
                    "Mover cycle failed, retrying next cycle"
                );
            }
            next_allowed = Instant::now() + MOVE_FILES_THROTTLE;
        }

        if self.source.move_on_shutdown {
            // One final synchronous, unthrottled pass so tiers on volatile
            // storage are drained before the process exits.
            info!(
                camera = %self.camera,
                subcategory = self.subcategory.as_str(),
                "Running final pass before shutdown"
            );
            if let Err(e) = self.run_cycle(true).await {
                error!(
                    camera = %self.camera,
                    subcategory = self.subcategory.as_str(),
                    error = %e,
                    "Final shutdown pass failed, files remain for next startup"
                );
            }
        }

        debug!(
            camera = %self.camera,
            subcategory = self.subcategory.as_str(),
            "Tier mover stopped"
        );
    }

    /// One scan -> evaluate -> act pass. `forced` passes keep going after
    /// the shutdown token fires (used for the move-on-shutdown drain).
    #[instrument(skip(self), fields(camera = %self.camera, subcategory = self.subcategory.as_str()))]
    pub async fn run_cycle(&self, forced: bool) -> Result<(), MoverError> {
        let units = self.scan().await?;
        let eligible = eligible_units(&units, &self.policy, SystemTime::now());

        if eligible.is_empty() {
            trace!(scanned = units.len(), "Nothing to move");
            return Ok(());
        }

        debug!(
            scanned = units.len(),
            eligible = eligible.len(),
            "Acting on eligible units"
        );

        for unit in &eligible {
            // Safe point between units: stop here on shutdown unless this
            // is the forced final pass.
            if !forced && self.shutdown.is_cancelled() {
                break;
            }

            let result = match &self.dest_dir {
                Some(dest_dir) => self.move_unit(unit, dest_dir).await,
                None => self.delete_unit(unit).await,
            };

            match result {
                Ok(action) => self.record_action(unit, action).await,
                Err(e) => {
                    // The unit stays valid at its source; next cycle retries
                    metrics::counter!("tierstore.move_failures").increment(1);
                    warn!(error = %e, "Failed to act on file unit");
                }
            }
        }

        Ok(())
    }

    /// Enumerate file units currently under the source directory
    async fn scan(&self) -> Result<Vec<FileUnit>, MoverError> {
        let mut units = Vec::new();
        let mut pending = vec![self.source_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // The directory appears once the camera writes its first
                // file; nothing to do until then.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(MoverError::Scan {
                        path: dir,
                        source: e,
                    })
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        return Err(MoverError::Scan {
                            path: dir.clone(),
                            source: e,
                        })
                    }
                };

                let path = entry.path();
                let metadata = match entry.metadata().await {
                    Ok(metadata) => metadata,
                    // Raced with a concurrent delete; skip it
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => {
                        return Err(MoverError::Scan { path, source: e });
                    }
                };

                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }

                let rel_path = path
                    .strip_prefix(&self.source_dir)
                    .unwrap_or(&path)
                    .to_path_buf();
                units.push(FileUnit {
                    path,
                    rel_path,
                    size: metadata.len(),
                    modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                });
            }
        }

        Ok(units)
    }

    /// Relocate a unit to the destination tier, preserving its path
    /// relative to the source directory. All-or-nothing: a failed copy
    /// leaves the source untouched and removes any partial destination.
    async fn move_unit(&self, unit: &FileUnit, dest_dir: &Path) -> Result<FileAction, MoverError> {
        let dest_path = dest_dir.join(&unit.rel_path);

        let io_err = |e| MoverError::Move {
            from: unit.path.clone(),
            to: dest_path.clone(),
            source: e,
        };

        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        // Same-filesystem fast path
        match tokio::fs::rename(&unit.path, &dest_path).await {
            Ok(()) => {}
            Err(_) => {
                // Cross-device: copy, then unlink the source. A failed copy
                // must not leave a half-written destination behind.
                if let Err(e) = tokio::fs::copy(&unit.path, &dest_path).await {
                    let _ = tokio::fs::remove_file(&dest_path).await;
                    return Err(io_err(e));
                }
                tokio::fs::remove_file(&unit.path).await.map_err(io_err)?;
            }
        }

        metrics::counter!("tierstore.files.moved").increment(1);
        debug!(
            from = %unit.path.display(),
            to = %dest_path.display(),
            size = unit.size,
            "Moved file to next tier"
        );

        Ok(FileAction::Move)
    }

    /// Terminal tier: eviction means deletion
    async fn delete_unit(&self, unit: &FileUnit) -> Result<FileAction, MoverError> {
        tokio::fs::remove_file(&unit.path)
            .await
            .map_err(|e| MoverError::Delete {
                path: unit.path.clone(),
                source: e,
            })?;

        metrics::counter!("tierstore.files.deleted").increment(1);
        debug!(path = %unit.path.display(), size = unit.size, "Deleted expired file");

        Ok(FileAction::Delete)
    }

    /// Best-effort bookkeeping; the filesystem already reflects the action
    async fn record_action(&self, unit: &FileUnit, action: FileAction) {
        let Some(store) = &self.store else {
            return;
        };

        let result = store
            .record_file_action(
                &self.camera,
                self.subcategory.category().as_str(),
                self.subcategory.as_str(),
                &self.source.path.to_string_lossy(),
                &unit.rel_path.to_string_lossy(),
                unit.size as i64,
                action,
            )
            .await;

        if let Err(e) = result {
            warn!(error = %e, "Failed to record file action in metadata store");
        }
    }

    /// Bridge filesystem change events into the mover task
    fn start_watcher(
        &self,
    ) -> notify::Result<(RecommendedWatcher, mpsc::UnboundedReceiver<()>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                if res.is_ok() {
                    let _ = tx.send(());
                }
            })?;
        watcher.watch(&self.source_dir, RecursiveMode::Recursive)?;

        Ok((watcher, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unit(name: &str, size: u64, age: Duration, now: SystemTime) -> FileUnit {
        FileUnit {
            path: PathBuf::from("/src").join(name),
            rel_path: PathBuf::from(name),
            size,
            modified: now - age,
        }
    }

    fn hours(h: u64) -> Duration {
        Duration::from_secs(h * 3600)
    }

    #[test]
    fn test_over_age_unit_is_eligible() {
        let now = SystemTime::now();
        let units = vec![unit("old.mp4", 10, hours(2), now), unit("new.mp4", 10, hours(0), now)];
        let policy = RetentionPolicy {
            max_age: Some(hours(1)),
            ..Default::default()
        };

        let eligible = eligible_units(&units, &policy, now);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].rel_path, PathBuf::from("old.mp4"));
    }

    #[test]
    fn test_unbounded_policy_keeps_everything() {
        let now = SystemTime::now();
        let units = vec![unit("a", 10, hours(1000), now)];
        assert!(eligible_units(&units, &RetentionPolicy::default(), now).is_empty());
    }

    #[test]
    fn test_size_eviction_is_oldest_first() {
        let now = SystemTime::now();
        let units = vec![
            unit("newest", 40, hours(1), now),
            unit("oldest", 40, hours(3), now),
            unit("middle", 40, hours(2), now),
        ];
        let policy = RetentionPolicy {
            max_size: Some(100),
            ..Default::default()
        };

        // 120 bytes total, 100 allowed: only the oldest must go
        let eligible = eligible_units(&units, &policy, now);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].rel_path, PathBuf::from("oldest"));
    }

    #[test]
    fn test_min_age_exempts_from_size_eviction() {
        let now = SystemTime::now();
        let units = vec![
            unit("young_big", 100, hours(1), now),
            unit("old_small", 10, hours(10), now),
        ];
        let policy = RetentionPolicy {
            max_size: Some(50),
            min_age: Some(hours(2)),
            ..Default::default()
        };

        // Only the old file may be evicted for size, even though evicting
        // the young one would relieve the pressure faster.
        let eligible = eligible_units(&units, &policy, now);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].rel_path, PathBuf::from("old_small"));
    }

    #[test]
    fn test_min_size_floor_blocks_size_eviction() {
        let now = SystemTime::now();
        let units = vec![unit("a", 30, hours(2), now)];
        let policy = RetentionPolicy {
            // Misconfigured max below min: the floor wins
            max_size: Some(20),
            min_size: Some(100),
            ..Default::default()
        };

        assert!(eligible_units(&units, &policy, now).is_empty());
    }

    #[test]
    fn test_size_eviction_stops_at_floor_after_overshoot() {
        let now = SystemTime::now();
        let units = vec![unit("a", 60, hours(2), now), unit("b", 60, hours(1), now)];
        let policy = RetentionPolicy {
            max_size: Some(100),
            min_size: Some(80),
            ..Default::default()
        };

        // Evicting the oldest unit lands at 60, below the 80 byte floor;
        // no further unit is evicted for size.
        let eligible = eligible_units(&units, &policy, now);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].rel_path, PathBuf::from("a"));
    }

    #[test]
    fn test_age_eviction_ignores_min_size_floor() {
        let now = SystemTime::now();
        let units = vec![unit("a", 30, hours(2), now)];
        let policy = RetentionPolicy {
            max_age: Some(hours(1)),
            min_size: Some(100),
            ..Default::default()
        };

        let eligible = eligible_units(&units, &policy, now);
        assert_eq!(eligible.len(), 1);
    }

    #[test]
    fn test_size_eviction_stops_at_max() {
        let now = SystemTime::now();
        let units = vec![
            unit("a", 50, hours(4), now),
            unit("b", 50, hours(3), now),
            unit("c", 50, hours(2), now),
            unit("d", 50, hours(1), now),
        ];
        let policy = RetentionPolicy {
            max_size: Some(110),
            ..Default::default()
        };

        // 200 total, 110 allowed: two oldest bring it to 100
        let eligible = eligible_units(&units, &policy, now);
        let names: Vec<_> = eligible.iter().map(|u| u.rel_path.clone()).collect();
        assert_eq!(names, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }

    fn tier(path: &Path, max_size: Option<u64>) -> Tier {
        Tier {
            path: path.to_path_buf(),
            poll: true,
            move_on_shutdown: false,
            min_size: None,
            max_size,
            min_age: None,
            max_age: None,
        }
    }

    async fn write_file(dir: &Path, rel: &str, len: usize) {
        let path = dir.join(rel);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, vec![0u8; len]).await.unwrap();
    }

    #[tokio::test]
    async fn test_cycle_moves_files_preserving_structure() {
        let source_root = TempDir::new().unwrap();
        let dest_root = TempDir::new().unwrap();

        let source = tier(source_root.path(), Some(10));
        let dest = tier(dest_root.path(), None);
        let mover = TierMover::new(
            "cam1",
            Subcategory::Segments,
            source,
            Some(&dest),
            None,
            CancellationToken::new(),
        );

        // 40 bytes against a 10 byte cap: both files must move
        write_file(mover.source_dir(), "2024-01-01/a.mp4", 20).await;
        write_file(mover.source_dir(), "2024-01-01/b.mp4", 20).await;

        mover.run_cycle(false).await.unwrap();

        let moved = dest_root
            .path()
            .join("segments/cam1/2024-01-01/a.mp4");
        assert!(tokio::fs::metadata(&moved).await.is_ok());
        assert!(tokio::fs::metadata(mover.source_dir().join("2024-01-01/a.mp4"))
            .await
            .is_err());
        assert!(tokio::fs::metadata(mover.source_dir().join("2024-01-01/b.mp4"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_terminal_mover_deletes() {
        let source_root = TempDir::new().unwrap();
        let source = tier(source_root.path(), Some(10));
        let mover = TierMover::new(
            "cam1",
            Subcategory::Recordings,
            source,
            None,
            None,
            CancellationToken::new(),
        );

        write_file(mover.source_dir(), "clip.mp4", 100).await;
        mover.run_cycle(false).await.unwrap();

        assert!(tokio::fs::metadata(mover.source_dir().join("clip.mp4"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_failed_move_leaves_source_intact() {
        let source_root = TempDir::new().unwrap();
        let dest_root = TempDir::new().unwrap();

        let source = tier(source_root.path(), Some(10));
        let dest = tier(dest_root.path(), None);
        let mover = TierMover::new(
            "cam1",
            Subcategory::Segments,
            source,
            Some(&dest),
            None,
            CancellationToken::new(),
        );

        write_file(mover.source_dir(), "a.mp4", 100).await;

        // Occupy the destination file path with a directory so both the
        // rename and the copy fail.
        let blocked = dest_root.path().join("segments/cam1/a.mp4");
        tokio::fs::create_dir_all(&blocked).await.unwrap();

        // The cycle itself succeeds; the per-unit failure is contained
        mover.run_cycle(false).await.unwrap();

        let metadata = tokio::fs::metadata(mover.source_dir().join("a.mp4"))
            .await
            .unwrap();
        assert_eq!(metadata.len(), 100);
    }

    #[tokio::test]
    async fn test_scan_on_missing_directory_is_empty() {
        let source_root = TempDir::new().unwrap();
        let source = tier(&source_root.path().join("never_created"), None);
        let mover = TierMover::new(
            "cam1",
            Subcategory::ObjectDetection,
            source,
            None,
            None,
            CancellationToken::new(),
        );

        assert!(mover.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bookkeeping_records_actions() {
        use crate::config::DatabaseConfig;

        let store = Arc::new(
            MetadataStore::new(&DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
                connect_timeout_secs: 5,
            })
            .await
            .unwrap(),
        );
        store.bootstrap().await.unwrap();

        let source_root = TempDir::new().unwrap();
        let source = tier(source_root.path(), Some(1));
        let mover = TierMover::new(
            "cam1",
            Subcategory::Recordings,
            source,
            None,
            Some(store.clone()),
            CancellationToken::new(),
        );

        write_file(mover.source_dir(), "clip.mp4", 50).await;
        mover.run_cycle(false).await.unwrap();

        let records = store.camera_file_actions("cam1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "delete");
        assert_eq!(records[0].rel_path, "clip.mp4");
    }

    #[tokio::test]
    async fn test_independent_movers_do_not_block() {
        let root_a = TempDir::new().unwrap();
        let root_b = TempDir::new().unwrap();

        let mover_a = TierMover::new(
            "cam_a",
            Subcategory::Segments,
            tier(root_a.path(), Some(1)),
            None,
            None,
            CancellationToken::new(),
        );
        let mover_b = TierMover::new(
            "cam_b",
            Subcategory::Segments,
            tier(root_b.path(), Some(1)),
            None,
            None,
            CancellationToken::new(),
        );

        write_file(mover_a.source_dir(), "a.mp4", 100).await;
        write_file(mover_b.source_dir(), "b.mp4", 100).await;

        let (ra, rb) = tokio::join!(mover_a.run_cycle(false), mover_b.run_cycle(false));
        ra.unwrap();
        rb.unwrap();

        assert!(mover_a.scan().await.unwrap().is_empty());
        assert!(mover_b.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_move_on_shutdown_runs_final_pass() {
        let source_root = TempDir::new().unwrap();
        let dest_root = TempDir::new().unwrap();

        let mut source = tier(source_root.path(), Some(10));
        source.move_on_shutdown = true;
        let dest = tier(dest_root.path(), None);

        let token = CancellationToken::new();
        let mover = TierMover::new(
            "cam1",
            Subcategory::Segments,
            source,
            Some(&dest),
            None,
            token.clone(),
        );

        write_file(mover.source_dir(), "a.mp4", 100).await;

        // Already-cancelled token: run() must still drain the tier once
        token.cancel();
        mover.run().await;

        let moved = dest_root.path().join("segments/cam1/a.mp4");
        assert!(tokio::fs::metadata(&moved).await.is_ok());
    }

    #[tokio::test]
    async fn test_stop_without_final_pass_leaves_files() {
        let source_root = TempDir::new().unwrap();

        let token = CancellationToken::new();
        let mover = TierMover::new(
            "cam1",
            Subcategory::Segments,
            tier(source_root.path(), Some(1)),
            None,
            None,
            token.clone(),
        );
        let source_dir = mover.source_dir().to_path_buf();

        write_file(&source_dir, "a.mp4", 100).await;

        token.cancel();
        mover.run().await;

        // move_on_shutdown is unset: the file waits for the next startup
        let metadata = tokio::fs::metadata(source_dir.join("a.mp4")).await.unwrap();
        assert_eq!(metadata.len(), 100);
    }
}
