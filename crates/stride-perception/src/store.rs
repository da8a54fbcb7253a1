//! [`SnapshotStore`] – last-write-wins holder of the latest [`StateSnapshot`].
//!
//! Publication swaps an `Arc` through [`ArcSwapOption`], so readers never see
//! a partially written snapshot and never block the writer.  A reader that
//! still holds an older `Arc` keeps it alive until it is dropped.
//!
//! The store has a single writer (the telemetry ingest that owns it).  Other
//! components receive a [`SnapshotReader`], which exposes only the read path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use stride_types::StateSnapshot;

#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: ArcSwapOption<StateSnapshot>,
    publications: AtomicU64,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot.
    pub fn publish(&self, snapshot: StateSnapshot) {
        self.current.store(Some(Arc::new(snapshot)));
        self.publications.fetch_add(1, Ordering::Relaxed);
    }

    /// The latest snapshot, or `None` if nothing has been published yet.
    pub fn current(&self) -> Option<Arc<StateSnapshot>> {
        self.current.load_full()
    }

    /// Age of the current snapshot relative to `now`.
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.current().map(|s| s.age(now))
    }

    /// Total number of snapshots published since creation.
    pub fn publications(&self) -> u64 {
        self.publications.load(Ordering::Relaxed)
    }

    /// Create a read-only handle sharing this store.
    pub fn reader(self: &Arc<Self>) -> SnapshotReader {
        SnapshotReader {
            store: Arc::clone(self),
        }
    }
}

/// Read-only, cheaply clonable view of a [`SnapshotStore`].
///
/// Successive calls to [`current`][Self::current] may return different
/// snapshots, or `None` if the store has never been written.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    store: Arc<SnapshotStore>,
}

impl SnapshotReader {
    pub fn current(&self) -> Option<Arc<StateSnapshot>> {
        self.store.current()
    }

    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.store.age(now)
    }

    pub fn publications(&self) -> u64 {
        self.store.publications()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use stride_types::{Orientation, Vec3};

    /// Every field encodes the same sequence number so a torn read would be
    /// detectable.
    fn numbered(n: u64) -> StateSnapshot {
        let v = n as f64;
        StateSnapshot {
            position: Vec3::new(v, v, v),
            velocity: Vec3::new(v, v, v),
            orientation: Orientation::new(v, v, v),
            angular_velocity: Vec3::new(v, v, v),
            acceleration: Vec3::new(v, v, v),
            foot_forces: [v; 4],
            body_height: v,
            mode: n as i32,
            progress: v,
            error_code: None,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn empty_store_returns_none() {
        let store = SnapshotStore::new();
        assert!(store.current().is_none());
        assert!(store.age(Instant::now()).is_none());
        assert_eq!(store.publications(), 0);
    }

    #[test]
    fn current_returns_latest_publication() {
        let store = SnapshotStore::new();
        store.publish(numbered(1));
        store.publish(numbered(2));
        let snap = store.current().expect("published");
        assert_eq!(snap.mode, 2);
        assert_eq!(store.publications(), 2);
    }

    #[test]
    fn held_snapshot_survives_replacement() {
        let store = SnapshotStore::new();
        store.publish(numbered(1));
        let held = store.current().expect("published");
        store.publish(numbered(2));
        assert_eq!(held.mode, 1);
        assert_eq!(store.current().expect("published").mode, 2);
    }

    #[test]
    fn age_is_relative_to_caller_now() {
        let store = SnapshotStore::new();
        let snap = numbered(1);
        let stamped = snap.timestamp;
        store.publish(snap);
        let age = store.age(stamped + Duration::from_millis(250)).expect("published");
        assert_eq!(age, Duration::from_millis(250));
    }

    #[test]
    fn reader_sees_writer_updates() {
        let store = Arc::new(SnapshotStore::new());
        let reader = store.reader();
        assert!(reader.current().is_none());
        store.publish(numbered(5));
        assert_eq!(reader.current().expect("published").mode, 5);
        assert_eq!(reader.publications(), 1);
    }

    #[test]
    fn concurrent_reads_are_never_torn() {
        const WRITES: u64 = 20_000;
        let store = Arc::new(SnapshotStore::new());

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for n in 1..=WRITES {
                    store.publish(numbered(n));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reader = store.reader();
                thread::spawn(move || {
                    let mut last_seen = 0u64;
                    for _ in 0..WRITES {
                        if let Some(snap) = reader.current() {
                            let n = snap.mode as u64;
                            let v = n as f64;
                            assert_eq!(snap.body_height, v);
                            assert_eq!(snap.position, Vec3::new(v, v, v));
                            assert_eq!(snap.foot_forces, [v; 4]);
                            assert_eq!(snap.progress, v);
                            assert!(n >= last_seen, "snapshots went backwards");
                            last_seen = n;
                        }
                    }
                })
            })
            .collect();

        writer.join().expect("writer panicked");
        for r in readers {
            r.join().expect("reader panicked");
        }
        assert_eq!(store.current().expect("published").mode as u64, WRITES);
    }
}
