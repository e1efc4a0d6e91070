use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Counters for the write path. Failures there are absorbed, so these are the
/// only signal that the index may be lagging the authoritative store.
#[derive(Debug)]
pub struct SyncStats {
    pub start_time: SystemTime,
    documents_created: AtomicU64,
    full_rebuilds: AtomicU64,
    incremental_patches: AtomicU64,
    documents_deleted: AtomicU64,
    cascades_issued: AtomicU64,
    write_failures: AtomicU64,
    cascade_failures: AtomicU64,
    last_failure: Mutex<Option<FailureRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub operation: String,
    pub entity_type: String,
    pub entity_id: String,
    pub reason: String,
    pub at: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatsSnapshot {
    pub uptime_secs: u64,
    pub documents_created: u64,
    pub full_rebuilds: u64,
    pub incremental_patches: u64,
    pub documents_deleted: u64,
    pub cascades_issued: u64,
    pub write_failures: u64,
    pub cascade_failures: u64,
    pub last_failure: Option<FailureRecord>,
}

impl SyncStatsSnapshot {
    pub fn total_failures(&self) -> u64 {
        self.write_failures + self.cascade_failures
    }
}

impl Default for SyncStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStats {
    pub fn new() -> Self {
        SyncStats {
            start_time: SystemTime::now(),
            documents_created: AtomicU64::new(0),
            full_rebuilds: AtomicU64::new(0),
            incremental_patches: AtomicU64::new(0),
            documents_deleted: AtomicU64::new(0),
            cascades_issued: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            cascade_failures: AtomicU64::new(0),
            last_failure: Mutex::new(None),
        }
    }

    pub fn record_created(&self, count: u64) {
        self.documents_created.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_full_rebuild(&self) {
        self.full_rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_incremental_patch(&self) {
        self.incremental_patches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deleted(&self) {
        self.documents_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cascade(&self) {
        self.cascades_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self, failure: FailureRecord) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
        *self.last_failure.lock() = Some(failure);
    }

    pub fn record_cascade_failure(&self, failure: FailureRecord) {
        self.cascade_failures.fetch_add(1, Ordering::Relaxed);
        *self.last_failure.lock() = Some(failure);
    }

    pub fn snapshot(&self) -> SyncStatsSnapshot {
        SyncStatsSnapshot {
            uptime_secs: self.start_time.elapsed().map(|d| d.as_secs()).unwrap_or(0),
            documents_created: self.documents_created.load(Ordering::Relaxed),
            full_rebuilds: self.full_rebuilds.load(Ordering::Relaxed),
            incremental_patches: self.incremental_patches.load(Ordering::Relaxed),
            documents_deleted: self.documents_deleted.load(Ordering::Relaxed),
            cascades_issued: self.cascades_issued.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            cascade_failures: self.cascade_failures.load(Ordering::Relaxed),
            last_failure: self.last_failure.lock().clone(),
        }
    }
}
