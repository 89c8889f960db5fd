use std::sync::atomic::{AtomicU64, Ordering};

/// Per-session counters shared by both pumps.
#[derive(Debug, Default)]
pub struct SessionStats {
    client_frames: AtomicU64,
    client_bytes: AtomicU64,
    upstream_frames: AtomicU64,
    upstream_bytes: AtomicU64,
    raw_forwarded: AtomicU64,
    dropped: AtomicU64,
    introspection_skipped: AtomicU64,
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub client_frames: u64,
    pub client_bytes: u64,
    pub upstream_frames: u64,
    pub upstream_bytes: u64,
    pub raw_forwarded: u64,
    pub dropped: u64,
    pub introspection_skipped: u64,
}

impl SessionStats {
    /// Count a frame received from the browser. Returns its 1-based ordinal.
    pub fn record_client_frame(&self, bytes: usize) -> u64 {
        self.client_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.client_frames.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count a frame received from upstream. Returns its 1-based ordinal.
    pub fn record_upstream_frame(&self, bytes: usize) -> u64 {
        self.upstream_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.upstream_frames.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_raw_forward(&self) {
        self.raw_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_introspection_skip(&self) {
        self.introspection_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            client_frames: self.client_frames.load(Ordering::Relaxed),
            client_bytes: self.client_bytes.load(Ordering::Relaxed),
            upstream_frames: self.upstream_frames.load(Ordering::Relaxed),
            upstream_bytes: self.upstream_bytes.load(Ordering::Relaxed),
            raw_forwarded: self.raw_forwarded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            introspection_skipped: self.introspection_skipped.load(Ordering::Relaxed),
        }
    }
}
