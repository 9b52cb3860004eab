//! Protocol counters
//!
//! The runtime counts every frame it processes. The counters are shared with
//! the protocol diagnostics emitter's collector, which reads them only while
//! someone listens.

use hostlink_core::diagnostics::Diagnostics;
use hostlink_core::FrameReport;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters of one runtime
#[derive(Debug, Default)]
pub struct ProtocolStats {
    frames_in: AtomicU64,
    frames_out: AtomicU64,
    commands_handled: AtomicU64,
    commands_dropped: AtomicU64,
    dangling_references: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
}

/// Point-in-time copy of [`ProtocolStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames_in: u64,
    pub frames_out: u64,
    pub commands_handled: u64,
    pub commands_dropped: u64,
    pub dangling_references: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl ProtocolStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_inbound(&self, frame_len: usize, report: &FrameReport) {
        self.frames_in.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(frame_len as u64, Ordering::Relaxed);
        self.commands_handled
            .fetch_add(report.handled as u64, Ordering::Relaxed);
        self.commands_dropped
            .fetch_add(report.dropped as u64, Ordering::Relaxed);
        self.dangling_references
            .fetch_add(report.dangling as u64, Ordering::Relaxed);
    }

    pub fn record_outbound(&self, frame_len: usize) {
        self.frames_out.fetch_add(1, Ordering::Relaxed);
        self.bytes_out.fetch_add(frame_len as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_out: self.frames_out.load(Ordering::Relaxed),
            commands_handled: self.commands_handled.load(Ordering::Relaxed),
            commands_dropped: self.commands_dropped.load(Ordering::Relaxed),
            dangling_references: self.dangling_references.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Diagnostics payload with one key per counter
    pub fn to_diagnostics(&self) -> Diagnostics {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Diagnostics::new(),
        }
    }
}

/// Collector that reports the counters whenever they changed since its last run
pub fn stats_collector(
    stats: std::sync::Arc<ProtocolStats>,
) -> impl FnMut() -> Option<Diagnostics> + Send + 'static {
    let mut last: Option<StatsSnapshot> = None;
    move || {
        let snapshot = stats.snapshot();
        if last == Some(snapshot) {
            return None;
        }
        last = Some(snapshot);
        Some(snapshot.to_diagnostics())
    }
}
