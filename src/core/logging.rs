// src/core/logging.rs
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::timestamp::tick_count;
use crate::ring::RingStats;

// Globale Sequenznummer für Korrelation
static LOG_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct LogContext {
    pub component: String,
    pub instance_id: String,
    pub stream: Option<String>,
    pub sequence: u64,
    pub tick: u32,
}

impl LogContext {
    pub fn new(component: &str, instance_id: &str) -> Self {
        Self {
            component: component.to_string(),
            instance_id: instance_id.to_string(),
            stream: None,
            sequence: LOG_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            tick: tick_count(),
        }
    }

    pub fn with_stream(mut self, stream: &str) -> Self {
        self.stream = Some(stream.to_string());
        self
    }

    pub fn format(&self, level: &str, message: &str) -> String {
        let stream_info = match &self.stream {
            Some(stream) => format!(" stream={}", stream),
            None => String::new(),
        };

        format!(
            "[{}][seq={:06}][{}:{}{}] {}",
            level, self.sequence, self.component, self.instance_id, stream_info, message
        )
    }
}

/// Einheitliches Logging für Codecs, Ringe und Worker.
pub trait ComponentLogger {
    fn log_context(&self) -> LogContext;

    fn trace(&self, message: &str) {
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("{}", self.log_context().format("TRACE", message));
        }
    }

    fn debug(&self, message: &str) {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("{}", self.log_context().format("DEBUG", message));
        }
    }

    fn info(&self, message: &str) {
        log::info!("{}", self.log_context().format("INFO", message));
    }

    fn warn(&self, message: &str) {
        log::warn!("{}", self.log_context().format("WARN", message));
    }

    fn error(&self, message: &str) {
        log::error!("{}", self.log_context().format("ERROR", message));
    }

    fn trace_ring(&self, stats: &RingStats) {
        self.debug(&format!(
            "ring used={}/{} records={} enqueued={} dropped={} dropped_bytes={}",
            stats.used,
            stats.capacity,
            stats.records,
            stats.enqueued,
            stats.dropped,
            stats.dropped_bytes
        ));
    }
}
