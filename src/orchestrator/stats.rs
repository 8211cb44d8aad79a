//! Counters for translation activity.
//!
//! Each orchestrator owns its own counters, so parallel tests and multiple
//! orchestrators never share state.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    /// Completed `process_file_changes` runs
    runs: AtomicUsize,

    /// Batches executed
    batches: AtomicUsize,

    /// Requests resolved successfully
    successful: AtomicUsize,

    /// Requests that failed after exhausting retries
    failed: AtomicUsize,

    /// Calls made to the provider, retries included
    provider_calls: AtomicUsize,
}

impl StatsCounters {
    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self, successful: usize, failed: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.successful.fetch_add(successful, Ordering::Relaxed);
        self.failed.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn record_provider_call(&self) {
        self.provider_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TranslationStats {
        let successful = self.successful.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let requests = successful + failed;
        let success_rate = if requests > 0 {
            (successful as f64 / requests as f64) * 100.0
        } else {
            0.0
        };

        TranslationStats {
            runs: self.runs.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            requests,
            successful,
            failed,
            provider_calls: self.provider_calls.load(Ordering::Relaxed),
            success_rate,
        }
    }
}

/// Point-in-time view of an orchestrator's counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationStats {
    pub runs: usize,
    pub batches: usize,
    pub requests: usize,
    pub successful: usize,
    pub failed: usize,
    pub provider_calls: usize,

    /// Successful requests as a percentage (0-100)
    pub success_rate: f64,
}
