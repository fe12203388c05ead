use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Cloneable logging handle that also counts requests and errors for the run summary.
#[derive(Clone)]
pub struct Logger {
    start_time: Instant,
    request_count: Arc<AtomicUsize>,
    error_count: Arc<AtomicUsize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats {
    pub requests: usize,
    pub errors: usize,
    pub elapsed_secs: f32,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            request_count: Arc::new(AtomicUsize::new(0)),
            error_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn elapsed(&self) -> f32 {
        self.start_time.elapsed().as_secs_f32()
    }

    pub fn info(&self, message: &str) {
        info!(elapsed_secs = self.elapsed(), "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(elapsed_secs = self.elapsed(), "{}", message);
    }

    pub fn error(&self, message: &str) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        error!(elapsed_secs = self.elapsed(), "{}", message);
    }

    pub fn increment_request(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            requests: self.request_count.load(Ordering::Relaxed),
            errors: self.error_count.load(Ordering::Relaxed),
            elapsed_secs: self.elapsed(),
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}
