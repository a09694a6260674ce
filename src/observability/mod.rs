//! Observability infrastructure for templated mail.
//!
//! Provides send/render counters and an operation timer. Log events go
//! through `tracing`; installing a subscriber is left to the application.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Mail metrics collector.
#[derive(Debug, Default)]
pub struct MailMetrics {
    /// Templates rendered successfully.
    pub templates_rendered: AtomicU64,
    /// Template loads or renders that failed.
    pub render_failures: AtomicU64,
    /// Total emails sent successfully.
    pub emails_sent: AtomicU64,
    /// Total emails failed at the transport.
    pub emails_failed: AtomicU64,
}

impl MailMetrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful render.
    pub fn record_render_success(&self) {
        self.templates_rendered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed render.
    pub fn record_render_failure(&self) {
        self.render_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful email send.
    pub fn record_send_success(&self) {
        self.emails_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed email send.
    pub fn record_send_failure(&self) {
        self.emails_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            templates_rendered: self.templates_rendered.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            emails_sent: self.emails_sent.load(Ordering::Relaxed),
            emails_failed: self.emails_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Templates rendered successfully.
    pub templates_rendered: u64,
    /// Template loads or renders that failed.
    pub render_failures: u64,
    /// Total emails sent successfully.
    pub emails_sent: u64,
    /// Total emails failed at the transport.
    pub emails_failed: u64,
}

impl MetricsSnapshot {
    /// Returns the email success rate.
    pub fn success_rate(&self) -> f64 {
        let total = self.emails_sent + self.emails_failed;
        if total == 0 {
            1.0
        } else {
            self.emails_sent as f64 / total as f64
        }
    }
}

/// Timer for measuring operation duration.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    /// Creates and starts a new timer.
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Stops the timer and returns the duration.
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();

        tracing::debug!(
            timer = %self.name,
            duration_ms = elapsed.as_millis() as u64,
            "Timer stopped"
        );

        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = MailMetrics::new();

        metrics.record_render_success();
        metrics.record_send_success();
        metrics.record_send_success();
        metrics.record_send_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.templates_rendered, 1);
        assert_eq!(snapshot.emails_sent, 2);
        assert_eq!(snapshot.emails_failed, 1);
        assert!((snapshot.success_rate() - 0.666).abs() < 0.01);

        assert_eq!(MailMetrics::new().snapshot().success_rate(), 1.0);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start("render");
        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.stop();
        assert!(duration >= Duration::from_millis(10));
    }
}
