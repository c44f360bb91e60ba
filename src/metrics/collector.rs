//! Metrics collection and registry.

use crate::admin::SessionModeCoordinator;
use crate::capture::CaptureDevice;
use crate::recognition::RecognitionStats;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("metrics server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome label values, in the order they are exported.
const OUTCOMES: [&str; 6] = [
    "recognized",
    "not_recognized",
    "no_face",
    "capture_failed",
    "failed",
    "discarded",
];

/// A snapshot of kiosk state for a metrics update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Recognition attempts that got past the single-flight check.
    pub attempts: u64,
    pub recognized: u64,
    pub not_recognized: u64,
    pub no_face: u64,
    pub capture_failures: u64,
    pub failures: u64,
    /// Triggers dropped because another attempt was in flight.
    pub dropped: u64,
    /// Results discarded because the device session changed.
    pub discarded: u64,
    /// Whether the recognition device currently holds a session.
    pub device_active: bool,
    /// Successful enrollments.
    pub enrollments: u64,
}

impl MetricsSnapshot {
    /// Creates a snapshot from the recognition totals, the normal device
    /// and the enrollment count.
    pub fn from_components(
        stats: &RecognitionStats,
        device: &CaptureDevice,
        enrollments: u64,
    ) -> Self {
        Self {
            attempts: stats.attempts,
            recognized: stats.recognized,
            not_recognized: stats.not_recognized,
            no_face: stats.no_face,
            capture_failures: stats.capture_failures,
            failures: stats.failures,
            dropped: stats.dropped,
            discarded: stats.discarded,
            device_active: device.is_running(),
            enrollments,
        }
    }

    /// Snapshot of a whole kiosk: the recognition side plus the live
    /// enrollment count.
    pub fn from_kiosk(kiosk: &SessionModeCoordinator) -> Self {
        let recognition = kiosk.recognition();
        Self::from_components(
            &recognition.stats(),
            recognition.device(),
            kiosk.enrollment().enrolled_count(),
        )
    }

    fn outcome_counts(&self) -> [u64; 6] {
        [
            self.recognized,
            self.not_recognized,
            self.no_face,
            self.capture_failures,
            self.failures,
            self.discarded,
        ]
    }
}

/// Prometheus metrics registry for the kiosk.
pub struct MetricsRegistry {
    registry: Registry,

    attempts_total: IntCounter,
    outcomes_total: IntCounterVec,
    dropped_total: IntCounter,
    device_active: IntGauge,
    enrollments_total: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new registry with all kiosk metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let attempts_total = IntCounter::new(
            "face_kiosk_recognition_attempts_total",
            "Recognition attempts started",
        )?;
        let outcomes_total = IntCounterVec::new(
            Opts::new(
                "face_kiosk_recognition_outcomes_total",
                "Recognition attempts by outcome",
            ),
            &["outcome"],
        )?;
        let dropped_total = IntCounter::new(
            "face_kiosk_recognition_dropped_total",
            "Triggers dropped while another recognition was in flight",
        )?;
        let device_active = IntGauge::new(
            "face_kiosk_device_active",
            "Recognition camera state (1=active, 0=stopped)",
        )?;
        let enrollments_total = IntCounter::new(
            "face_kiosk_enrollments_total",
            "Users enrolled successfully",
        )?;

        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(outcomes_total.clone()))?;
        registry.register(Box::new(dropped_total.clone()))?;
        registry.register(Box::new(device_active.clone()))?;
        registry.register(Box::new(enrollments_total.clone()))?;

        // Export every outcome from the start, not only once it occurs.
        for outcome in OUTCOMES {
            outcomes_total.with_label_values(&[outcome]);
        }

        Ok(Self {
            registry,
            attempts_total,
            outcomes_total,
            dropped_total,
            device_active,
            enrollments_total,
        })
    }

    /// Updates all metrics from a snapshot.
    ///
    /// Snapshot totals are monotonic, so counters advance by the difference.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        advance(&self.attempts_total, snapshot.attempts);
        advance(&self.dropped_total, snapshot.dropped);
        advance(&self.enrollments_total, snapshot.enrollments);

        for (outcome, total) in OUTCOMES.iter().zip(snapshot.outcome_counts()) {
            advance(&self.outcomes_total.with_label_values(&[*outcome]), total);
        }

        self.device_active.set(i64::from(snapshot.device_active));
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}
