// src/pipeline.rs
//
// Per-frame wiring: Tracker → Abandonment + Anomaly, in that order.
// The tracked-object list produced by the tracker is handed read-only
// to both detectors; each detector owns its keyed state exclusively.

use crate::abandonment::AbandonmentDetector;
use crate::anomaly::AnomalyDetector;
use crate::tracker::ObjectTracker;
use crate::types::{Alert, AlertType, Config, Detection, TrackedObject};
use std::time::Instant;
use tracing::debug;

/// Everything one frame produces for the caller: the confirmed track
/// snapshots and any alerts raised by either detector.
#[derive(Debug)]
pub struct FrameOutput {
    pub tracked_objects: Vec<TrackedObject>,
    pub alerts: Vec<Alert>,
}

pub struct SurveillancePipeline {
    tracker: ObjectTracker,
    abandonment: AbandonmentDetector,
    anomaly: AnomalyDetector,
    metrics: PipelineMetrics,
}

impl SurveillancePipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            tracker: ObjectTracker::new(config.tracker.clone()),
            abandonment: AbandonmentDetector::new(config.abandonment.clone()),
            anomaly: AnomalyDetector::new(config.anomaly.clone()),
            metrics: PipelineMetrics::new(),
        }
    }

    /// Process one frame. `now` is the frame timestamp in seconds since
    /// epoch; calls must arrive in frame order.
    pub fn process_frame(&mut self, detections: &[Detection], now: f64) -> FrameOutput {
        let tracked_objects = self.tracker.update(detections, now);

        let mut alerts = self.abandonment.update(&tracked_objects, now);
        alerts.extend(self.anomaly.update(&tracked_objects, now));

        self.metrics.record_frame(&tracked_objects, &alerts);
        debug!(
            "Frame {}: {} detections, {} confirmed tracks, {} alerts",
            self.tracker.frame_count(),
            detections.len(),
            tracked_objects.len(),
            alerts.len()
        );

        FrameOutput {
            tracked_objects,
            alerts,
        }
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn tracker(&self) -> &ObjectTracker {
        &self.tracker
    }

    pub fn abandonment(&self) -> &AbandonmentDetector {
        &self.abandonment
    }

    pub fn anomaly(&self) -> &AnomalyDetector {
        &self.anomaly
    }

    /// Clear all per-session state (between captures).
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.abandonment.reset();
        self.anomaly.reset();
        self.metrics = PipelineMetrics::new();
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Run counters for one session. Plain fields: the pipeline is
/// single-threaded frame-sequential, nothing else reads these live.
#[derive(Debug)]
pub struct PipelineMetrics {
    pub total_frames: u64,
    pub frames_with_tracks: u64,
    pub peak_confirmed_tracks: usize,
    pub abandoned_object_alerts: u64,
    pub speed_spike_alerts: u64,
    pub loitering_alerts: u64,
    pub counterflow_alerts: u64,
    started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: 0,
            frames_with_tracks: 0,
            peak_confirmed_tracks: 0,
            abandoned_object_alerts: 0,
            speed_spike_alerts: 0,
            loitering_alerts: 0,
            counterflow_alerts: 0,
            started_at: Instant::now(),
        }
    }

    fn record_frame(&mut self, tracked: &[TrackedObject], alerts: &[Alert]) {
        self.total_frames += 1;
        if !tracked.is_empty() {
            self.frames_with_tracks += 1;
        }
        self.peak_confirmed_tracks = self.peak_confirmed_tracks.max(tracked.len());
        for alert in alerts {
            match alert.alert_type {
                AlertType::AbandonedObject => self.abandoned_object_alerts += 1,
                AlertType::SpeedSpike => self.speed_spike_alerts += 1,
                AlertType::Loitering => self.loitering_alerts += 1,
                AlertType::Counterflow => self.counterflow_alerts += 1,
            }
        }
    }

    pub fn total_alerts(&self) -> u64 {
        self.abandoned_object_alerts
            + self.speed_spike_alerts
            + self.loitering_alerts
            + self.counterflow_alerts
    }

    pub fn fps(&self) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            self.total_frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames,
            frames_with_tracks: self.frames_with_tracks,
            peak_confirmed_tracks: self.peak_confirmed_tracks,
            abandoned_object_alerts: self.abandoned_object_alerts,
            speed_spike_alerts: self.speed_spike_alerts,
            loitering_alerts: self.loitering_alerts,
            counterflow_alerts: self.counterflow_alerts,
            total_alerts: self.total_alerts(),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
            processing_fps: self.fps(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub frames_with_tracks: u64,
    pub peak_confirmed_tracks: usize,
    pub abandoned_object_alerts: u64,
    pub speed_spike_alerts: u64,
    pub loitering_alerts: u64,
    pub counterflow_alerts: u64,
    pub total_alerts: u64,
    pub elapsed_secs: f64,
    pub processing_fps: f64,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Config, Detection};

    fn det(x1: f32, y1: f32, x2: f32, y2: f32, label: &str) -> Detection {
        Detection {
            bbox: [x1, y1, x2, y2],
            confidence: 0.85,
            label: label.to_string(),
        }
    }

    #[test]
    fn test_end_to_end_abandonment() {
        // A person drops a backpack and walks away; the pipeline must
        // confirm both tracks, then raise exactly one abandonment alert.
        let mut pipeline = SurveillancePipeline::new(&Config::default());

        // Person next to the bag for the first second
        for i in 0..10 {
            let now = i as f64 * 0.1;
            let out = pipeline.process_frame(
                &[
                    det(300.0, 200.0, 360.0, 380.0, "person"),
                    det(370.0, 330.0, 420.0, 380.0, "backpack"),
                ],
                now,
            );
            assert!(out.alerts.is_empty());
        }

        // Person walks away rightward; the bag stays put. The clock
        // runs from the last frame the person was within proximity.
        let mut alerts = Vec::new();
        for i in 10..80 {
            let now = i as f64 * 0.1;
            let x = 300.0 + (i - 9) as f32 * 20.0;
            let out = pipeline.process_frame(
                &[
                    det(x, 200.0, x + 60.0, 380.0, "person"),
                    det(370.0, 330.0, 420.0, 380.0, "backpack"),
                ],
                now,
            );
            alerts.extend(out.alerts);
        }

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::AbandonedObject);
        assert_eq!(pipeline.metrics().abandoned_object_alerts, 1);
    }

    #[test]
    fn test_detectors_only_see_confirmed_tracks() {
        // A person visible for a single frame never confirms, so the
        // anomaly detector must accumulate no history for it.
        let mut pipeline = SurveillancePipeline::new(&Config::default());
        pipeline.process_frame(&[det(100.0, 100.0, 160.0, 280.0, "person")], 0.0);
        pipeline.process_frame(&[], 0.033);

        assert!(pipeline.anomaly().active_tracks().is_empty());
    }

    #[test]
    fn test_stationary_unwatched_object_stays_silent() {
        // §8 no-false-alert: a parked car triggers nothing, ever.
        let mut pipeline = SurveillancePipeline::new(&Config::default());
        for i in 0..600 {
            let out = pipeline.process_frame(
                &[det(500.0, 400.0, 700.0, 500.0, "car")],
                i as f64 * 0.1,
            );
            assert!(out.alerts.is_empty());
        }
        assert_eq!(pipeline.metrics().total_alerts(), 0);
        assert_eq!(pipeline.metrics().peak_confirmed_tracks, 1);
    }

    #[test]
    fn test_counterflow_person_alerts_once_through_pipeline() {
        let mut pipeline = SurveillancePipeline::new(&Config::default());
        let mut alerts = Vec::new();
        for i in 0..30 {
            let x = 900.0 - i as f32 * 20.0;
            let out =
                pipeline.process_frame(&[det(x, 200.0, x + 60.0, 380.0, "person")], i as f64 * 0.033);
            alerts.extend(out.alerts);
        }
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Counterflow);
        assert_eq!(pipeline.metrics().counterflow_alerts, 1);
    }

    #[test]
    fn test_reset_clears_session_state() {
        let mut pipeline = SurveillancePipeline::new(&Config::default());
        for i in 0..10 {
            pipeline.process_frame(&[det(100.0, 100.0, 160.0, 280.0, "person")], i as f64 * 0.1);
        }
        assert!(pipeline.metrics().total_frames > 0);

        pipeline.reset();
        assert_eq!(pipeline.metrics().total_frames, 0);
        assert!(pipeline.tracker().all_tracks().is_empty());
        assert!(pipeline.anomaly().active_tracks().is_empty());
    }
}
