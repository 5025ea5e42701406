// src/anomaly.rs
//
// Movement-anomaly detection over tracked people.
// Per person id, keeps a bounded ring buffer of positions and runs
// three independent checks each frame:
//   - speed spike: last step far above both an absolute threshold and
//     the track's own average (absolute alone is scale-dependent;
//     the relative multiplier separates a spike from sustained speed)
//   - loitering: long dwell inside a small enclosing area
//   - counterflow: recent motion substantially opposite expected flow
//
// The first frame that produces any alert suppresses the id for the
// rest of the session; all checks that fire within that frame are
// still reported.

use crate::types::{Alert, AlertType, AnomalyConfig, Severity, TrackedObject};
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{info, warn};

/// Ring-buffer capacity per person (1s at 30fps)
const MOVEMENT_HISTORY_CAP: usize = 30;
/// Samples required before speed/counterflow checks run
const MIN_SAMPLES: usize = 5;
/// Samples required before the loitering check runs
const MIN_LOITER_SAMPLES: usize = 10;
/// Recent step must exceed the historic average by this factor
const SPIKE_AVG_MULTIPLIER: f32 = 1.5;
/// Enclosing-area bound (px²) for loitering. A fixed constant, not
/// scaled to frame resolution.
const LOITER_AREA_PX2: f32 = 2000.0;
/// Positions considered for the counterflow direction estimate
const COUNTERFLOW_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct MovementSample {
    pub timestamp: f64,
    pub position: (f32, f32),
    pub bbox: [f32; 4],
}

pub struct AnomalyDetector {
    config: AnomalyConfig,
    movement_history: HashMap<u32, VecDeque<MovementSample>>,
    /// Permanent per-session suppression: one alerting frame per id
    alerted: HashSet<u32>,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Self {
        info!(
            "🚨 Anomaly detector initialized (speed: {} px/frame, loitering: {}s, counterflow: {})",
            config.speed_threshold, config.loitering_threshold, config.counterflow_threshold
        );
        Self {
            config,
            movement_history: HashMap::new(),
            alerted: HashSet::new(),
        }
    }

    /// Process one frame of confirmed tracked objects. Only persons
    /// are analyzed; checks with insufficient history are skipped.
    pub fn update(&mut self, tracked: &[TrackedObject], now: f64) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for obj in tracked {
            if obj.label != "person" {
                continue;
            }
            if self.alerted.contains(&obj.track_id) {
                continue;
            }

            let history = self.movement_history.entry(obj.track_id).or_default();
            history.push_back(MovementSample {
                timestamp: now,
                position: obj.center(),
                bbox: obj.bbox,
            });
            while history.len() > MOVEMENT_HISTORY_CAP {
                history.pop_front();
            }

            let frame_alerts = check_anomalies(&self.config, obj.track_id, history, now);
            if !frame_alerts.is_empty() {
                for alert in &frame_alerts {
                    warn!("🚨 {}", alert.description);
                }
                self.alerted.insert(obj.track_id);
                alerts.extend(frame_alerts);
            }
        }

        alerts
    }

    pub fn movement_history(&self, track_id: u32) -> Option<&VecDeque<MovementSample>> {
        self.movement_history.get(&track_id)
    }

    pub fn active_tracks(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.movement_history.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn reset(&mut self) {
        self.movement_history.clear();
        self.alerted.clear();
    }
}

/// Run all three checks over one track's history. Each fires
/// independently; the caller applies suppression afterward.
fn check_anomalies(
    config: &AnomalyConfig,
    track_id: u32,
    history: &VecDeque<MovementSample>,
    now: f64,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    if history.len() < MIN_SAMPLES {
        return alerts;
    }

    if let Some(alert) = check_speed_spike(config, track_id, history) {
        alerts.push(alert);
    }
    if let Some(alert) = check_loitering(config, track_id, history, now) {
        alerts.push(alert);
    }
    if let Some(alert) = check_counterflow(config, track_id, history) {
        alerts.push(alert);
    }

    alerts
}

fn check_speed_spike(
    config: &AnomalyConfig,
    track_id: u32,
    history: &VecDeque<MovementSample>,
) -> Option<Alert> {
    let positions: Vec<(f32, f32)> = history.iter().map(|s| s.position).collect();
    let steps: Vec<f32> = positions
        .windows(2)
        .map(|w| {
            let (ax, ay) = w[0];
            let (bx, by) = w[1];
            ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt()
        })
        .collect();
    let (recent, earlier) = match steps.split_last() {
        Some((last, rest)) if !rest.is_empty() => (*last, rest),
        _ => return None,
    };
    let avg = earlier.iter().sum::<f32>() / earlier.len() as f32;

    if recent > config.speed_threshold && recent > avg * SPIKE_AVG_MULTIPLIER {
        let mut details = HashMap::new();
        details.insert("speed".to_string(), json!(recent));
        details.insert("avg_speed".to_string(), json!(avg));

        return Some(Alert {
            timestamp: history.back()?.timestamp,
            alert_type: AlertType::SpeedSpike,
            track_id,
            description: format!(
                "Speed spike detected: {:.1} px/frame (avg: {:.1})",
                recent, avg
            ),
            severity: Severity::High,
            details,
        });
    }
    None
}

fn check_loitering(
    config: &AnomalyConfig,
    track_id: u32,
    history: &VecDeque<MovementSample>,
    now: f64,
) -> Option<Alert> {
    if history.len() < MIN_LOITER_SAMPLES {
        return None;
    }

    // Axis-aligned bounds of every retained position
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for sample in history {
        let (x, y) = sample.position;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let area_covered = (max_x - min_x) * (max_y - min_y);
    let time_span = now - history.front()?.timestamp;

    if area_covered < LOITER_AREA_PX2 && time_span > config.loitering_threshold {
        let mut details = HashMap::new();
        details.insert("time_span".to_string(), json!(time_span));
        details.insert("area_covered".to_string(), json!(area_covered));

        return Some(Alert {
            timestamp: now,
            alert_type: AlertType::Loitering,
            track_id,
            description: format!(
                "Loitering detected: {:.1}s in small area ({:.1} px²)",
                time_span, area_covered
            ),
            severity: Severity::Medium,
            details,
        });
    }
    None
}

fn check_counterflow(
    config: &AnomalyConfig,
    track_id: u32,
    history: &VecDeque<MovementSample>,
) -> Option<Alert> {
    let recent: Vec<(f32, f32)> = history
        .iter()
        .skip(history.len().saturating_sub(COUNTERFLOW_WINDOW))
        .map(|s| s.position)
        .collect();

    // Consecutive displacement vectors, zero-length ones discarded
    let vectors: Vec<(f32, f32)> = recent
        .windows(2)
        .map(|w| (w[1].0 - w[0].0, w[1].1 - w[0].1))
        .filter(|(dx, dy)| (dx * dx + dy * dy).sqrt() > 0.0)
        .collect();
    if vectors.is_empty() {
        // Stationary over the window: no direction to compare
        return None;
    }

    let n = vectors.len() as f32;
    let avg_x = vectors.iter().map(|v| v.0).sum::<f32>() / n;
    let avg_y = vectors.iter().map(|v| v.1).sum::<f32>() / n;
    let norm = (avg_x * avg_x + avg_y * avg_y).sqrt();
    if norm <= 0.0 {
        // Back-and-forth motion can cancel to a zero mean
        return None;
    }
    let dir = (avg_x / norm, avg_y / norm);

    let cosine_sim = dir.0 * config.expected_flow[0] + dir.1 * config.expected_flow[1];

    if cosine_sim < -config.counterflow_threshold {
        let mut details = HashMap::new();
        details.insert("cosine_similarity".to_string(), json!(cosine_sim));
        details.insert("movement_direction".to_string(), json!([dir.0, dir.1]));

        return Some(Alert {
            timestamp: history.back()?.timestamp,
            alert_type: AlertType::Counterflow,
            track_id,
            description: format!(
                "Counterflow movement detected (cosine similarity: {:.2})",
                cosine_sim
            ),
            severity: Severity::Medium,
            details,
        });
    }
    None
}

// ============================================================================
// TESTS
// ============================================================================
