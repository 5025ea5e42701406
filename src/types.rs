// src/types.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub abandonment: AbandonmentConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Consecutive unmatched frames a track survives before removal
    pub max_age: u32,
    /// Matched frames required to confirm a track and expose it downstream
    pub n_init: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 30, // ~1s at 30fps
            n_init: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbandonmentConfig {
    /// Seconds without a nearby person before an object counts as abandoned
    pub abandonment_threshold: f64,
    /// Center-to-center distance (pixels) under which a person is "nearby"
    pub proximity_threshold: f32,
    /// Class labels treated as abandonable containers
    pub watch_classes: Vec<String>,
}

impl Default for AbandonmentConfig {
    fn default() -> Self {
        Self {
            abandonment_threshold: 5.0,
            proximity_threshold: 100.0,
            watch_classes: vec![
                "backpack".to_string(),
                "handbag".to_string(),
                "suitcase".to_string(),
                "bag".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Per-frame displacement (pixels) above which a step counts as a spike
    pub speed_threshold: f32,
    /// Seconds confined to a small area before loitering fires
    pub loitering_threshold: f64,
    /// Cosine-similarity magnitude for counterflow (movement vs expected flow)
    pub counterflow_threshold: f32,
    /// Expected flow direction as a unit vector (default: rightward)
    pub expected_flow: [f32; 2],
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            speed_threshold: 30.0,
            loitering_threshold: 15.0,
            counterflow_threshold: 0.7,
            expected_flow: [1.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Directory scanned (recursively) for .jsonl detection captures
    pub input_dir: String,
    /// Frame rate assumed when a capture carries no timestamps
    pub fallback_fps: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            input_dir: "captures".to_string(),
            fallback_fps: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub output_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output_dir: "outputs".to_string(),
        }
    }
}

/// One raw detection from the external detector. Carries no identity;
/// coordinates are pixels and may be degenerate (x2 < x1); consumers
/// score such boxes as non-matching rather than fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: [f32; 4], // [x1, y1, x2, y2]
    pub confidence: f32,
    pub label: String,
}

/// Per-frame snapshot of one confirmed track, handed from the tracker
/// to both behavior detectors. Read-only downstream.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedObject {
    pub track_id: u32,
    pub bbox: [f32; 4],
    pub label: String,
    pub confidence: f32,
}

impl TrackedObject {
    pub fn center(&self) -> (f32, f32) {
        (
            (self.bbox[0] + self.bbox[2]) * 0.5,
            (self.bbox[1] + self.bbox[3]) * 0.5,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    AbandonedObject,
    SpeedSpike,
    Loitering,
    Counterflow,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AbandonedObject => "abandoned_object",
            Self::SpeedSpike => "speed_spike",
            Self::Loitering => "loitering",
            Self::Counterflow => "counterflow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

/// A behavioral alert. `details` carries type-specific numeric fields
/// (speed, area covered, cosine similarity, ...) for the sink.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    /// Seconds since epoch (frame time, not wall-clock at emission)
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub track_id: u32,
    pub description: String,
    pub severity: Severity,
    pub details: HashMap<String, serde_json::Value>,
}
