// src/tracker.rs
//
// Greedy multi-object tracker over external detector output.
// Turns per-frame labeled bounding boxes into persistent track ids.
//
// Design:
//   - Greedy per-track matching in ascending-id order (sufficient for
//     tens of objects per frame; a Hungarian assignment would be
//     globally optimal at higher per-frame cost)
//   - Hybrid score: IoU + normalized centroid distance, same-class only
//   - Tracks coast through detection gaps up to max_age frames
//   - Ids are monotonic and never reused, even for a visually similar
//     object reappearing after expiry

use crate::types::{Detection, TrackedObject, TrackerConfig};
use tracing::{debug, info};

/// Weight of IoU in the match score
const IOU_WEIGHT: f32 = 0.7;
/// Weight of the normalized centroid-distance term
const DISTANCE_WEIGHT: f32 = 0.3;
/// Centroid distance (pixels) at which the distance term bottoms out
const DISTANCE_NORM_PX: f32 = 800.0;
/// Minimum combined score to accept a track↔detection match
const MIN_MATCH_SCORE: f32 = 0.3;

// ============================================================================
// TRACK
// ============================================================================

/// A single tracked object. The class label is fixed for the track's
/// lifetime; matching never crosses classes, so it cannot drift.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: u32,
    pub bbox: [f32; 4],
    pub label: String,
    pub confidence: f32,
    /// Successful matches since creation
    pub hits: u32,
    /// Consecutive frames without a match
    pub lost: u32,
    /// Frame time (seconds since epoch) at creation
    pub created_at: f64,
}

impl Track {
    fn new(id: u32, det: &Detection, now: f64) -> Self {
        Self {
            id,
            bbox: det.bbox,
            label: det.label.clone(),
            confidence: det.confidence,
            hits: 1,
            lost: 0,
            created_at: now,
        }
    }

    fn update_with_detection(&mut self, det: &Detection) {
        self.bbox = det.bbox;
        self.confidence = det.confidence;
        self.hits += 1;
        self.lost = 0;
    }

    fn mark_missed(&mut self) {
        self.lost += 1;
    }

    fn snapshot(&self) -> TrackedObject {
        TrackedObject {
            track_id: self.id,
            bbox: self.bbox,
            label: self.label.clone(),
            confidence: self.confidence,
        }
    }
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// Intersection over union of two axis-aligned boxes. Degenerate boxes
/// (x2 < x1, zero area) clamp to 0 instead of erroring; zero-union
/// pairs score 0.
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter <= 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

fn center_distance(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let acx = (a[0] + a[2]) * 0.5;
    let acy = (a[1] + a[3]) * 0.5;
    let bcx = (b[0] + b[2]) * 0.5;
    let bcy = (b[1] + b[3]) * 0.5;
    ((acx - bcx).powi(2) + (acy - bcy).powi(2)).sqrt()
}

/// Combined match score. NaN coordinates propagate into a NaN score,
/// which fails every threshold comparison, so malformed input degrades
/// to "no match" rather than a panic.
fn match_score(track_bbox: &[f32; 4], det_bbox: &[f32; 4]) -> f32 {
    let overlap = iou(track_bbox, det_bbox);
    let normalized_dist = (center_distance(track_bbox, det_bbox) / DISTANCE_NORM_PX).min(1.0);
    IOU_WEIGHT * overlap + DISTANCE_WEIGHT * (1.0 - normalized_dist)
}

// ============================================================================
// TRACKER
// ============================================================================

pub struct ObjectTracker {
    config: TrackerConfig,
    /// Ascending by id: new tracks are pushed with monotonically
    /// increasing ids and pruning preserves order, so iterating the
    /// Vec is the deterministic match order the tie-break relies on.
    tracks: Vec<Track>,
    next_id: u32,
    frame_count: u64,
}

impl ObjectTracker {
    pub fn new(config: TrackerConfig) -> Self {
        info!(
            "🎯 Object tracker initialized (max_age={}, n_init={})",
            config.max_age, config.n_init
        );
        Self {
            config,
            tracks: Vec::with_capacity(32),
            next_id: 1,
            frame_count: 0,
        }
    }

    /// Process one frame of detections. Returns snapshots of every
    /// confirmed track, including tracks currently coasting unmatched.
    /// Must be called once per frame, in frame order.
    pub fn update(&mut self, detections: &[Detection], now: f64) -> Vec<TrackedObject> {
        self.frame_count += 1;

        let mut matched_det: Vec<bool> = vec![false; detections.len()];

        // Greedy matching: each track claims its best-scoring unmatched
        // same-class detection; each detection satisfies at most one track.
        for track in &mut self.tracks {
            let mut best_score = MIN_MATCH_SCORE;
            let mut best_idx: Option<usize> = None;

            for (di, det) in detections.iter().enumerate() {
                if matched_det[di] || det.label != track.label {
                    continue;
                }
                let score = match_score(&track.bbox, &det.bbox);
                if score > best_score {
                    best_score = score;
                    best_idx = Some(di);
                }
            }

            match best_idx {
                Some(di) => {
                    matched_det[di] = true;
                    track.update_with_detection(&detections[di]);
                    debug!(
                        "Track {} matched (score={:.2}, hits={})",
                        track.id, best_score, track.hits
                    );
                }
                None => track.mark_missed(),
            }
        }

        // Unmatched detections spawn new tentative tracks
        for (di, matched) in matched_det.iter().enumerate() {
            if !matched {
                let track = Track::new(self.next_id, &detections[di], now);
                info!(
                    "🆕 New track T{} created: class={}, bbox=[{:.0},{:.0},{:.0},{:.0}]",
                    track.id,
                    track.label,
                    track.bbox[0],
                    track.bbox[1],
                    track.bbox[2],
                    track.bbox[3]
                );
                self.next_id += 1;
                self.tracks.push(track);
            }
        }

        // Prune expired tracks at end of frame
        let max_age = self.config.max_age;
        self.tracks.retain(|t| {
            if t.lost > max_age {
                info!(
                    "🗑️  Track {} expired (lost {} frames, lived {:.1}s)",
                    t.id,
                    t.lost,
                    now - t.created_at
                );
                return false;
            }
            true
        });

        let n_init = self.config.n_init;
        self.tracks
            .iter()
            .filter(|t| t.hits >= n_init)
            .map(Track::snapshot)
            .collect()
    }

    pub fn get_track(&self, id: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn all_tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn confirmed_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| t.hits >= self.config.n_init)
            .count()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 1;
        self.frame_count = 0;
    }
}

// ============================================================================
// TESTS
// ============================================================================
