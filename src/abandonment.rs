// src/abandonment.rs
//
// Abandoned-object detection over tracked bag-class objects.
// Per object id, keeps a history of person-proximity associations and
// raises a single alert once the object has gone unattended longer
// than the configured threshold.
//
// Identity is track-id based, not appearance based: an object whose
// track expires and reappears under a new id restarts its clock. That
// is an accepted limitation of greedy geometric tracking.

use crate::types::{AbandonmentConfig, Alert, AlertType, Severity, TrackedObject};
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Retained association records per object (oldest evicted). Only the
/// most recent record drives the decision; the rest is introspection.
const ASSOCIATION_HISTORY_CAP: usize = 300;

/// One proximity observation for a watched object. `person_id = None`
/// marks the sentinel written when an object first appears with nobody
/// nearby; the unattended clock starts there.
#[derive(Debug, Clone, Copy)]
pub struct AssociationRecord {
    pub timestamp: f64,
    pub person_id: Option<u32>,
    pub distance: f32,
}

pub struct AbandonmentDetector {
    config: AbandonmentConfig,
    associations: HashMap<u32, VecDeque<AssociationRecord>>,
    abandoned: HashSet<u32>,
    /// Permanent per-session suppression: one alert per track id, ever
    alerted: HashSet<u32>,
}

impl AbandonmentDetector {
    pub fn new(config: AbandonmentConfig) -> Self {
        info!(
            "🚨 Abandonment detector initialized (threshold: {}s, proximity: {}px)",
            config.abandonment_threshold, config.proximity_threshold
        );
        Self {
            config,
            associations: HashMap::new(),
            abandoned: HashSet::new(),
            alerted: HashSet::new(),
        }
    }

    /// Process one frame of confirmed tracked objects. Appends at most
    /// one association record per watched object and returns any new
    /// abandonment alerts.
    pub fn update(&mut self, tracked: &[TrackedObject], now: f64) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for obj in tracked {
            if !self.config.watch_classes.contains(&obj.label) {
                continue;
            }
            if self.alerted.contains(&obj.track_id) {
                continue;
            }

            let (ocx, ocy) = obj.center();

            match self.find_person_nearby(ocx, ocy, tracked) {
                Some((person_id, distance)) => {
                    debug!(
                        "Object {} attended by person {} ({:.0}px)",
                        obj.track_id, person_id, distance
                    );
                    self.push_record(
                        obj.track_id,
                        AssociationRecord {
                            timestamp: now,
                            person_id: Some(person_id),
                            distance,
                        },
                    );
                    self.abandoned.remove(&obj.track_id);
                }
                None => match self.last_record(obj.track_id) {
                    Some(last) => {
                        let unattended = now - last.timestamp;
                        if unattended > self.config.abandonment_threshold
                            && !self.abandoned.contains(&obj.track_id)
                        {
                            self.abandoned.insert(obj.track_id);
                            self.alerted.insert(obj.track_id);
                            let alert = build_alert(obj, ocx, ocy, unattended, now);
                            warn!("🚨 {}", alert.description);
                            alerts.push(alert);
                        }
                    }
                    None => {
                        // First sighting with nobody nearby: start the
                        // clock with a sentinel. Later frames measure
                        // elapsed time against it.
                        self.push_record(
                            obj.track_id,
                            AssociationRecord {
                                timestamp: now,
                                person_id: None,
                                distance: f32::INFINITY,
                            },
                        );
                    }
                },
            }
        }

        alerts
    }

    /// First person within the proximity threshold, in tracked-object
    /// scan order. Deliberately not nearest-neighbor: the tie-break is
    /// iteration order, which follows ascending track id.
    fn find_person_nearby(
        &self,
        obj_x: f32,
        obj_y: f32,
        tracked: &[TrackedObject],
    ) -> Option<(u32, f32)> {
        for other in tracked {
            if other.label != "person" {
                continue;
            }
            let (px, py) = other.center();
            let distance = ((px - obj_x).powi(2) + (py - obj_y).powi(2)).sqrt();
            if distance < self.config.proximity_threshold {
                return Some((other.track_id, distance));
            }
        }
        None
    }

    fn last_record(&self, track_id: u32) -> Option<AssociationRecord> {
        self.associations
            .get(&track_id)
            .and_then(|h| h.back())
            .copied()
    }

    fn push_record(&mut self, track_id: u32, record: AssociationRecord) {
        let history = self.associations.entry(track_id).or_default();
        history.push_back(record);
        while history.len() > ASSOCIATION_HISTORY_CAP {
            history.pop_front();
        }
    }

    /// Track ids currently in the abandoned state
    pub fn abandoned_objects(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.abandoned.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn association_history(&self, track_id: u32) -> Option<&VecDeque<AssociationRecord>> {
        self.associations.get(&track_id)
    }

    pub fn reset(&mut self) {
        self.associations.clear();
        self.abandoned.clear();
        self.alerted.clear();
    }
}

fn build_alert(obj: &TrackedObject, x: f32, y: f32, unattended_secs: f64, now: f64) -> Alert {
    let mut details = HashMap::new();
    details.insert("position".to_string(), json!([x, y]));
    details.insert("object_type".to_string(), json!(obj.label));
    details.insert("unattended_secs".to_string(), json!(unattended_secs));

    Alert {
        timestamp: now,
        alert_type: AlertType::AbandonedObject,
        track_id: obj.track_id,
        description: format!(
            "Abandoned {} detected at position ({:.1}, {:.1})",
            obj.label, x, y
        ),
        severity: Severity::Medium,
        details,
    }
}

// ============================================================================
// TESTS
// ============================================================================
