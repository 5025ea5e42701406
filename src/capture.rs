// src/capture.rs
//
// Detection-capture input: the external detector's per-frame output
// recorded as JSONL, one frame object per line:
//
//   {"timestamp": 1723456789.03, "detections": [
//       {"bbox": [x1, y1, x2, y2], "confidence": 0.91, "label": "person"}]}
//
// `timestamp` is optional; an unstamped frame gets the previous
// frame's timestamp plus one frame interval at the fallback fps, so
// mixed stamped/unstamped captures stay monotonic.

use crate::types::{CaptureConfig, Detection};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureFrame {
    #[serde(default)]
    pub timestamp: Option<f64>,
    pub detections: Vec<Detection>,
}

/// One loaded capture: frames in order, every frame stamped.
#[derive(Debug)]
pub struct Capture {
    pub path: PathBuf,
    pub frames: Vec<TimedFrame>,
}

#[derive(Debug)]
pub struct TimedFrame {
    pub timestamp: f64,
    pub detections: Vec<Detection>,
}

pub struct CaptureSource {
    config: CaptureConfig,
}

impl CaptureSource {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    /// Recursively scan the input directory for .jsonl capture files.
    pub fn find_capture_files(&self) -> Result<Vec<PathBuf>> {
        let mut captures = Vec::new();

        for entry in WalkDir::new(&self.config.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                captures.push(path.to_path_buf());
            }
        }

        captures.sort();
        info!("Found {} capture file(s)", captures.len());
        Ok(captures)
    }

    /// Load one capture. Blank lines are skipped; a malformed line is
    /// an error naming its line number.
    pub fn load(&self, path: &Path) -> Result<Capture> {
        let file = File::open(path)
            .with_context(|| format!("failed to open capture {}", path.display()))?;
        let reader = BufReader::new(file);

        let frame_interval = 1.0 / self.config.fallback_fps;
        let mut frames: Vec<TimedFrame> = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: CaptureFrame = serde_json::from_str(&line).with_context(|| {
                format!("malformed frame at {}:{}", path.display(), line_no + 1)
            })?;

            // Synthesize from the previous frame, not the absolute
            // index: a stamped frame followed by unstamped ones must
            // not jump backwards
            let timestamp = frame.timestamp.unwrap_or_else(|| {
                frames
                    .last()
                    .map(|prev| prev.timestamp + frame_interval)
                    .unwrap_or(0.0)
            });
            frames.push(TimedFrame {
                timestamp,
                detections: frame.detections,
            });
        }

        info!(
            "Loaded capture {}: {} frames",
            path.display(),
            frames.len()
        );
        Ok(Capture {
            path: path.to_path_buf(),
            frames,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CaptureConfig;
    use std::io::Write;

    fn source() -> CaptureSource {
        CaptureSource::new(CaptureConfig::default())
    }

    fn write_capture(contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("abnoguard-capture-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!(
            "cap-{}.jsonl",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_frames_with_timestamps() {
        let path = write_capture(concat!(
            r#"{"timestamp": 100.0, "detections": [{"bbox": [10, 20, 50, 80], "confidence": 0.9, "label": "person"}]}"#,
            "\n",
            "\n",
            r#"{"timestamp": 100.033, "detections": []}"#,
            "\n",
        ));

        let capture = source().load(&path).unwrap();
        assert_eq!(capture.frames.len(), 2);
        assert_eq!(capture.frames[0].timestamp, 100.0);
        assert_eq!(capture.frames[0].detections.len(), 1);
        assert_eq!(capture.frames[0].detections[0].label, "person");
        assert!(capture.frames[1].detections.is_empty());
    }

    #[test]
    fn test_missing_timestamps_synthesized_from_fps() {
        let path = write_capture(concat!(
            r#"{"detections": []}"#,
            "\n",
            r#"{"detections": []}"#,
            "\n",
            r#"{"detections": []}"#,
            "\n",
        ));

        let capture = source().load(&path).unwrap();
        assert_eq!(capture.frames[0].timestamp, 0.0);
        assert!((capture.frames[2].timestamp - 2.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_mixed_timestamps_stay_monotonic() {
        let path = write_capture(concat!(
            r#"{"timestamp": 100.0, "detections": []}"#,
            "\n",
            r#"{"detections": []}"#,
            "\n",
            r#"{"timestamp": 100.1, "detections": []}"#,
            "\n",
            r#"{"detections": []}"#,
            "\n",
        ));

        let capture = source().load(&path).unwrap();
        assert!((capture.frames[1].timestamp - (100.0 + 1.0 / 30.0)).abs() < 1e-9);
        assert!((capture.frames[3].timestamp - (100.1 + 1.0 / 30.0)).abs() < 1e-9);
        for pair in capture.frames.windows(2) {
            assert!(pair[1].timestamp >= pair[0].timestamp);
        }
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let path = write_capture("{\"detections\": []}\nnot json\n");
        let err = source().load(&path).unwrap_err();
        assert!(err.to_string().contains(":2"));
    }
}
