// src/alert_log.rs
//
// Alert persistence. Appends each alert as one JSON line to
// <output_dir>/logs/alerts.jsonl, carrying both the raw frame
// timestamp and a formatted UTC time for human readers.

use crate::types::Alert;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
struct AlertRow<'a> {
    /// UTC wall-clock rendering of the frame timestamp
    time_utc: String,
    #[serde(flatten)]
    alert: &'a Alert,
}

pub struct AlertLog {
    path: PathBuf,
    file: File,
}

impl AlertLog {
    /// Create `<output_dir>/logs/` if needed and open the alert log
    /// for appending.
    pub fn open(output_dir: &str) -> Result<Self> {
        let logs_dir = Path::new(output_dir).join("logs");
        fs::create_dir_all(&logs_dir)
            .with_context(|| format!("failed to create {}", logs_dir.display()))?;

        let path = logs_dir.join("alerts.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        info!("📝 Alert log: {}", path.display());
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&mut self, alert: &Alert) -> Result<()> {
        let row = AlertRow {
            time_utc: format_epoch_secs(alert.timestamp),
            alert,
        };
        let mut line = serde_json::to_string(&row)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

fn format_epoch_secs(secs: f64) -> String {
    DateTime::<Utc>::from_timestamp_millis((secs * 1000.0) as i64)
        .unwrap_or_default()
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertType, Severity};
    use std::collections::HashMap;

    #[test]
    fn test_save_appends_json_lines() {
        let dir = std::env::temp_dir().join(format!("abnoguard-log-{}", std::process::id()));
        let mut log = AlertLog::open(dir.to_str().unwrap()).unwrap();

        let alert = Alert {
            timestamp: 1_700_000_000.5,
            alert_type: AlertType::Loitering,
            track_id: 12,
            description: "Loitering detected: 16.0s in small area (150.0 px²)".to_string(),
            severity: Severity::Medium,
            details: HashMap::new(),
        };
        log.save(&alert).unwrap();
        log.save(&alert).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert!(lines.len() >= 2);

        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["type"], "loitering");
        assert_eq!(parsed["track_id"], 12);
        assert_eq!(parsed["severity"], "medium");
        assert!(parsed["time_utc"].as_str().unwrap().starts_with("2023-11-14"));
    }

    #[test]
    fn test_epoch_formatting() {
        assert_eq!(
            format_epoch_secs(0.0),
            "1970-01-01 00:00:00.000".to_string()
        );
    }
}
