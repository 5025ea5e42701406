// src/main.rs

mod abandonment;
mod alert_log;
mod anomaly;
mod capture;
mod config;
mod pipeline;
mod tracker;
mod types;

use alert_log::AlertLog;
use anyhow::Result;
use capture::CaptureSource;
use pipeline::SurveillancePipeline;
use tracing::{error, info, warn};
use types::Config;

fn main() -> Result<()> {
    let config_path = "config.yaml";
    let config_found = std::path::Path::new(config_path).exists();
    let config = Config::load_or_default(config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!("abnoguard={}", config.logging.level))
        .init();

    info!("🚀 AbnoGuard behavioral analytics core starting");
    if !config_found {
        warn!("Config file {} not found, using defaults", config_path);
    }
    info!(
        "Tracker: max_age={}, n_init={} | Abandonment: {}s/{}px | Anomaly: {}px/frame, {}s, {}",
        config.tracker.max_age,
        config.tracker.n_init,
        config.abandonment.abandonment_threshold,
        config.abandonment.proximity_threshold,
        config.anomaly.speed_threshold,
        config.anomaly.loitering_threshold,
        config.anomaly.counterflow_threshold,
    );

    let source = CaptureSource::new(config.capture.clone());
    let capture_files = source.find_capture_files()?;
    if capture_files.is_empty() {
        error!(
            "No .jsonl capture files found in {}",
            config.capture.input_dir
        );
        return Ok(());
    }

    let mut alert_log = AlertLog::open(&config.logging.output_dir)?;
    let mut pipeline = SurveillancePipeline::new(&config);
    let mut session_alerts: u64 = 0;

    for (idx, path) in capture_files.iter().enumerate() {
        info!("========================================");
        info!(
            "Processing capture {}/{}: {}",
            idx + 1,
            capture_files.len(),
            path.display()
        );

        let capture = source.load(path)?;
        let mut worst_severity: Option<types::Severity> = None;
        for frame in &capture.frames {
            let output = pipeline.process_frame(&frame.detections, frame.timestamp);
            for alert in &output.alerts {
                if let Err(err) = alert_log.save(alert) {
                    warn!(
                        "Failed to persist {} alert: {err:#}",
                        alert.alert_type.as_str()
                    );
                }
                worst_severity = match worst_severity {
                    Some(current) if current.rank() >= alert.severity.rank() => Some(current),
                    _ => Some(alert.severity),
                };
            }
            session_alerts += output.alerts.len() as u64;
        }

        let summary = pipeline.metrics().summary();
        info!(
            "Capture {} done: {} frames, {} alerts (abandoned={}, spike={}, loiter={}, counterflow={}), {:.0} fps",
            capture.path.display(),
            summary.total_frames,
            summary.total_alerts,
            summary.abandoned_object_alerts,
            summary.speed_spike_alerts,
            summary.loitering_alerts,
            summary.counterflow_alerts,
            summary.processing_fps,
        );
        if let Some(severity) = worst_severity {
            info!("Worst severity this capture: {}", severity.as_str());
        }

        // Track ids and behavioral state are per-capture
        pipeline.reset();
    }

    info!("🎯 Analysis complete: {} alert(s) total", session_alerts);
    info!("📁 Alerts logged to {}", alert_log.path().display());
    Ok(())
}
