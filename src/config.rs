use crate::types::Config;
use anyhow::Result;
use std::fs;
use std::path::Path;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from `path`, falling back to built-in defaults when the
    /// file is absent. A present-but-invalid file is still an error.
    /// Does not log: this runs before the subscriber is installed, so
    /// the caller reports the fallback once logging is up.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = Config::default();
        assert_eq!(config.tracker.max_age, 30);
        assert_eq!(config.tracker.n_init, 3);
        assert_eq!(config.abandonment.abandonment_threshold, 5.0);
        assert_eq!(config.abandonment.proximity_threshold, 100.0);
        assert_eq!(config.anomaly.speed_threshold, 30.0);
        assert_eq!(config.anomaly.loitering_threshold, 15.0);
        assert_eq!(config.anomaly.counterflow_threshold, 0.7);
        assert_eq!(config.anomaly.expected_flow, [1.0, 0.0]);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load_or_default("/nonexistent/abnoguard.yaml").unwrap();
        assert_eq!(config.tracker.max_age, 30);
        assert_eq!(config.abandonment.abandonment_threshold, 5.0);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "tracker:\n  max_age: 10\n  n_init: 2\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tracker.max_age, 10);
        assert_eq!(config.tracker.n_init, 2);
        assert_eq!(config.abandonment.abandonment_threshold, 5.0);
        assert!(config
            .abandonment
            .watch_classes
            .contains(&"backpack".to_string()));
    }
}
