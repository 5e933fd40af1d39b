//! Run configuration loaded from TOML.
//!
//! Every key is optional; a missing key falls back to the value the fleet
//! model was tuned with. Keys use kebab-case:
//!
//! ```toml
//! seed = 7
//! duration-seconds = 600
//! ad-hoc = true
//! adaptive = true
//!
//! [agent]
//! speed = 0.3
//!
//! [radio]
//! max-range = 40
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Per-node behaviour.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AgentConfig {
    /// Travel speed in world units per second.
    pub speed: f64,
    /// Distance under which a waypoint counts as reached.
    pub destination_tolerance: f64,
    /// Seconds between status reports.
    pub feedback_interval: f64,
    /// Seconds of disconnection before relay assistance is requested.
    pub assist_request_timeout: f64,
    /// Destinations with a lower connection probability trigger assistance.
    pub connection_probability_threshold: f64,
    /// Seconds a relay node holds its position.
    pub relay_wait_seconds: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            destination_tolerance: 0.1,
            feedback_interval: 3.0,
            assist_request_timeout: 60.0,
            connection_probability_threshold: 0.85,
            relay_wait_seconds: 60.0,
        }
    }
}

/// Radio medium and relay planning.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RadioConfig {
    pub max_range: f64,
    pub obstruction_tolerance: usize,
    pub bid_window_seconds: f64,
    /// Largest fraction of the relay candidate pool a chain search may use.
    pub relay_search_factor: f64,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            max_range: 40.0,
            obstruction_tolerance: 2,
            bid_window_seconds: 5.0,
            relay_search_factor: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SimulationConfig {
    /// Overrides the seed stored in the scene.
    pub seed: Option<u64>,
    pub tick_seconds: f64,
    pub duration_seconds: f64,
    pub ad_hoc: bool,
    pub adaptive: bool,
    pub max_task_load: bool,
    /// Seconds between tasks for the whole fleet.
    pub task_interval: f64,
    pub metrics_interval: f64,
    /// Result log destination. A timestamped file in the working directory when unset.
    pub log_path: Option<String>,
    pub agent: AgentConfig,
    pub radio: RadioConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            tick_seconds: 0.1,
            duration_seconds: 100.0,
            ad_hoc: true,
            adaptive: true,
            max_task_load: false,
            task_interval: 120.0,
            metrics_interval: 3.0,
            log_path: None,
            agent: AgentConfig::default(),
            radio: RadioConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `config_path` - Path to the config.toml file
    ///
    /// # Returns
    /// * `Ok(SimulationConfig)` if the file was loaded, parsed and validated
    /// * `Err(String)` with a descriptive error message otherwise
    pub fn load(config_path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(config_path).map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let config: SimulationConfig = toml::from_str(content).map_err(|e| format!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`SimulationConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(config_path: &Path) -> Result<Self, String> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            log::info!("No config file at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Derive the config path from a scene file path.
    ///
    /// Replaces the scene filename with "config.toml" in the same directory.
    pub fn config_path_from_scene(scene_path: &str) -> PathBuf {
        let scene = Path::new(scene_path);
        scene.parent().unwrap_or(Path::new(".")).join("config.toml")
    }

    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("tick-seconds", self.tick_seconds),
            ("duration-seconds", self.duration_seconds),
            ("task-interval", self.task_interval),
            ("metrics-interval", self.metrics_interval),
            ("agent.speed", self.agent.speed),
            ("agent.destination-tolerance", self.agent.destination_tolerance),
            ("agent.feedback-interval", self.agent.feedback_interval),
            ("radio.max-range", self.radio.max_range),
            ("radio.bid-window-seconds", self.radio.bid_window_seconds),
            ("radio.relay-search-factor", self.radio.relay_search_factor),
        ];
        for (key, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("Invalid {} {}, must be positive", key, value));
            }
        }
        if self.agent.assist_request_timeout < 0.0 || self.agent.relay_wait_seconds < 0.0 {
            return Err("Agent timeouts must be non-negative".to_string());
        }
        let millis = self.tick_seconds * 1000.0;
        if millis.round() < 1.0 || (millis - millis.round()).abs() > 1e-6 {
            return Err(format!("Invalid tick-seconds {}, must be a whole number of milliseconds", self.tick_seconds));
        }
        Ok(())
    }

    /// Tick length in whole simulated milliseconds.
    pub fn tick_millis(&self) -> u64 {
        (self.tick_seconds * 1000.0).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(SimulationConfig::parse("").unwrap(), SimulationConfig::default());
    }

    #[test]
    fn kebab_case_keys_and_sections() {
        let config = SimulationConfig::parse(
            r#"
            seed = 7
            ad-hoc = false
            max-task-load = true
            log-path = "out.csv"

            [agent]
            speed = 0.3
            assist-request-timeout = 30

            [radio]
            max-range = 25
            obstruction-tolerance = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, Some(7));
        assert!(!config.ad_hoc);
        assert!(config.adaptive);
        assert!(config.max_task_load);
        assert_eq!(config.log_path.as_deref(), Some("out.csv"));
        assert_eq!(config.agent.speed, 0.3);
        assert_eq!(config.agent.assist_request_timeout, 30.0);
        assert_eq!(config.agent.feedback_interval, 3.0);
        assert_eq!(config.radio.max_range, 25.0);
        assert_eq!(config.radio.obstruction_tolerance, 1);
        assert_eq!(config.radio.bid_window_seconds, 5.0);
    }

    #[test]
    fn non_positive_values_are_rejected() {
        let err = SimulationConfig::parse("tick-seconds = 0").unwrap_err();
        assert!(err.contains("tick-seconds"), "{}", err);
        assert!(SimulationConfig::parse("[radio]\nmax-range = -1").is_err());
        assert!(SimulationConfig::parse("duration-seconds = \"long\"").is_err());
    }

    #[test]
    fn tick_must_be_whole_milliseconds() {
        assert!(SimulationConfig::parse("tick-seconds = 0.0004").is_err());
        assert!(SimulationConfig::parse("tick-seconds = 0.0015").is_err());
        let config = SimulationConfig::parse("tick-seconds = 0.002").unwrap();
        assert_eq!(config.tick_millis(), 2);
        assert_eq!(SimulationConfig::default().tick_millis(), 100);
    }

    #[test]
    fn config_path_sits_next_to_scene() {
        assert_eq!(SimulationConfig::config_path_from_scene("scenes/floor.json"), PathBuf::from("scenes/config.toml"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("fleet-relay-no-such-config.toml");
        assert_eq!(SimulationConfig::load_or_default(&path).unwrap(), SimulationConfig::default());
    }
}
