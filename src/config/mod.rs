use std::path::{Path, PathBuf};
use std::time::Duration;
use log::warn;
use serde::{Deserialize, Serialize};
use crate::error::ConfigError;

/// Station configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub station_name: String,
    pub default_speed: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub speed_step: f32,
    pub speed_cycle_max: f32,
    pub synthesis_timeout_ms: u64,
    pub transient_backoff_ms: u64,
    pub empty_poll_ms: u64,
    /// FIFO eviction cap applied after each inject; 0 disables it
    pub max_queue_len: usize,
    pub talkover: bool,
    pub duck_level: f32,
    pub background_level: f32,
    pub text_separator: String,
    pub preferred_device: Option<String>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            station_name: "main".to_string(),
            default_speed: 1.0,
            min_speed: 0.5,
            max_speed: 2.0,
            speed_step: 0.25,
            speed_cycle_max: 1.75,
            synthesis_timeout_ms: 15_000,
            transient_backoff_ms: 1_000,
            empty_poll_ms: 2_000,
            max_queue_len: 20,
            talkover: true,
            duck_level: 0.3,
            background_level: 1.0,
            text_separator: ". ".to_string(),
            preferred_device: None,
        }
    }
}

impl StationConfig {
    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_millis(self.synthesis_timeout_ms)
    }

    pub fn transient_backoff(&self) -> Duration {
        Duration::from_millis(self.transient_backoff_ms)
    }

    pub fn empty_poll_interval(&self) -> Duration {
        Duration::from_millis(self.empty_poll_ms)
    }

    /// Clamp a requested speed into the configured range
    pub fn clamp_speed(&self, speed: f32) -> f32 {
        if !speed.is_finite() {
            return self.default_speed;
        }
        speed.clamp(self.min_speed, self.max_speed)
    }

    /// Next value of the speed button: steps up, wraps back to 1.0 past the cycle max
    pub fn next_cycle_speed(&self, current: f32) -> f32 {
        if current >= self.speed_cycle_max - f32::EPSILON {
            self.clamp_speed(1.0)
        } else {
            self.clamp_speed(current + self.speed_step)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_speed > 0.0 && self.min_speed <= self.max_speed) {
            return Err(ConfigError::InvalidValue {
                field: "min_speed".to_string(),
                reason: format!("must be > 0 and <= max_speed ({})", self.max_speed),
            });
        }
        if self.default_speed < self.min_speed || self.default_speed > self.max_speed {
            return Err(ConfigError::InvalidValue {
                field: "default_speed".to_string(),
                reason: format!("must be within {}..={}", self.min_speed, self.max_speed),
            });
        }
        if self.speed_step <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "speed_step".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.synthesis_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "synthesis_timeout_ms".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }
        if self.empty_poll_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "empty_poll_ms".to_string(),
                reason: "must be non-zero to avoid busy polling".to_string(),
            });
        }
        for (field, level) in [("duck_level", self.duck_level), ("background_level", self.background_level)] {
            if !(0.0..=1.0).contains(&level) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be within 0.0..=1.0".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: StationConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Ok(Self::with_path(config_path))
    }

    /// Load from an explicit path, falling back to defaults on a bad file
    pub fn with_path(config_path: PathBuf) -> Self {
        let config = match Self::load_config(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring configuration at {}: {}", config_path.display(), e);
                StationConfig::default()
            }
        };

        Self { config, config_path }
    }

    pub fn get_config(&self) -> &StationConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut StationConfig),
    {
        let mut candidate = self.config.clone();
        updater(&mut candidate);
        candidate.validate()?;
        self.config = candidate;
        self.save_config()
    }

    pub fn set_default_speed(&mut self, speed: f32) -> Result<(), ConfigError> {
        let speed = self.config.clamp_speed(speed);
        self.update_config(|config| config.default_speed = speed)
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::home_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(".config")
            .join("station-playout");

        std::fs::create_dir_all(&config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<StationConfig, ConfigError> {
        if !path.exists() {
            return Ok(StationConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: StationConfig = toml::from_str(&config_content)?;
        config.validate()?;

        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        (ConfigManager::with_path(config_path), temp_dir)
    }

    #[test]
    fn test_station_config_default() {
        let config = StationConfig::default();

        assert_eq!(config.default_speed, 1.0);
        assert_eq!(config.min_speed, 0.5);
        assert_eq!(config.max_speed, 2.0);
        assert_eq!(config.synthesis_timeout(), Duration::from_secs(15));
        assert_eq!(config.transient_backoff(), Duration::from_secs(1));
        assert_eq!(config.empty_poll_interval(), Duration::from_secs(2));
        assert_eq!(config.max_queue_len, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_clamp_speed() {
        let config = StationConfig::default();
        assert_eq!(config.clamp_speed(1.5), 1.5);
        assert_eq!(config.clamp_speed(3.0), 2.0);
        assert_eq!(config.clamp_speed(0.1), 0.5);
        assert_eq!(config.clamp_speed(f32::NAN), 1.0);
    }

    #[test]
    fn test_speed_cycle_wraps() {
        let config = StationConfig::default();
        let mut speed = 1.0;
        let mut seen = Vec::new();
        for _ in 0..5 {
            speed = config.next_cycle_speed(speed);
            seen.push(speed);
        }
        assert_eq!(seen, vec![1.25, 1.5, 1.75, 1.0, 1.25]);
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let mut config = StationConfig::default();
        config.min_speed = 3.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

        let mut config = StationConfig::default();
        config.synthesis_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = StationConfig::default();
        config.duck_level = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_config() {
        let (mut manager, _temp_dir) = create_test_config_manager();

        manager.update_config(|config| {
            config.station_name = "public".to_string();
            config.max_queue_len = 5;
        }).unwrap();

        let loaded = ConfigManager::load_config(manager.config_path()).unwrap();
        assert_eq!(loaded.station_name, "public");
        assert_eq!(loaded.max_queue_len, 5);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "default_speed = 1.25\n").unwrap();

        let config = ConfigManager::load_config(&path).unwrap();
        assert_eq!(config.default_speed, 1.25);
        assert_eq!(config.transient_backoff_ms, 1_000);
    }

    #[test]
    fn test_load_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        fs::write(&config_path, "invalid toml content [[[").unwrap();

        let result = ConfigManager::load_config(&config_path);
        assert!(matches!(result, Err(ConfigError::DeserializationError(_))));

        // The manager itself falls back to defaults
        let manager = ConfigManager::with_path(config_path);
        assert_eq!(manager.get_config(), &StationConfig::default());
    }

    #[test]
    fn test_update_config_rejects_invalid() {
        let (mut manager, _temp_dir) = create_test_config_manager();
        let result = manager.update_config(|config| config.empty_poll_ms = 0);
        assert!(result.is_err());
        assert_eq!(manager.get_config().empty_poll_ms, 2_000);
    }

    #[test]
    fn test_set_default_speed_clamps() {
        let (mut manager, _temp_dir) = create_test_config_manager();
        manager.set_default_speed(5.0).unwrap();
        assert_eq!(manager.get_config().default_speed, 2.0);
    }
}
