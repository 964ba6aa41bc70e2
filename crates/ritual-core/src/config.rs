//! TOML-based application configuration.
//!
//! Stores timing preferences for the ritual engines:
//! - Countdown tick granularity and default session length
//! - Release timeline length, reduced-motion length and spinner delay
//! - Particle field seed and size
//!
//! Configuration is stored at `~/.config/ritual/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::particles::ParticleSpec;
use crate::rendezvous::RendezvousSettings;

/// Countdown engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_duration_secs")]
    pub default_duration_secs: u64,
}

/// Release ceremony configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseConfig {
    #[serde(default = "default_timeline_duration_ms")]
    pub timeline_duration_ms: u64,
    /// Timeline length when the user prefers reduced motion.
    #[serde(default = "default_reduced_motion_duration_ms")]
    pub reduced_motion_duration_ms: u64,
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default = "default_spinner_delay_ms")]
    pub spinner_delay_ms: u64,
    /// Shown when a commit fails without a message of its own.
    #[serde(default = "default_generic_error_message")]
    pub generic_error_message: String,
}

/// Particle field configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticlesConfig {
    #[serde(default = "default_particle_seed")]
    pub seed: u64,
    #[serde(default = "default_particle_count")]
    pub count: u32,
    #[serde(default = "default_particle_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/ritual/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reduced_motion: bool,
    #[serde(default)]
    pub countdown: CountdownConfig,
    #[serde(default)]
    pub release: ReleaseConfig,
    #[serde(default)]
    pub particles: ParticlesConfig,
}

// Default functions
fn default_tick_interval_ms() -> u64 {
    250
}
fn default_duration_secs() -> u64 {
    25 * 60
}
fn default_timeline_duration_ms() -> u64 {
    4_500
}
fn default_reduced_motion_duration_ms() -> u64 {
    100
}
fn default_frame_interval_ms() -> u64 {
    50
}
fn default_spinner_delay_ms() -> u64 {
    400
}
fn default_generic_error_message() -> String {
    RendezvousSettings::default().generic_error_message
}
fn default_particle_seed() -> u64 {
    7
}
fn default_particle_count() -> u32 {
    24
}
fn default_particle_max_delay_ms() -> u64 {
    1_500
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            default_duration_secs: default_duration_secs(),
        }
    }
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            timeline_duration_ms: default_timeline_duration_ms(),
            reduced_motion_duration_ms: default_reduced_motion_duration_ms(),
            frame_interval_ms: default_frame_interval_ms(),
            spinner_delay_ms: default_spinner_delay_ms(),
            generic_error_message: default_generic_error_message(),
        }
    }
}

impl Default for ParticlesConfig {
    fn default() -> Self {
        Self {
            seed: default_particle_seed(),
            count: default_particle_count(),
            max_delay_ms: default_particle_max_delay_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reduced_motion: false,
            countdown: CountdownConfig::default(),
            release: ReleaseConfig::default(),
            particles: ParticlesConfig::default(),
        }
    }
}

/// Returns `~/.config/ritual[-dev]/` based on RITUAL_ENV.
///
/// Set RITUAL_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("RITUAL_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("ritual-dev")
    } else {
        base_dir.join("ritual")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::NoConfigDir(e.to_string()))?;
    Ok(dir)
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => serde_json::Value::Number(
                        value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                            .into(),
                    ),
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("cannot replace a whole section".into()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, or defaults if no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// fails validation.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };
        let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. The result must validate.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Reject values the engines cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("countdown.tick_interval_ms", self.countdown.tick_interval_ms),
            ("countdown.default_duration_secs", self.countdown.default_duration_secs),
            ("release.timeline_duration_ms", self.release.timeline_duration_ms),
            ("release.reduced_motion_duration_ms", self.release.reduced_motion_duration_ms),
            ("release.frame_interval_ms", self.release.frame_interval_ms),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.countdown.tick_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.release.frame_interval_ms)
    }

    /// Settings for one release rendezvous. Reduced motion applies if
    /// either the caller or the config asks for it.
    pub fn rendezvous_settings(&self, reduced_motion: bool) -> RendezvousSettings {
        let timeline_ms = if reduced_motion || self.reduced_motion {
            self.release.reduced_motion_duration_ms
        } else {
            self.release.timeline_duration_ms
        };
        RendezvousSettings {
            timeline_ms,
            spinner_delay_ms: self.release.spinner_delay_ms,
            generic_error_message: self.release.generic_error_message.clone(),
        }
    }

    pub fn particle_spec(&self) -> ParticleSpec {
        ParticleSpec {
            count: self.particles.count,
            max_delay_ms: self.particles.max_delay_ms,
            ..ParticleSpec::default()
        }
    }
}
