//! Runtime configuration for the scheduler actor.
//!
//! Loaded with the same `config` crate stack [`schedcore_kernel::config`]
//! uses elsewhere in the workspace: an optional settings file merged with
//! `SCHEDCORE__*` environment overrides, falling back to
//! [`SchedulerConfig::default`] for anything neither supplies.
//!
//! # Example (`scheduler.toml`)
//!
//! ```toml
//! command_channel_capacity = 256
//! fire_callback_timeout_secs = 30
//! ```

use config::{Config as Cfg, Environment, File};
use serde::{Deserialize, Serialize};

use schedcore_kernel::config::{ConfigError, ConfigResult};

/// Settings governing the scheduler actor's resource bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Bound on the actor's command channel. Commands queue here while the
    /// actor is busy firing due schedules; a full channel backpressures the
    /// caller rather than growing without limit.
    pub command_channel_capacity: usize,

    /// How long a fired callback is allowed to run before it's considered
    /// stuck, for diagnostic logging. The scheduler does not cancel slow
    /// callbacks — this is observability, not an enforcement mechanism.
    pub fire_callback_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            command_channel_capacity: 256,
            fire_callback_timeout_secs: 30,
        }
    }
}

/// Load [`SchedulerConfig`] from `path` (if it exists) merged with
/// `SCHEDCORE__*` environment overrides, falling back to defaults for
/// anything neither source sets.
pub fn load_scheduler_config(path: &str) -> ConfigResult<SchedulerConfig> {
    let config = Cfg::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::with_prefix("SCHEDCORE").separator("__"))
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = SchedulerConfig::default();
        assert!(config.command_channel_capacity > 0);
        assert!(config.fire_callback_timeout_secs > 0);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_scheduler_config("/nonexistent/scheduler").unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }
}
