//! Engine configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a handler table treats two visiting methods with the same key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The method registered last replaces the earlier one
    #[default]
    LastWins,
    /// Engine construction fails with `AmbiguousHandler`
    Reject,
}

/// Options applied when building a [`VisitEngine`](crate::VisitEngine)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub collision_policy: CollisionPolicy,

    /// Reuse per-thread extraction buffers across dispatch calls
    pub reuse_buffers: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            collision_policy: CollisionPolicy::LastWins,
            reuse_buffers: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid engine configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl EngineConfig {
    /// Parses a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    pub fn with_buffer_reuse(mut self, reuse: bool) -> Self {
        self.reuse_buffers = reuse;
        self
    }
}
