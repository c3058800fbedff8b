use std::{fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use slotlease_model::LeaseConfig;
use slotlease_observe::LoggerConfig;
use slotlease_redis::RedisLockConfig;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const ENV_REDIS_URL: &str = "SLOTLEASE_REDIS_URL";
pub const ENV_POOL_KEY: &str = "SLOTLEASE_POOL_KEY";

/// Agent configuration, read from an optional JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AgentConfig {
    pub redis_url: String,
    pub lease: LeaseConfig,
    pub lock: RedisLockConfig,
    pub logger: LoggerConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            lease: LeaseConfig::default(),
            lock: RedisLockConfig::default(),
            logger: LoggerConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load `path` (defaults if `None`), then apply environment overrides.
    pub fn load(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_json(&raw).with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        cfg.apply_env(env);
        cfg.lease.validate()?;
        Ok(cfg)
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(url) = env(ENV_REDIS_URL).filter(|v| !v.trim().is_empty()) {
            self.redis_url = url;
        }
        if let Some(key) = env(ENV_POOL_KEY).filter(|v| !v.trim().is_empty()) {
            self.lease.pool_key = key;
        }
    }
}
