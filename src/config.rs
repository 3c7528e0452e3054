//! Configuration types.
//!
//! Everything is read from the environment once at startup into an
//! [`AppConfig`] that is then handed to the adapters and the pipeline.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::llm::LlmConfig;
use crate::logging::LogConfig;
use crate::mailbox::ImapConfig;
use crate::notify::NotifyConfig;
use crate::pipeline::PipelineConfig;
use crate::scheduler::ScheduleConfig;

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Source of configuration values.
///
/// Wraps a key lookup so parsing can be exercised without touching the
/// process environment.
pub struct Env {
    lookup: Lookup,
}

impl Env {
    /// Read from the process environment.
    pub fn from_process() -> Self {
        Self {
            lookup: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Read from a fixed set of pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            lookup: Box::new(move |key| map.get(key).cloned()),
        }
    }

    /// Value for `key`, trimmed. Blank values count as unset.
    pub fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn require(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// First set value among `keys`; the error names the first key.
    pub fn require_any(&self, keys: &[&str]) -> Result<String, ConfigError> {
        keys.iter()
            .find_map(|k| self.get(k))
            .ok_or_else(|| ConfigError::MissingEnvVar(keys.first().copied().unwrap_or("").into()))
    }

    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
        }
    }

    pub fn flag_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("{v:?} is not a boolean"),
                }),
            },
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mailbox: ImapConfig,
    pub llm: LlmConfig,
    pub notify: NotifyConfig,
    pub schedule: ScheduleConfig,
    pub pipeline: PipelineConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&Env::from_process())
    }

    pub fn from_lookup(env: &Env) -> Result<Self, ConfigError> {
        Ok(Self {
            mailbox: ImapConfig::from_lookup(env)?,
            llm: LlmConfig::from_lookup(env)?,
            notify: NotifyConfig::from_lookup(env)?,
            schedule: ScheduleConfig::from_lookup(env)?,
            pipeline: PipelineConfig::from_lookup(env)?,
            log: LogConfig::from_lookup(env),
        })
    }
}
