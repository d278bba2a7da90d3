//! Runtime configuration, read from the environment.

use std::path::PathBuf;
use std::sync::Arc;

use jiff::SignedDuration;
use thiserror::Error;

use crate::order::{DEFAULT_DELIVERY_ETA, TransitionPolicy};
use crate::store::{FileStore, KeyValueStore, MemoryStore, StoreError};

pub const DATA_DIR_VAR: &str = "DELIVERY_DATA_DIR";
pub const ETA_MINUTES_VAR: &str = "DELIVERY_ETA_MINUTES";
pub const FORWARD_ONLY_VAR: &str = "DELIVERY_FORWARD_ONLY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive number of minutes, got '{value}'")]
    InvalidEta { var: &'static str, value: String },

    #[error("{var} must be true/false or 1/0, got '{value}'")]
    InvalidFlag { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory for persisted state; in-memory storage when unset.
    pub data_dir: Option<PathBuf>,
    /// Time from order placement to the delivery estimate.
    pub delivery_eta: SignedDuration,
    pub transition_policy: TransitionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            delivery_eta: DEFAULT_DELIVERY_ETA,
            transition_policy: TransitionPolicy::Permissive,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|var| std::env::var(var).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(dir) = lookup(DATA_DIR_VAR).filter(|dir| !dir.trim().is_empty()) {
            config.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(value) = lookup(ETA_MINUTES_VAR) {
            let minutes = value
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|minutes| (1..=24 * 60).contains(minutes))
                .ok_or_else(|| ConfigError::InvalidEta {
                    var: ETA_MINUTES_VAR,
                    value: value.clone(),
                })?;
            config.delivery_eta = SignedDuration::from_mins(minutes);
        }

        if let Some(value) = lookup(FORWARD_ONLY_VAR) {
            let normalized = value.trim().to_ascii_lowercase();
            let forward_only = match normalized.as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidFlag {
                        var: FORWARD_ONLY_VAR,
                        value,
                    });
                }
            };
            if forward_only {
                config.transition_policy = TransitionPolicy::ForwardOnly;
            }
        }

        Ok(config)
    }

    /// Open the store this config points at.
    pub async fn open_store(&self) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        Ok(match &self.data_dir {
            Some(dir) => Arc::new(FileStore::open(dir).await?),
            None => Arc::new(MemoryStore::new()),
        })
    }
}
