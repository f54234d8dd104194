//! Ordered set of watch configurations with a rotation index

use std::path::Path;

use super::config::WatchConfig;
use crate::error::{Result, WatchError};

/// Non-empty list of validated configurations and the index due next.
///
/// The index only moves when an action fires for the configuration it points
/// at, wrapping around at the end of the list.
#[derive(Debug, Clone)]
pub struct ConfigurationSet {
    configs: Vec<WatchConfig>,
    rotation_index: usize,
}

impl ConfigurationSet {
    /// Build a set, validating every configuration
    pub fn new(configs: Vec<WatchConfig>) -> Result<Self> {
        if configs.is_empty() {
            return Err(WatchError::config("at least one watch configuration is required"));
        }

        for (i, config) in configs.iter().enumerate() {
            config.validate().map_err(|e| match e {
                WatchError::Config(msg) => WatchError::Config(format!("configuration #{}: {}", i, msg)),
                other => other,
            })?;
        }

        Ok(Self {
            configs,
            rotation_index: 0,
        })
    }

    /// A set holding one configuration
    pub fn single(config: WatchConfig) -> Result<Self> {
        Self::new(vec![config])
    }

    /// Load every file in order; the first rejected file fails the whole set
    pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut configs = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let config = WatchConfig::load(path)?;
            log::info!(
                "Loaded '{}' from {} ({} states, threshold {}, every {} ms)",
                config.label(),
                path.display(),
                config.states.len(),
                config.similarity_threshold,
                config.interval_ms
            );
            configs.push(config);
        }
        Self::new(configs)
    }

    /// Configuration due for the next cycle
    pub fn active(&self) -> &WatchConfig {
        &self.configs[self.rotation_index]
    }

    pub fn rotation_index(&self) -> usize {
        self.rotation_index
    }

    /// Move to the next configuration, wrapping at the end
    pub fn advance(&mut self) -> usize {
        self.rotation_index = (self.rotation_index + 1) % self.configs.len();
        self.rotation_index
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WatchConfig> {
        self.configs.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchConfig> {
        self.configs.iter()
    }
}
