// src/config.rs

//! Manages server configuration: loading, defaults, and validation.

use crate::core::protocol::packet::DEFAULT_MAX_BODY_LEN;
use crate::core::storage::vbucket::{DEFAULT_NUM_VBUCKETS, VbucketMap};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;

/// Storage layout: how many vbuckets exist and which of them this node owns.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_num_vbuckets")]
    pub num_vbuckets: u16,
    /// Vbuckets served by this node. All of them when absent.
    #[serde(default)]
    pub owned_vbuckets: Option<Vec<u16>>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            num_vbuckets: default_num_vbuckets(),
            owned_vbuckets: None,
        }
    }
}

impl StorageConfig {
    /// The ownership map this configuration describes.
    pub fn vbucket_map(&self) -> VbucketMap {
        match &self.owned_vbuckets {
            Some(owned) => VbucketMap::with_owned(self.num_vbuckets, owned),
            None => VbucketMap::all(self.num_vbuckets),
        }
    }
}

/// The fully validated server configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    /// `0` binds an ephemeral port.
    pub port: u16,
    pub log_level: String,
    pub max_clients: usize,
    /// Largest request body accepted before the connection is dropped.
    pub max_packet_size: usize,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            max_packet_size: default_max_packet_size(),
            storage: StorageConfig::default(),
        }
    }
}

/// A raw representation of the config file before validation.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_max_clients")]
    max_clients: usize,
    #[serde(default = "default_max_packet_size")]
    max_packet_size: usize,
    #[serde(default)]
    storage: StorageConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    11210
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    10000
}
fn default_max_packet_size() -> usize {
    DEFAULT_MAX_BODY_LEN
}
fn default_num_vbuckets() -> u16 {
    DEFAULT_NUM_VBUCKETS
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config in '{path}'"))
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents).context("Failed to parse TOML")?;

        let config = Config {
            host: raw.host,
            port: raw.port,
            log_level: raw.log_level,
            max_clients: raw.max_clients,
            max_packet_size: raw.max_packet_size,
            storage: raw.storage,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.max_packet_size == 0 {
            return Err(anyhow!("max_packet_size cannot be 0"));
        }
        if self.storage.num_vbuckets == 0 {
            return Err(anyhow!("storage.num_vbuckets cannot be 0"));
        }
        if let Some(owned) = &self.storage.owned_vbuckets {
            if owned.is_empty() {
                return Err(anyhow!("storage.owned_vbuckets cannot be empty"));
            }
            if let Some(vb) = owned.iter().find(|vb| **vb >= self.storage.num_vbuckets) {
                return Err(anyhow!(
                    "storage.owned_vbuckets contains {} but only {} vbuckets exist",
                    vb,
                    self.storage.num_vbuckets
                ));
            }
        }
        Ok(())
    }
}
