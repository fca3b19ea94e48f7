use std::path::Path;
use std::time::Duration;

use config::{Environment, File, FileFormat};
use serde::Deserialize;

use crate::common::error::ConfigError;

pub const DEFAULT_LISTEN_ADDRESS: &str = ":8080";
pub const DEFAULT_API_VERSION: &str = "v0.0.38";
pub const DEFAULT_UPDATE_INTERVAL: &str = "5m";
pub const ENV_PREFIX: &str = "SLURM_SD";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub slurm_api_endpoint: String,
    pub slurm_api_version: String,
    #[serde(default)]
    pub slurm_api_username: Option<String>,
    #[serde(default)]
    pub slurm_api_token: Option<String>,
    pub listen_address: String,
    pub update_interval: String,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

/// A scrape target class: every node is exposed once per job on `port`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub port: u16,
}

/// Values given on the command line. Empty values leave the file setting alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub listen_address: Option<String>,
    pub slurm_api_endpoint: Option<String>,
    pub slurm_api_version: Option<String>,
    pub slurm_api_username: Option<String>,
    pub slurm_api_token: Option<String>,
    pub update_interval: Option<String>,
}

fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Ok(config::Config::builder()
        .set_default("listen_address", DEFAULT_LISTEN_ADDRESS)?
        .set_default("slurm_api_version", DEFAULT_API_VERSION)?
        .set_default("update_interval", DEFAULT_UPDATE_INTERVAL)?)
}

/// Loads the YAML file at `path`, then applies `SLURM_SD_*` environment variables on top.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let settings = builder()?
        .add_source(File::from(path.as_ref()).format(FileFormat::Yaml))
        .add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("_"))
        .build()?;

    let mut config: Config = settings.try_deserialize()?;
    config.normalize();
    Ok(config)
}

/// Parses a YAML document without consulting the environment.
pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let settings = builder()?
        .add_source(File::from_str(content, FileFormat::Yaml))
        .build()?;

    let mut config: Config = settings.try_deserialize()?;
    config.normalize();
    Ok(config)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl Config {
    fn normalize(&mut self) {
        self.slurm_api_username = non_empty(self.slurm_api_username.take());
        self.slurm_api_token = non_empty(self.slurm_api_token.take());
        if self.slurm_api_version.is_empty() {
            self.slurm_api_version = DEFAULT_API_VERSION.to_string();
        }
        if self.listen_address.is_empty() {
            self.listen_address = DEFAULT_LISTEN_ADDRESS.to_string();
        }
        if self.update_interval.is_empty() {
            self.update_interval = DEFAULT_UPDATE_INTERVAL.to_string();
        }
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(v) = non_empty(overrides.listen_address) {
            self.listen_address = v;
        }
        if let Some(v) = non_empty(overrides.slurm_api_endpoint) {
            self.slurm_api_endpoint = v;
        }
        if let Some(v) = non_empty(overrides.slurm_api_version) {
            self.slurm_api_version = v;
        }
        if let Some(v) = non_empty(overrides.slurm_api_username) {
            self.slurm_api_username = Some(v);
        }
        if let Some(v) = non_empty(overrides.slurm_api_token) {
            self.slurm_api_token = Some(v);
        }
        if let Some(v) = non_empty(overrides.update_interval) {
            self.update_interval = v;
        }
    }

    /// Checks everything the process needs before it starts serving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slurm_api_endpoint.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        self.interval()?;
        self.listen_addr()?;
        Ok(())
    }

    pub fn interval(&self) -> Result<Duration, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidInterval {
            value: self.update_interval.clone(),
            reason,
        };

        let interval = humantime::parse_duration(&self.update_interval)
            .map_err(|e| invalid(e.to_string()))?;
        if interval.is_zero() {
            return Err(invalid("must be greater than zero".to_string()));
        }
        Ok(interval)
    }

    /// Address handed to the listener. `":8080"` binds every interface, the same as
    /// `"0.0.0.0:8080"`; host names are resolved at bind time.
    pub fn listen_addr(&self) -> Result<String, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidListenAddress {
            value: self.listen_address.clone(),
            reason: reason.to_string(),
        };

        let addr = if self.listen_address.starts_with(':') {
            format!("0.0.0.0{}", self.listen_address)
        } else {
            self.listen_address.clone()
        };

        let (host, port) = addr.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
        Ok(addr)
    }
}
