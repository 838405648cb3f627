use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use snafu::{ResultExt, Snafu};
use url::Url;

use crate::retry::RetryPolicy;

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("could not read the configuration from the environment: {source}"))]
    Environment { source: envy::Error },
}

/// Reads the configuration from environment variables (upper-cased field
/// names); `.env` files are loaded by the binary before this runs.
pub fn load() -> Result<Config, ConfigError> {
    envy::from_env().context(EnvironmentSnafu)
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(flatten)]
    pub surreal: SurrealConfig,

    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_course_dir")]
    pub course_dir: PathBuf,

    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SurrealConfig {
    #[serde(rename = "surreal_endpoint")]
    pub endpoint: Url,
    #[serde(rename = "surreal_namespace")]
    pub namespace: String,
    #[serde(rename = "surreal_database")]
    pub database: String,
    #[serde(rename = "surreal_username")]
    pub username: String,
    #[serde(rename = "surreal_password")]
    pub password: String,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/watch-state.json")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_course_dir() -> PathBuf {
    PathBuf::from("courses")
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_remote_timeout_ms() -> u64 {
    2000
}

fn default_reconcile_interval_secs() -> u64 {
    300
}
