//! Client configuration.
//!
//! [`Config::from_env`] layers `DATAFETCH_*` environment variables over the
//! built-in defaults. [`Config::defaults`] returns the defaults without
//! reading the environment.

use serde::Deserialize;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Prefix of the environment variables read by [`Config::from_env`].
pub const ENV_PREFIX: &str = "DATAFETCH";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Backend base URL, set with `DATAFETCH_API_BASE_URL`.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(config::Environment::with_prefix(ENV_PREFIX))
    }

    pub fn defaults() -> Self {
        Self {
            api_base_url: default_api_base_url(),
        }
    }

    fn load(env: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("api_base_url", DEFAULT_API_BASE_URL)?
            .add_source(env)
            .build()?
            .try_deserialize()
    }
}
