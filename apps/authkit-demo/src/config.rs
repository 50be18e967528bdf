//! Demo configuration: YAML file plus `AUTHKIT__` environment overrides.

use std::path::Path;

use anyhow::Context;
use authkit::AuthConfig;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;
use static_auth_plugin::StaticAuthConfig;

/// Prefix for environment overrides. Nested keys are separated by `__`,
/// e.g. `AUTHKIT__AUTH__REALM`.
pub const ENV_PREFIX: &str = "AUTHKIT__";

fn default_bind_addr() -> String {
    "127.0.0.1:8087".to_owned()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemoConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub static_auth: StaticAuthConfig,
}

impl DemoConfig {
    /// # Errors
    ///
    /// Fails when `path` does not exist or the merged configuration does
    /// not deserialize.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            anyhow::ensure!(path.exists(), "config file {} not found", path.display());
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid demo configuration")
    }
}
