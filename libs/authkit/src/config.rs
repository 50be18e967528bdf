use axum::response::Response;
use serde::Deserialize;

use crate::cache::CacheSpec;
use crate::errors::ConfigError;
use crate::extract::{BASIC_PREFIX, BEARER_PREFIX, BasicExtractor, BearerExtractor};
use crate::handlers::{
    Challenge, DEFAULT_REALM, DefaultUnauthorizedHandler, JsonUnauthorizedHandler,
    UnauthorizedHandler,
};

fn default_realm() -> String {
    DEFAULT_REALM.to_owned()
}

fn default_prefix() -> String {
    BASIC_PREFIX.to_owned()
}

fn default_bearer_prefix() -> String {
    BEARER_PREFIX.to_owned()
}

/// Body format of 401 responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnauthorizedFormat {
    #[default]
    Plain,
    Json,
}

impl UnauthorizedHandler for UnauthorizedFormat {
    fn build_response(&self, prefix: &str, realm: &str) -> Response {
        match self {
            Self::Plain => DefaultUnauthorizedHandler.build_response(prefix, realm),
            Self::Json => JsonUnauthorizedHandler.build_response(prefix, realm),
        }
    }
}

/// Auth settings as they appear in the service configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AuthConfig {
    /// Realm advertised in `WWW-Authenticate`.
    pub realm: String,
    /// Scheme prefix for HTTP Basic.
    pub prefix: String,
    /// Scheme prefix for bearer tokens.
    pub bearer_prefix: String,
    pub unauthorized_format: UnauthorizedFormat,
    /// Absent means authentication results are not cached.
    pub authentication_cache: Option<CacheSpec>,
    /// Absent means authorization decisions are not cached.
    pub authorization_cache: Option<CacheSpec>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            realm: default_realm(),
            prefix: default_prefix(),
            bearer_prefix: default_bearer_prefix(),
            unauthorized_format: UnauthorizedFormat::default(),
            authentication_cache: None,
            authorization_cache: None,
        }
    }
}

impl AuthConfig {
    /// # Errors
    ///
    /// [`ConfigError::MissingChallengeField`] for an empty realm or prefix,
    /// [`ConfigError::InvalidCacheSpec`] for an out-of-range cache spec.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Challenge::new(&self.prefix, &self.realm)?;
        Challenge::new(&self.bearer_prefix, &self.realm)?;
        for spec in [&self.authentication_cache, &self.authorization_cache]
            .into_iter()
            .flatten()
        {
            spec.validate()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn basic_extractor(&self) -> BasicExtractor {
        BasicExtractor::with_prefix(&self.prefix)
    }

    #[must_use]
    pub fn bearer_extractor(&self) -> BearerExtractor {
        BearerExtractor::with_prefix(&self.bearer_prefix)
    }
}
