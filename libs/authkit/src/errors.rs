//! Error types for the auth pipeline.
//!
//! Negative outcomes that the pipeline handles itself (missing credentials,
//! unknown credentials, denied role) never show up here as errors of the
//! verification step; they surface only as an [`AuthRejection`] once the
//! pipeline has made its decision.

use http::StatusCode;
use thiserror::Error;

use crate::handlers::Challenge;

/// The credential verification process itself failed.
///
/// Fatal for the current request and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    /// The identity store or upstream provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    /// Any other failure while verifying credentials.
    #[error("internal authentication error: {0}")]
    Internal(String),
}

/// An authorizer could not reach a decision and chose to surface it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("authorization backend unavailable: {0}")]
    Unavailable(String),

    #[error("internal authorization error: {0}")]
    Internal(String),
}

/// Startup-time misconfiguration. Never produced while serving requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("auth chain must contain at least one scheme")]
    EmptyChain,

    #[error("auth scheme '{0}' is registered more than once in the chain")]
    DuplicateScheme(String),

    #[error("challenge {field} must be a non-empty header-safe string")]
    MissingChallengeField { field: &'static str },

    #[error("invalid cache spec '{spec}': {reason}")]
    InvalidCacheSpec { spec: String, reason: String },

    #[error("invalid route pattern '{path}': {reason}")]
    InvalidRoute { path: String, reason: String },
}

/// Terminal denial produced by the decision pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthRejection {
    /// No usable credentials on a route that requires them.
    #[error("credentials are required to access this resource")]
    Unauthorized(Challenge),

    /// The principal (if any) lacks every role the route accepts.
    #[error("principal is not authorized for this resource")]
    Forbidden,

    #[error(transparent)]
    AuthenticationFailed(#[from] AuthenticationError),

    #[error(transparent)]
    AuthorizationFailed(#[from] AuthorizationError),
}

impl AuthRejection {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::AuthenticationFailed(_) | Self::AuthorizationFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
