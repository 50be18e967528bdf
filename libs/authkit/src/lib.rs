#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Authentication and authorization for axum services.
//!
//! A request passes through an [`AuthFilter`]: its [`AuthChain`] extracts
//! credentials and authenticates them scheme by scheme, the [`Authorizer`]
//! checks the roles the route's [`AuthPolicy`] asks for, and the outcome is
//! bound to the request as a [`SecurityContext`]. Denials become 401, 403 or
//! 500 responses.
//!
//! [`CachingAuthenticator`] and [`CachingAuthorizer`] put a bounded,
//! expiring cache in front of slow identity stores.

pub mod authenticator;
pub mod authorizer;
pub mod axum_ext;
pub mod cache;
pub mod caching_authenticator;
pub mod caching_authorizer;
pub mod chain;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod extract;
pub mod filter;
pub mod handlers;
pub mod metrics;
pub mod policy;
pub mod request;

pub use authenticator::Authenticator;
pub use authorizer::{Authorizer, PermitAllAuthorizer};
pub use axum_ext::{Auth, AuthLayer, AuthService, MaybeAuth};
pub use cache::{CacheSpec, CacheStats};
pub use caching_authenticator::CachingAuthenticator;
pub use caching_authorizer::CachingAuthorizer;
pub use chain::{AuthChain, AuthChainBuilder, Resolution};
pub use config::{AuthConfig, UnauthorizedFormat};
pub use credentials::{BasicCredentials, BearerToken};
pub use errors::{AuthRejection, AuthenticationError, AuthorizationError, ConfigError};
pub use extract::{BasicExtractor, BearerExtractor, CredentialExtractor};
pub use filter::{AuthFilter, AuthFilterBuilder};
pub use handlers::{
    Challenge, DefaultForbiddenHandler, DefaultUnauthorizedHandler, ForbiddenHandler,
    JsonUnauthorizedHandler, UnauthorizedHandler,
};
pub use metrics::{CacheMetrics, NoopCacheMetrics, TracingCacheMetrics};
pub use policy::{AuthPolicy, RouteResolver, RouteTable};
pub use request::RequestHead;

pub use authkit_security::{BasicPrincipal, Principal, SecurityContext};
