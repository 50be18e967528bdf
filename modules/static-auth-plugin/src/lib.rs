#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Static authentication plugin
//!
//! Users, passwords, roles and bearer tokens come straight from
//! configuration. Meant for development, demos and end-to-end tests.
//!
//! ## Configuration
//!
//! ```yaml
//! users:
//!   - username: good-guy
//!     password: secret
//!     roles: [ADMIN]
//!   - username: ordinary-guy
//!     password: secret
//! tokens:
//!   - token: good-guy-token
//!     username: good-guy
//! ```

pub mod config;
pub mod domain;

pub use config::{StaticAuthConfig, TokenEntry, UserEntry};
pub use domain::error::StaticAuthError;
pub use domain::service::{
    StaticBasicAuthenticator, StaticDirectory, StaticRoleAuthorizer, StaticTokenAuthenticator,
};
