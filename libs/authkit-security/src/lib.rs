#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Identity types shared by the authkit pipeline and request handlers.
//!
//! - [`Principal`] - contract every authenticated identity satisfies
//! - [`BasicPrincipal`] - name-only principal used by the stock authenticators
//! - [`SecurityContext`] - request-scoped binding of the (optional) principal

pub mod context;
pub mod principal;

pub use context::SecurityContext;
pub use principal::{BasicPrincipal, Principal};
