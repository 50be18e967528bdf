use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::AuthorizationError;
use crate::request::RequestHead;

/// Decides whether a principal holds a role.
///
/// Implementations that cannot decide should deny (`Ok(false)`). The error
/// channel exists for wrapping layers that need to surface a failure with
/// its original kind instead of silently denying.
#[async_trait]
pub trait Authorizer<P>: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AuthorizationError`] when the decision could not be made and
    /// the implementation chose to report it.
    async fn authorize(
        &self,
        principal: &P,
        role: &str,
        request: Option<&RequestHead<'_>>,
    ) -> Result<bool, AuthorizationError>;
}

#[async_trait]
impl<P, A> Authorizer<P> for Arc<A>
where
    P: Sync,
    A: Authorizer<P> + ?Sized,
{
    async fn authorize(
        &self,
        principal: &P,
        role: &str,
        request: Option<&RequestHead<'_>>,
    ) -> Result<bool, AuthorizationError> {
        (**self).authorize(principal, role, request).await
    }
}

/// Every authenticated principal holds every role.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitAllAuthorizer;

#[async_trait]
impl<P: Sync> Authorizer<P> for PermitAllAuthorizer {
    async fn authorize(
        &self,
        _principal: &P,
        _role: &str,
        _request: Option<&RequestHead<'_>>,
    ) -> Result<bool, AuthorizationError> {
        Ok(true)
    }
}
