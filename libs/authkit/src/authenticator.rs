use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::AuthenticationError;

/// Verifies credentials.
///
/// The three outcomes are distinct and every caller must keep them apart:
///
/// - `Ok(Some(principal))` - the credentials identify `principal`
/// - `Ok(None)` - well-formed credentials that match nobody (wrong password,
///   unknown token); a normal negative result
/// - `Err(_)` - verification could not complete (e.g. identity store down);
///   fatal for the request, never treated as "unauthenticated"
///
/// Implementations may block on I/O; the pipeline imposes no timeout.
#[async_trait]
pub trait Authenticator<C, P>: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AuthenticationError`] when verification itself fails.
    async fn authenticate(&self, credentials: &C) -> Result<Option<P>, AuthenticationError>;
}

#[async_trait]
impl<C, P, A> Authenticator<C, P> for Arc<A>
where
    C: Sync,
    A: Authenticator<C, P> + ?Sized,
{
    async fn authenticate(&self, credentials: &C) -> Result<Option<P>, AuthenticationError> {
        (**self).authenticate(credentials).await
    }
}
