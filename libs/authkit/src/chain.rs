//! Ordered fallback across several authentication schemes.
//!
//! Links are tried in registration order. A link whose extractor finds
//! nothing is skipped. The first link that authenticates wins and later
//! links are never consulted. A verification error does not stop the walk:
//! the first error is remembered and reported only if no later link
//! authenticates.

use async_trait::async_trait;

use crate::authenticator::Authenticator;
use crate::errors::{AuthenticationError, ConfigError};
use crate::extract::CredentialExtractor;
use crate::handlers::{Challenge, DEFAULT_REALM};
use crate::request::RequestHead;

/// Outcome of running a request through an [`AuthChain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<P> {
    Authenticated { principal: P, scheme: String },
    /// No link produced a principal and none of them failed.
    NotAuthenticated,
    /// No link produced a principal and at least one failed. Carries the first failure.
    Failed(AuthenticationError),
}

/// One extractor paired with the authenticator for its credentials, with the
/// credential type erased.
#[async_trait]
trait AuthScheme<P>: Send + Sync {
    fn scheme(&self) -> &str;

    fn challenge(&self) -> &Challenge;

    /// `None` when the request carries no credentials for this scheme.
    async fn attempt(
        &self,
        head: &RequestHead<'_>,
    ) -> Option<Result<Option<P>, AuthenticationError>>;
}

struct Link<E, A> {
    extractor: E,
    authenticator: A,
    challenge: Challenge,
}

#[async_trait]
impl<E, A, P> AuthScheme<P> for Link<E, A>
where
    E: CredentialExtractor,
    A: Authenticator<E::Credentials, P> + 'static,
    P: Send + 'static,
{
    fn scheme(&self) -> &str {
        self.extractor.scheme()
    }

    fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    async fn attempt(
        &self,
        head: &RequestHead<'_>,
    ) -> Option<Result<Option<P>, AuthenticationError>> {
        let credentials = self.extractor.extract(head)?;
        Some(self.authenticator.authenticate(&credentials).await)
    }
}

pub struct AuthChain<P> {
    links: Vec<Box<dyn AuthScheme<P>>>,
    challenge: Challenge,
}

impl<P: Send + 'static> std::fmt::Debug for AuthChain<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthChain")
            .field("schemes", &self.schemes())
            .field("challenge", &self.challenge)
            .finish()
    }
}

impl<P: Send + 'static> AuthChain<P> {
    #[must_use]
    pub fn builder() -> AuthChainBuilder<P> {
        AuthChainBuilder::default()
    }

    /// Scheme identities in registration order.
    #[must_use]
    pub fn schemes(&self) -> Vec<&str> {
        self.links.iter().map(|link| link.scheme()).collect()
    }

    /// Challenge of the first link, sent with every 401.
    #[must_use]
    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    pub async fn resolve(&self, head: &RequestHead<'_>) -> Resolution<P> {
        let mut first_error = None;

        for link in &self.links {
            let scheme = link.scheme();
            match link.attempt(head).await {
                None => {}
                Some(Ok(Some(principal))) => {
                    tracing::debug!(scheme, "Request authenticated");
                    return Resolution::Authenticated {
                        principal,
                        scheme: scheme.to_owned(),
                    };
                }
                Some(Ok(None)) => {
                    tracing::debug!(scheme, "Credentials matched no principal");
                }
                Some(Err(err)) => {
                    tracing::error!(scheme, error = %err, "Authentication failed");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        first_error.map_or(Resolution::NotAuthenticated, Resolution::Failed)
    }
}

pub struct AuthChainBuilder<P> {
    links: Vec<Box<dyn AuthScheme<P>>>,
    error: Option<ConfigError>,
}

impl<P> Default for AuthChainBuilder<P> {
    fn default() -> Self {
        Self {
            links: Vec::new(),
            error: None,
        }
    }
}

impl<P: Send + 'static> AuthChainBuilder<P> {
    /// Append a scheme that challenges with the default realm.
    #[must_use]
    pub fn link<E, A>(self, extractor: E, authenticator: A) -> Self
    where
        E: CredentialExtractor,
        A: Authenticator<E::Credentials, P> + 'static,
    {
        self.link_with_challenge(extractor, authenticator, DEFAULT_REALM)
    }

    /// Append a scheme whose 401 challenge uses `realm`. The challenge prefix
    /// is the extractor's scheme prefix.
    #[must_use]
    pub fn link_with_challenge<E, A>(
        mut self,
        extractor: E,
        authenticator: A,
        realm: impl Into<String>,
    ) -> Self
    where
        E: CredentialExtractor,
        A: Authenticator<E::Credentials, P> + 'static,
    {
        if self.error.is_some() {
            return self;
        }

        let scheme = extractor.scheme();
        if self
            .links
            .iter()
            .any(|link| link.scheme().eq_ignore_ascii_case(scheme))
        {
            self.error = Some(ConfigError::DuplicateScheme(scheme.to_owned()));
            return self;
        }

        match Challenge::new(scheme, realm) {
            Ok(challenge) => self.links.push(Box::new(Link {
                extractor,
                authenticator,
                challenge,
            })),
            Err(err) => self.error = Some(err),
        }
        self
    }

    /// # Errors
    ///
    /// The first misconfiguration seen while linking, or
    /// [`ConfigError::EmptyChain`] when nothing was linked.
    pub fn build(self) -> Result<AuthChain<P>, ConfigError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let challenge = self
            .links
            .first()
            .map(|link| link.challenge().clone())
            .ok_or(ConfigError::EmptyChain)?;
        Ok(AuthChain {
            links: self.links,
            challenge,
        })
    }
}
