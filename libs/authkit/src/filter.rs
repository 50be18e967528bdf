//! The per-request decision: authenticate, authorize, bind.

use std::sync::Arc;

use authkit_security::{Principal, SecurityContext};
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use crate::authenticator::Authenticator;
use crate::authorizer::{Authorizer, PermitAllAuthorizer};
use crate::chain::{AuthChain, Resolution};
use crate::credentials::{BasicCredentials, BearerToken};
use crate::errors::{AuthRejection, ConfigError};
use crate::extract::{BasicExtractor, BearerExtractor};
use crate::handlers::{
    DefaultForbiddenHandler, DefaultUnauthorizedHandler, ForbiddenHandler, Problem,
    UnauthorizedHandler,
};
use crate::policy::AuthPolicy;
use crate::request::RequestHead;

struct FilterInner<P> {
    chain: AuthChain<P>,
    authorizer: Arc<dyn Authorizer<P>>,
    unauthorized: Arc<dyn UnauthorizedHandler>,
    forbidden: Arc<dyn ForbiddenHandler>,
}

/// Authentication chain, authorizer and denial responses for one API.
///
/// Cheap to clone; every clone shares the same chain and caches.
pub struct AuthFilter<P> {
    inner: Arc<FilterInner<P>>,
}

impl<P> Clone for AuthFilter<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Principal> std::fmt::Debug for AuthFilter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFilter")
            .field("chain", &self.inner.chain)
            .finish_non_exhaustive()
    }
}

impl<P: Principal> AuthFilter<P> {
    #[must_use]
    pub fn builder(chain: AuthChain<P>) -> AuthFilterBuilder<P> {
        AuthFilterBuilder::new(Ok(chain))
    }

    /// HTTP Basic with the default `Basic realm="realm"` challenge.
    #[must_use]
    pub fn basic(
        authenticator: impl Authenticator<BasicCredentials, P> + 'static,
    ) -> AuthFilterBuilder<P> {
        AuthFilterBuilder::new(
            AuthChain::builder()
                .link(BasicExtractor::new(), authenticator)
                .build(),
        )
    }

    /// Bearer token from the header or the `access_token` query parameter.
    #[must_use]
    pub fn bearer(
        authenticator: impl Authenticator<BearerToken, P> + 'static,
    ) -> AuthFilterBuilder<P> {
        AuthFilterBuilder::new(
            AuthChain::builder()
                .link(BearerExtractor::new(), authenticator)
                .build(),
        )
    }

    #[must_use]
    pub fn chain(&self) -> &AuthChain<P> {
        &self.inner.chain
    }

    /// Run the pipeline for one request under `policy`.
    ///
    /// # Errors
    ///
    /// The [`AuthRejection`] that should be sent instead of calling the handler.
    #[tracing::instrument(
        skip_all,
        fields(method = %head.method, path = head.uri.path(), required = policy.required)
    )]
    pub async fn evaluate(
        &self,
        head: &RequestHead<'_>,
        policy: &AuthPolicy,
    ) -> Result<SecurityContext<P>, AuthRejection> {
        let mut context = SecurityContext::builder().secure(head.is_secure());

        let principal = match self.inner.chain.resolve(head).await {
            Resolution::Authenticated { principal, scheme } => {
                context = context
                    .principal(principal.clone())
                    .authentication_scheme(&scheme);
                Some(principal)
            }
            Resolution::NotAuthenticated if policy.required => {
                tracing::debug!("Missing or unusable credentials");
                return Err(AuthRejection::Unauthorized(
                    self.inner.chain.challenge().clone(),
                ));
            }
            Resolution::NotAuthenticated => None,
            Resolution::Failed(err) => return Err(AuthRejection::AuthenticationFailed(err)),
        };

        if !policy.roles.is_empty() {
            let Some(principal) = principal else {
                tracing::debug!(
                    roles = ?policy.roles,
                    "Anonymous request for role-restricted route"
                );
                return Err(AuthRejection::Forbidden);
            };
            if !self.authorize_any(&principal, &policy.roles, head).await? {
                tracing::debug!(
                    principal = principal.name(),
                    roles = ?policy.roles,
                    "Principal holds none of the required roles"
                );
                return Err(AuthRejection::Forbidden);
            }
        }

        Ok(context.build())
    }

    async fn authorize_any(
        &self,
        principal: &P,
        roles: &[String],
        head: &RequestHead<'_>,
    ) -> Result<bool, AuthRejection> {
        for role in roles {
            match self
                .inner
                .authorizer
                .authorize(principal, role, Some(head))
                .await
            {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(
                        principal = principal.name(),
                        role,
                        error = %err,
                        "Authorization failed"
                    );
                    return Err(err.into());
                }
            }
        }
        Ok(false)
    }

    /// Render a rejection with this filter's handlers.
    #[must_use]
    pub fn reject(&self, rejection: &AuthRejection) -> Response {
        match rejection {
            AuthRejection::Unauthorized(challenge) => self
                .inner
                .unauthorized
                .build_response(challenge.prefix(), challenge.realm()),
            AuthRejection::Forbidden => self.inner.forbidden.build_response(),
            AuthRejection::AuthenticationFailed(_) | AuthRejection::AuthorizationFailed(_) => {
                internal_error(rejection)
            }
        }
    }
}

fn internal_error(rejection: &AuthRejection) -> Response {
    let detail = match rejection {
        AuthRejection::AuthorizationFailed(_) => "Authorization backend failure",
        _ => "Authentication backend failure",
    };
    Problem::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error",
        detail,
    )
    .into_response()
}

/// Rendered with the default handlers. Use [`AuthFilter::reject`] to honour
/// a filter's custom handlers.
impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match &self {
            Self::Unauthorized(challenge) => {
                DefaultUnauthorizedHandler.build_response(challenge.prefix(), challenge.realm())
            }
            Self::Forbidden => DefaultForbiddenHandler.build_response(),
            Self::AuthenticationFailed(_) | Self::AuthorizationFailed(_) => internal_error(&self),
        }
    }
}

pub struct AuthFilterBuilder<P> {
    chain: Result<AuthChain<P>, ConfigError>,
    authorizer: Arc<dyn Authorizer<P>>,
    unauthorized: Arc<dyn UnauthorizedHandler>,
    forbidden: Arc<dyn ForbiddenHandler>,
}

impl<P: Principal> AuthFilterBuilder<P> {
    fn new(chain: Result<AuthChain<P>, ConfigError>) -> Self {
        Self {
            chain,
            authorizer: Arc::new(PermitAllAuthorizer),
            unauthorized: Arc::new(DefaultUnauthorizedHandler),
            forbidden: Arc::new(DefaultForbiddenHandler),
        }
    }

    #[must_use]
    pub fn authorizer(mut self, authorizer: impl Authorizer<P> + 'static) -> Self {
        self.authorizer = Arc::new(authorizer);
        self
    }

    #[must_use]
    pub fn unauthorized_handler(mut self, handler: impl UnauthorizedHandler) -> Self {
        self.unauthorized = Arc::new(handler);
        self
    }

    #[must_use]
    pub fn forbidden_handler(mut self, handler: impl ForbiddenHandler) -> Self {
        self.forbidden = Arc::new(handler);
        self
    }

    /// # Errors
    ///
    /// Propagates the chain's [`ConfigError`].
    pub fn build(self) -> Result<AuthFilter<P>, ConfigError> {
        Ok(AuthFilter {
            inner: Arc::new(FilterInner {
                chain: self.chain?,
                authorizer: self.authorizer,
                unauthorized: self.unauthorized,
                forbidden: self.forbidden,
            }),
        })
    }
}
