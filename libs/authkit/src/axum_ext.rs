//! Axum extractors and middleware for auth

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use authkit_security::{Principal, SecurityContext};
use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{HeaderMap, Method, request::Parts},
    response::{IntoResponse, Response},
};
use http::StatusCode;
use tower::{Layer, Service};

use crate::errors::AuthRejection;
use crate::filter::AuthFilter;
use crate::handlers::{Challenge, Problem};
use crate::policy::{AuthPolicy, RouteResolver};
use crate::request::RequestHead;

impl<P: Principal> AuthFilter<P> {
    /// Middleware that picks the policy per request through `resolver`.
    ///
    /// # Example
    /// ```ignore
    /// router = router.layer(filter.layer(route_table));
    /// ```
    #[must_use]
    pub fn layer(&self, resolver: impl RouteResolver) -> AuthLayer<P> {
        AuthLayer {
            state: Arc::new(LayerState {
                filter: self.clone(),
                resolver: Arc::new(resolver),
            }),
        }
    }

    /// Middleware with one fixed policy, for `MethodRouter::route_layer`.
    #[must_use]
    pub fn route_layer(&self, policy: AuthPolicy) -> AuthLayer<P> {
        self.layer(policy)
    }
}

/// Extractor for the authenticated principal. Rejects with 401 when the
/// request is anonymous.
#[derive(Debug, Clone)]
pub struct Auth<P>(pub P);

impl<S, P> FromRequestParts<S> for Auth<P>
where
    S: Send + Sync,
    P: Principal,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = security_context::<P>(parts)?;
        match ctx.principal() {
            Some(principal) => Ok(Self(principal.clone())),
            None => {
                let challenge = parts
                    .extensions
                    .get::<Challenge>()
                    .cloned()
                    .unwrap_or_default();
                Err(AuthRejection::Unauthorized(challenge).into_response())
            }
        }
    }
}

/// Extractor for routes where authentication is optional.
#[derive(Debug, Clone)]
pub struct MaybeAuth<P>(pub Option<P>);

impl<S, P> FromRequestParts<S> for MaybeAuth<P>
where
    S: Send + Sync,
    P: Principal,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(security_context::<P>(parts)?.principal().cloned()))
    }
}

fn security_context<P: Principal>(parts: &Parts) -> Result<&SecurityContext<P>, Response> {
    parts.extensions.get::<SecurityContext<P>>().ok_or_else(|| {
        tracing::error!("SecurityContext not found - auth middleware not configured");
        Problem::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
            "SecurityContext not found - auth middleware not configured",
        )
        .into_response()
    })
}

struct LayerState<P> {
    filter: AuthFilter<P>,
    resolver: Arc<dyn RouteResolver>,
}

/// Layer that runs the auth pipeline in front of the wrapped service.
pub struct AuthLayer<P> {
    state: Arc<LayerState<P>>,
}

impl<P> Clone for AuthLayer<P> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<S, P> Layer<S> for AuthLayer<P> {
    type Service = AuthService<S, P>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            state: self.state.clone(),
        }
    }
}

/// Binds a [`SecurityContext`] to every request it lets through.
pub struct AuthService<S, P> {
    inner: S,
    state: Arc<LayerState<P>>,
}

impl<S: Clone, P> Clone for AuthService<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            state: self.state.clone(),
        }
    }
}

impl<S, P> Service<Request<Body>> for AuthService<S, P>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    P: Principal,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let state = self.state.clone();
        let not_ready_inner = self.inner.clone();
        let mut ready_inner = std::mem::replace(&mut self.inner, not_ready_inner);

        Box::pin(async move {
            let policy = if is_preflight_request(request.method(), request.headers()) {
                None
            } else {
                state
                    .resolver
                    .resolve(request.method(), request.uri().path())
            };

            let Some(policy) = policy else {
                request
                    .extensions_mut()
                    .insert(SecurityContext::<P>::anonymous());
                return ready_inner.call(request).await;
            };

            let outcome = {
                let head = RequestHead::from_request(&request);
                state.filter.evaluate(&head, &policy).await
            };

            match outcome {
                Ok(ctx) => {
                    let challenge = state.filter.chain().challenge().clone();
                    request.extensions_mut().insert(challenge);
                    request.extensions_mut().insert(ctx);
                    ready_inner.call(request).await
                }
                Err(rejection) => Ok(state.filter.reject(&rejection)),
            }
        })
    }
}

/// Check if this is a CORS preflight request
///
/// Preflight requests are OPTIONS requests with:
/// - Origin header present
/// - Access-Control-Request-Method header present
fn is_preflight_request(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::OPTIONS
        && headers.contains_key(axum::http::header::ORIGIN)
        && headers.contains_key(axum::http::header::ACCESS_CONTROL_REQUEST_METHOD)
}


// Pipeline behaviour behind a Router is covered in tests/middleware.rs.
