//! Wires the static plugin into an auth filter and the demo routes.

use std::sync::Arc;

use authkit::{
    Auth, AuthChain, AuthFilter, AuthPolicy, Authenticator, Authorizer, BasicCredentials,
    BasicPrincipal, CachingAuthenticator, CachingAuthorizer, MaybeAuth, Principal, RouteTable,
    SecurityContext, TracingCacheMetrics,
};
use axum::{Extension, Json, Router, http::Method, routing::get};
use serde::Serialize;
use static_auth_plugin::{
    StaticBasicAuthenticator, StaticDirectory, StaticRoleAuthorizer, StaticTokenAuthenticator,
};

use crate::config::DemoConfig;

#[derive(Debug, Serialize)]
struct WhoAmI {
    principal: Option<String>,
    scheme: Option<String>,
    secure: bool,
}

async fn health() -> &'static str {
    "ok"
}

async fn whoami(Extension(ctx): Extension<SecurityContext<BasicPrincipal>>) -> Json<WhoAmI> {
    Json(WhoAmI {
        principal: ctx.principal().map(|p| p.name().to_owned()),
        scheme: ctx.authentication_scheme().map(str::to_owned),
        secure: ctx.is_secure(),
    })
}

async fn admin(Auth(principal): Auth<BasicPrincipal>) -> String {
    format!("Welcome to the admin area, {}.", principal.name())
}

async fn greeting(MaybeAuth(principal): MaybeAuth<BasicPrincipal>) -> String {
    match principal {
        Some(p) => format!("Hello, {}!", p.name()),
        None => "Hello, stranger!".to_owned(),
    }
}

fn routes() -> anyhow::Result<RouteTable> {
    Ok(RouteTable::new(Some(AuthPolicy::required()))
        .public(Method::GET, "/health")?
        .route(Method::GET, "/admin", AuthPolicy::role("ADMIN"))?
        .route(Method::GET, "/greeting", AuthPolicy::optional())?)
}

/// Build the filter described by `cfg`.
///
/// # Errors
///
/// Inconsistent static users/tokens or an invalid challenge.
pub fn build_filter(cfg: &DemoConfig) -> anyhow::Result<AuthFilter<BasicPrincipal>> {
    cfg.auth.validate()?;
    let directory = Arc::new(StaticDirectory::from_config(&cfg.static_auth)?);

    let basic: Arc<dyn Authenticator<BasicCredentials, BasicPrincipal>> =
        match &cfg.auth.authentication_cache {
            Some(spec) => {
                tracing::info!(%spec, "Caching authentication results");
                Arc::new(
                    CachingAuthenticator::<BasicCredentials, BasicPrincipal>::new(
                        StaticBasicAuthenticator::new(directory.clone()),
                        spec,
                    )
                    .with_metrics(Arc::new(TracingCacheMetrics)),
                )
            }
            None => Arc::new(StaticBasicAuthenticator::new(directory.clone())),
        };

    let roles: Arc<dyn Authorizer<BasicPrincipal>> = match &cfg.auth.authorization_cache {
        Some(spec) => {
            tracing::info!(%spec, "Caching authorization decisions");
            Arc::new(
                CachingAuthorizer::<BasicPrincipal>::new(
                    StaticRoleAuthorizer::new(directory.clone()),
                    spec,
                )
                .with_metrics(Arc::new(TracingCacheMetrics)),
            )
        }
        None => Arc::new(StaticRoleAuthorizer::new(directory.clone())),
    };

    let chain = AuthChain::builder()
        .link_with_challenge(cfg.auth.basic_extractor(), basic, &cfg.auth.realm)
        .link_with_challenge(
            cfg.auth.bearer_extractor(),
            StaticTokenAuthenticator::new(directory),
            &cfg.auth.realm,
        )
        .build()?;

    Ok(AuthFilter::builder(chain)
        .authorizer(roles)
        .unauthorized_handler(cfg.auth.unauthorized_format)
        .build()?)
}

/// # Errors
///
/// See [`build_filter`].
pub fn router(cfg: &DemoConfig) -> anyhow::Result<Router> {
    let filter = build_filter(cfg)?;
    Ok(Router::new()
        .route("/health", get(health))
        .route("/whoami", get(whoami))
        .route("/admin", get(admin))
        .route("/greeting", get(greeting))
        .layer(filter.layer(routes()?)))
}
