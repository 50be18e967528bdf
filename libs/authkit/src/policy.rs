//! Per-route authentication requirements.

use std::collections::HashMap;

use http::Method;

use crate::errors::ConfigError;

/// What a route demands of the caller.
///
/// `roles` are alternatives: holding any one of them is enough.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthPolicy {
    pub required: bool,
    pub roles: Vec<String>,
}

impl AuthPolicy {
    /// Credentials must be present and valid.
    #[must_use]
    pub fn required() -> Self {
        Self {
            required: true,
            roles: Vec::new(),
        }
    }

    /// Credentials are used when present; otherwise the handler runs anonymously.
    #[must_use]
    pub fn optional() -> Self {
        Self::default()
    }

    /// Credentials are required and the principal must hold `role`.
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self::required().with_role(role)
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }
}

/// Chooses the policy for a request.
///
/// `None` marks the route public: the pipeline does not run and the handler
/// sees an anonymous context.
pub trait RouteResolver: Send + Sync + 'static {
    fn resolve(&self, method: &Method, path: &str) -> Option<AuthPolicy>;
}

impl RouteResolver for AuthPolicy {
    fn resolve(&self, _method: &Method, _path: &str) -> Option<AuthPolicy> {
        Some(self.clone())
    }
}

/// Convert Axum path syntax `:param` to matchit syntax `{param}`.
fn convert_axum_path_to_matchit(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == ':' {
            result.push('{');
            while let Some(c) = chars.next_if(|c| c.is_alphanumeric() || *c == '_') {
                result.push(c);
            }
            result.push('}');
        } else {
            result.push(ch);
        }
    }

    result
}

/// Policies keyed by method and path pattern, with a fallback for
/// everything unregistered.
///
/// Patterns accept both `/users/:id` and `/users/{id}`.
#[derive(Default)]
pub struct RouteTable {
    routes: HashMap<Method, matchit::Router<Option<AuthPolicy>>>,
    fallback: Option<AuthPolicy>,
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("methods", &self.routes.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl RouteTable {
    /// Empty table. Unregistered routes get `fallback` (`None` = public).
    #[must_use]
    pub fn new(fallback: Option<AuthPolicy>) -> Self {
        Self {
            routes: HashMap::new(),
            fallback,
        }
    }

    /// # Errors
    ///
    /// [`ConfigError::InvalidRoute`] when the pattern is malformed or
    /// conflicts with one already registered for `method`.
    pub fn route(self, method: Method, path: &str, policy: AuthPolicy) -> Result<Self, ConfigError> {
        self.insert(method, path, Some(policy))
    }

    /// Register a route that never runs the pipeline.
    ///
    /// # Errors
    ///
    /// Same as [`RouteTable::route`].
    pub fn public(self, method: Method, path: &str) -> Result<Self, ConfigError> {
        self.insert(method, path, None)
    }

    fn insert(
        mut self,
        method: Method,
        path: &str,
        policy: Option<AuthPolicy>,
    ) -> Result<Self, ConfigError> {
        let pattern = convert_axum_path_to_matchit(path);
        self.routes
            .entry(method)
            .or_insert_with(matchit::Router::new)
            .insert(pattern, policy)
            .map_err(|e| ConfigError::InvalidRoute {
                path: path.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(self)
    }
}

impl RouteTable {
    /// `Some(None)` is a matched public route.
    fn lookup(&self, method: &Method, path: &str) -> Option<Option<&AuthPolicy>> {
        let router = self.routes.get(method)?;
        router.at(path).ok().map(|matched| matched.value.as_ref())
    }
}

impl RouteResolver for RouteTable {
    /// HEAD without its own entry is served by the GET handler, so it takes
    /// the GET policy.
    fn resolve(&self, method: &Method, path: &str) -> Option<AuthPolicy> {
        let matched = match self.lookup(method, path) {
            None if method == Method::HEAD => self.lookup(&Method::GET, path),
            found => found,
        };
        match matched {
            Some(policy) => policy.cloned(),
            None => self.fallback.clone(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_convert_axum_path_to_matchit() {
        assert_eq!(convert_axum_path_to_matchit("/users/:id"), "/users/{id}");
        assert_eq!(
            convert_axum_path_to_matchit("/posts/:post_id/comments/:comment_id"),
            "/posts/{post_id}/comments/{comment_id}"
        );
        assert_eq!(convert_axum_path_to_matchit("/health"), "/health");
        assert_eq!(convert_axum_path_to_matchit("/users/{id}"), "/users/{id}");
    }

    #[test]
    fn policy_constructors() {
        assert_eq!(
            AuthPolicy::required(),
            AuthPolicy {
                required: true,
                roles: vec![]
            }
        );
        assert!(!AuthPolicy::optional().required);

        let policy = AuthPolicy::role("ADMIN").with_role("OPERATOR");
        assert!(policy.required);
        assert_eq!(policy.roles, vec!["ADMIN", "OPERATOR"]);
    }

    #[test]
    fn fixed_policy_resolves_everywhere() {
        let policy = AuthPolicy::role("ADMIN");
        assert_eq!(policy.resolve(&Method::DELETE, "/anything"), Some(policy.clone()));
    }

    #[test]
    fn table_matches_method_and_params() {
        let table = RouteTable::new(Some(AuthPolicy::required()))
            .route(Method::GET, "/users/:id", AuthPolicy::optional())
            .unwrap()
            .route(Method::DELETE, "/users/{id}", AuthPolicy::role("ADMIN"))
            .unwrap()
            .public(Method::GET, "/health")
            .unwrap();

        assert_eq!(
            table.resolve(&Method::GET, "/users/42"),
            Some(AuthPolicy::optional())
        );
        assert_eq!(
            table.resolve(&Method::DELETE, "/users/42"),
            Some(AuthPolicy::role("ADMIN"))
        );
        assert_eq!(table.resolve(&Method::GET, "/health"), None);
        // unregistered method and unregistered path fall back
        assert_eq!(
            table.resolve(&Method::POST, "/users/42"),
            Some(AuthPolicy::required())
        );
        assert_eq!(
            table.resolve(&Method::GET, "/other"),
            Some(AuthPolicy::required())
        );
    }

    #[test]
    fn head_uses_get_policy_unless_registered() {
        let table = RouteTable::new(Some(AuthPolicy::required()))
            .route(Method::GET, "/admin", AuthPolicy::role("ADMIN"))
            .unwrap()
            .public(Method::GET, "/health")
            .unwrap()
            .route(Method::GET, "/files", AuthPolicy::role("ADMIN"))
            .unwrap()
            .route(Method::HEAD, "/files", AuthPolicy::optional())
            .unwrap();

        assert_eq!(
            table.resolve(&Method::HEAD, "/admin"),
            Some(AuthPolicy::role("ADMIN"))
        );
        assert_eq!(table.resolve(&Method::HEAD, "/health"), None);
        assert_eq!(
            table.resolve(&Method::HEAD, "/files"),
            Some(AuthPolicy::optional())
        );
        assert_eq!(
            table.resolve(&Method::HEAD, "/other"),
            Some(AuthPolicy::required())
        );
    }

    #[test]
    fn public_fallback() {
        let table = RouteTable::new(None)
            .route(Method::GET, "/admin", AuthPolicy::role("ADMIN"))
            .unwrap();

        assert_eq!(table.resolve(&Method::GET, "/"), None);
        assert!(table.resolve(&Method::GET, "/admin").is_some());
    }

    #[test]
    fn conflicting_route_is_rejected() {
        let err = RouteTable::default()
            .route(Method::GET, "/users/:id", AuthPolicy::required())
            .unwrap()
            .route(Method::GET, "/users/{id}", AuthPolicy::optional())
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidRoute { path, .. } if path == "/users/{id}"));
    }
}
