use crate::principal::Principal;

/// `SecurityContext` carries the outcome of authentication for one request.
///
/// Built by the auth pipeline and inserted into the request extensions before
/// the handler runs. It lives exactly as long as the request; nothing here is
/// shared between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext<P> {
    /// The authenticated principal, `None` for anonymous requests.
    principal: Option<P>,
    /// Scheme that produced the principal (e.g. "Basic", "Bearer").
    authentication_scheme: Option<String>,
    /// Whether the request arrived over a secure transport.
    secure: bool,
}

impl<P: Principal> SecurityContext<P> {
    /// Create a new `SecurityContext` builder
    #[must_use]
    pub fn builder() -> SecurityContextBuilder<P> {
        SecurityContextBuilder::default()
    }

    /// Create an anonymous `SecurityContext` with no principal
    #[must_use]
    pub fn anonymous() -> Self {
        SecurityContextBuilder::default().build()
    }

    #[must_use]
    pub fn principal(&self) -> Option<&P> {
        self.principal.as_ref()
    }

    #[must_use]
    pub fn into_principal(self) -> Option<P> {
        self.principal
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    /// Name of the scheme that authenticated the principal.
    #[must_use]
    pub fn authentication_scheme(&self) -> Option<&str> {
        self.authentication_scheme.as_deref()
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }
}

pub struct SecurityContextBuilder<P> {
    principal: Option<P>,
    authentication_scheme: Option<String>,
    secure: bool,
}

impl<P> Default for SecurityContextBuilder<P> {
    fn default() -> Self {
        Self {
            principal: None,
            authentication_scheme: None,
            secure: false,
        }
    }
}

impl<P: Principal> SecurityContextBuilder<P> {
    #[must_use]
    pub fn principal(mut self, principal: P) -> Self {
        self.principal = Some(principal);
        self
    }

    #[must_use]
    pub fn authentication_scheme(mut self, scheme: &str) -> Self {
        self.authentication_scheme = Some(scheme.to_owned());
        self
    }

    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn build(self) -> SecurityContext<P> {
        SecurityContext {
            principal: self.principal,
            authentication_scheme: self.authentication_scheme,
            secure: self.secure,
        }
    }
}
