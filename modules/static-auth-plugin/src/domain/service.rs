//! Authenticators and authorizer over the configured user table.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use authkit::{
    AuthenticationError, AuthorizationError, Authenticator, Authorizer, BasicCredentials,
    BearerToken, RequestHead,
};
use authkit_security::{BasicPrincipal, Principal};

use crate::config::{StaticAuthConfig, UserEntry};
use crate::domain::error::StaticAuthError;

/// Validated, indexed form of [`StaticAuthConfig`].
#[derive(Debug)]
pub struct StaticDirectory {
    users: HashMap<String, UserEntry>,
    /// token -> username
    tokens: HashMap<String, String>,
}

impl StaticDirectory {
    /// # Errors
    ///
    /// [`StaticAuthError`] when a user is listed twice, or a token is listed
    /// twice or names a user that does not exist.
    pub fn from_config(cfg: &StaticAuthConfig) -> Result<Self, StaticAuthError> {
        let mut users = HashMap::with_capacity(cfg.users.len());
        for user in &cfg.users {
            match users.entry(user.username.clone()) {
                Entry::Occupied(_) => {
                    return Err(StaticAuthError::DuplicateUser(user.username.clone()));
                }
                Entry::Vacant(slot) => {
                    slot.insert(user.clone());
                }
            }
        }

        let mut tokens = HashMap::with_capacity(cfg.tokens.len());
        for entry in &cfg.tokens {
            if !users.contains_key(&entry.username) {
                return Err(StaticAuthError::UnknownTokenUser {
                    username: entry.username.clone(),
                });
            }
            if tokens
                .insert(entry.token.clone(), entry.username.clone())
                .is_some()
            {
                return Err(StaticAuthError::DuplicateToken {
                    username: entry.username.clone(),
                });
            }
        }

        tracing::debug!(
            users = users.len(),
            tokens = tokens.len(),
            "Static auth directory loaded"
        );
        Ok(Self { users, tokens })
    }

    fn roles_of(&self, username: &str) -> Option<&[String]> {
        self.users.get(username).map(|u| u.roles.as_slice())
    }
}

/// Matches HTTP Basic credentials against the configured passwords.
#[derive(Debug, Clone)]
pub struct StaticBasicAuthenticator {
    directory: Arc<StaticDirectory>,
}

impl StaticBasicAuthenticator {
    #[must_use]
    pub fn new(directory: Arc<StaticDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Authenticator<BasicCredentials, BasicPrincipal> for StaticBasicAuthenticator {
    async fn authenticate(
        &self,
        credentials: &BasicCredentials,
    ) -> Result<Option<BasicPrincipal>, AuthenticationError> {
        let principal = self
            .directory
            .users
            .get(credentials.username())
            .filter(|user| user.password == credentials.password())
            .map(|user| BasicPrincipal::new(&user.username));

        if principal.is_none() {
            tracing::debug!(username = credentials.username(), "Static basic auth rejected");
        }
        Ok(principal)
    }
}

/// Resolves configured bearer tokens to their user.
#[derive(Debug, Clone)]
pub struct StaticTokenAuthenticator {
    directory: Arc<StaticDirectory>,
}

impl StaticTokenAuthenticator {
    #[must_use]
    pub fn new(directory: Arc<StaticDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Authenticator<BearerToken, BasicPrincipal> for StaticTokenAuthenticator {
    async fn authenticate(
        &self,
        token: &BearerToken,
    ) -> Result<Option<BasicPrincipal>, AuthenticationError> {
        let principal = self
            .directory
            .tokens
            .get(token.as_str())
            .map(BasicPrincipal::new);

        if principal.is_none() {
            tracing::debug!("Static token auth rejected");
        }
        Ok(principal)
    }
}

/// Grants a role when the user's `roles` list contains it.
#[derive(Debug, Clone)]
pub struct StaticRoleAuthorizer {
    directory: Arc<StaticDirectory>,
}

impl StaticRoleAuthorizer {
    #[must_use]
    pub fn new(directory: Arc<StaticDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Authorizer<BasicPrincipal> for StaticRoleAuthorizer {
    async fn authorize(
        &self,
        principal: &BasicPrincipal,
        role: &str,
        _request: Option<&RequestHead<'_>>,
    ) -> Result<bool, AuthorizationError> {
        Ok(self
            .directory
            .roles_of(principal.name())
            .is_some_and(|roles| roles.iter().any(|r| r == role)))
    }
}
