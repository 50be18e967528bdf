use thiserror::Error;

/// Inconsistent static configuration, reported at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StaticAuthError {
    #[error("user '{0}' is configured more than once")]
    DuplicateUser(String),

    #[error("token for '{username}' refers to an unknown user")]
    UnknownTokenUser { username: String },

    #[error("a token for '{username}' is configured more than once")]
    DuplicateToken { username: String },
}
