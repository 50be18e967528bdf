//! Responses produced when the pipeline denies a request.
//!
//! 401 responses always carry `WWW-Authenticate: <prefix> realm="<realm>"`.
//! 403 and 500 responses carry no auth-specific header.

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{HeaderValue, StatusCode};
use serde::Serialize;

use crate::errors::ConfigError;
use crate::extract::BASIC_PREFIX;

/// Default realm advertised in the challenge header.
pub const DEFAULT_REALM: &str = "realm";

/// Body of the plain and JSON 401 responses.
pub const UNAUTHORIZED_MESSAGE: &str = "Credentials are required to access this resource.";

/// Body of the plain 403 response.
pub const FORBIDDEN_MESSAGE: &str = "User not authorized.";

/// Scheme prefix and realm sent back on 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    prefix: String,
    realm: String,
}

impl Default for Challenge {
    fn default() -> Self {
        Self {
            prefix: BASIC_PREFIX.to_owned(),
            realm: DEFAULT_REALM.to_owned(),
        }
    }
}

impl Challenge {
    /// # Errors
    ///
    /// [`ConfigError::MissingChallengeField`] when either part is empty or
    /// cannot be carried in an HTTP header.
    pub fn new(prefix: impl Into<String>, realm: impl Into<String>) -> Result<Self, ConfigError> {
        let challenge = Self {
            prefix: prefix.into(),
            realm: realm.into(),
        };
        if challenge.prefix.trim().is_empty() {
            return Err(ConfigError::MissingChallengeField { field: "prefix" });
        }
        if challenge.realm.trim().is_empty() {
            return Err(ConfigError::MissingChallengeField { field: "realm" });
        }
        if challenge_header(&challenge.prefix, &challenge.realm).is_none() {
            return Err(ConfigError::MissingChallengeField {
                field: "prefix/realm",
            });
        }
        Ok(challenge)
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }
}

/// `<prefix> realm="<realm>"`, or `None` if that is not a valid header value.
#[must_use]
pub fn challenge_header(prefix: &str, realm: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{prefix} realm=\"{realm}\"")).ok()
}

fn with_challenge(mut response: Response, prefix: &str, realm: &str) -> Response {
    if let Some(value) = challenge_header(prefix, realm) {
        response.headers_mut().insert(WWW_AUTHENTICATE, value);
    } else {
        tracing::error!(prefix, realm, "Challenge is not a valid header value");
    }
    response
}

/// Builds the 401 response. Implementations must keep the challenge header.
pub trait UnauthorizedHandler: Send + Sync + 'static {
    fn build_response(&self, prefix: &str, realm: &str) -> Response;
}

/// `text/plain` body.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUnauthorizedHandler;

impl UnauthorizedHandler for DefaultUnauthorizedHandler {
    fn build_response(&self, prefix: &str, realm: &str) -> Response {
        let response = (
            StatusCode::UNAUTHORIZED,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            UNAUTHORIZED_MESSAGE,
        )
            .into_response();
        with_challenge(response, prefix, realm)
    }
}

#[derive(Debug, Serialize)]
struct ErrorMessage<'a> {
    code: u16,
    message: &'a str,
}

/// `{"code":401,"message":"..."}` body.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonUnauthorizedHandler;

impl UnauthorizedHandler for JsonUnauthorizedHandler {
    fn build_response(&self, prefix: &str, realm: &str) -> Response {
        let response = (
            StatusCode::UNAUTHORIZED,
            Json(ErrorMessage {
                code: StatusCode::UNAUTHORIZED.as_u16(),
                message: UNAUTHORIZED_MESSAGE,
            }),
        )
            .into_response();
        with_challenge(response, prefix, realm)
    }
}

/// Builds the 403 response.
pub trait ForbiddenHandler: Send + Sync + 'static {
    fn build_response(&self) -> Response;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultForbiddenHandler;

impl ForbiddenHandler for DefaultForbiddenHandler {
    fn build_response(&self) -> Response {
        (
            StatusCode::FORBIDDEN,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            FORBIDDEN_MESSAGE,
        )
            .into_response()
    }
}

/// RFC 9457 problem details body.
#[derive(Debug, Clone, Serialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
}

impl Problem {
    #[must_use]
    pub fn new(status: StatusCode, title: &str, detail: &str) -> Self {
        Self {
            type_url: "about:blank".to_owned(),
            title: title.to_owned(),
            status: status.as_u16(),
            detail: detail.to_owned(),
        }
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self)).into_response();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
