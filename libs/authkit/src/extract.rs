//! Credential extractors.
//!
//! Extraction never fails: anything malformed is reported as "no
//! credentials" so the pipeline handles it exactly like a missing header.

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::credentials::{BasicCredentials, BearerToken};
use crate::request::RequestHead;

/// Default scheme prefix for HTTP Basic authentication.
pub const BASIC_PREFIX: &str = "Basic";

/// Default scheme prefix for bearer tokens.
pub const BEARER_PREFIX: &str = "Bearer";

/// Query parameter consulted when no bearer `Authorization` header is sent.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Pulls scheme-specific credentials out of a request.
pub trait CredentialExtractor: Send + Sync + 'static {
    type Credentials: Send + Sync + 'static;

    /// Scheme prefix, also used as the scheme identity within a chain.
    fn scheme(&self) -> &str;

    fn extract(&self, head: &RequestHead<'_>) -> Option<Self::Credentials>;
}

/// Splits `"<prefix> <payload>"`, matching the prefix case-insensitively.
fn strip_scheme<'h>(header: &'h str, prefix: &str) -> Option<&'h str> {
    let (scheme, payload) = header.split_once(' ')?;
    if scheme.is_empty() || !scheme.eq_ignore_ascii_case(prefix) {
        return None;
    }
    Some(payload.trim())
}

/// `Authorization: Basic base64(username:password)`
#[derive(Debug, Clone)]
pub struct BasicExtractor {
    prefix: String,
}

impl Default for BasicExtractor {
    fn default() -> Self {
        Self::with_prefix(BASIC_PREFIX)
    }
}

impl BasicExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl CredentialExtractor for BasicExtractor {
    type Credentials = BasicCredentials;

    fn scheme(&self) -> &str {
        &self.prefix
    }

    fn extract(&self, head: &RequestHead<'_>) -> Option<BasicCredentials> {
        let encoded = strip_scheme(head.authorization()?, &self.prefix)?;
        let decoded = STANDARD.decode(encoded).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;

        // Split at the first colon: passwords may contain ':'
        let (username, password) = decoded.split_once(':')?;
        if username.is_empty() {
            return None;
        }
        Some(BasicCredentials::new(username, password))
    }
}

/// `Authorization: Bearer <token>`, falling back to `?access_token=<token>`
/// whenever the header carries no bearer token.
#[derive(Debug, Clone)]
pub struct BearerExtractor {
    prefix: String,
}

impl Default for BearerExtractor {
    fn default() -> Self {
        Self::with_prefix(BEARER_PREFIX)
    }
}

impl BearerExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl CredentialExtractor for BearerExtractor {
    type Credentials = BearerToken;

    fn scheme(&self) -> &str {
        &self.prefix
    }

    fn extract(&self, head: &RequestHead<'_>) -> Option<BearerToken> {
        head.authorization()
            .and_then(|header| strip_scheme(header, &self.prefix))
            .filter(|token| !token.is_empty())
            .map(str::to_owned)
            .or_else(|| head.query_param(ACCESS_TOKEN_PARAM))
            .filter(|token| !token.is_empty())
            .map(BearerToken::new)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use http::{HeaderMap, HeaderValue, Method, Uri, header::AUTHORIZATION};

    use super::*;

    fn extract_with<E: CredentialExtractor>(
        extractor: &E,
        authorization: Option<&str>,
        uri: &str,
    ) -> Option<E::Credentials> {
        let method = Method::GET;
        let uri: Uri = uri.parse().unwrap();
        let mut headers = HeaderMap::new();
        if let Some(value) = authorization {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        extractor.extract(&RequestHead::new(&method, &uri, &headers))
    }

    fn basic(value: &str) -> String {
        format!("Basic {}", STANDARD.encode(value))
    }

    #[test]
    fn basic_decodes_username_and_password() {
        let creds = extract_with(&BasicExtractor::new(), Some(&basic("good-guy:secret")), "/")
            .unwrap();
        assert_eq!(creds.username(), "good-guy");
        assert_eq!(creds.password(), "secret");
    }

    #[test]
    fn basic_password_may_contain_colons() {
        let creds =
            extract_with(&BasicExtractor::new(), Some(&basic("user:pa:ss")), "/").unwrap();
        assert_eq!(creds.username(), "user");
        assert_eq!(creds.password(), "pa:ss");
    }

    #[test]
    fn basic_prefix_is_case_insensitive() {
        let header = format!("bAsIc {}", STANDARD.encode("u:p"));
        assert!(extract_with(&BasicExtractor::new(), Some(&header), "/").is_some());
    }

    #[test]
    fn basic_malformed_input_is_no_credentials() {
        let extractor = BasicExtractor::new();
        assert!(extract_with(&extractor, None, "/").is_none());
        assert!(extract_with(&extractor, Some("Basic !!!not-base64!!!"), "/").is_none());
        assert!(extract_with(&extractor, Some(&basic("no-colon")), "/").is_none());
        assert!(extract_with(&extractor, Some(&basic(":only-password")), "/").is_none());
        assert!(extract_with(&extractor, Some("Basic"), "/").is_none());
        assert!(extract_with(&extractor, Some("Bearer abc"), "/").is_none());
    }

    #[test]
    fn basic_rejects_non_utf8_payload() {
        let header = format!("Basic {}", STANDARD.encode([0xff, 0xfe, b':', b'x']));
        assert!(extract_with(&BasicExtractor::new(), Some(&header), "/").is_none());
    }

    #[test]
    fn bearer_reads_header() {
        let token = extract_with(&BearerExtractor::new(), Some("Bearer tok-1"), "/").unwrap();
        assert_eq!(token.as_str(), "tok-1");
    }

    #[test]
    fn bearer_falls_back_to_query_parameter() {
        let token =
            extract_with(&BearerExtractor::new(), None, "/x?access_token=tok-2").unwrap();
        assert_eq!(token.as_str(), "tok-2");
    }

    #[test]
    fn bearer_header_with_other_scheme_falls_back_to_query() {
        let token = extract_with(
            &BearerExtractor::new(),
            Some(&basic("u:p")),
            "/x?access_token=tok-2",
        )
        .unwrap();
        assert_eq!(token.as_str(), "tok-2");

        assert!(extract_with(&BearerExtractor::new(), Some(&basic("u:p")), "/x").is_none());
    }

    #[test]
    fn bearer_header_wins_over_query() {
        let token = extract_with(
            &BearerExtractor::new(),
            Some("Bearer from-header"),
            "/x?access_token=from-query",
        )
        .unwrap();
        assert_eq!(token.as_str(), "from-header");
    }

    #[test]
    fn bearer_empty_token_is_no_credentials() {
        assert!(extract_with(&BearerExtractor::new(), Some("Bearer   "), "/").is_none());
        assert!(extract_with(&BearerExtractor::new(), None, "/x?access_token=").is_none());
    }

    #[test]
    fn custom_prefix_is_honoured() {
        let extractor = BearerExtractor::with_prefix("Token");
        assert_eq!(extractor.scheme(), "Token");
        assert!(extract_with(&extractor, Some("Token abc"), "/").is_some());
        assert!(extract_with(&extractor, Some("Bearer abc"), "/").is_none());
    }
}
