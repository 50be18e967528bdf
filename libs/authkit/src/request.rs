use http::{HeaderMap, Method, Uri};

/// Read-only view of the parts of an inbound request the pipeline looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestHead<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
}

impl<'a> RequestHead<'a> {
    #[must_use]
    pub fn new(method: &'a Method, uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    #[must_use]
    pub fn from_request<B>(request: &'a http::Request<B>) -> Self {
        Self::new(request.method(), request.uri(), request.headers())
    }

    /// Value of the `Authorization` header, if present and valid ASCII.
    #[must_use]
    pub fn authorization(&self) -> Option<&'a str> {
        self.headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
    }

    /// First value of a query parameter, percent-decoded.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.uri.query()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if key != name {
                return None;
            }
            urlencoding::decode(&value.replace('+', " "))
                .ok()
                .map(std::borrow::Cow::into_owned)
        })
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.uri.scheme() == Some(&http::uri::Scheme::HTTPS)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn query_param_is_decoded() {
        let method = Method::GET;
        let uri: Uri = "/things?a=1&access_token=abc%2Fdef&b=2".parse().unwrap();
        let headers = HeaderMap::new();
        let head = RequestHead::new(&method, &uri, &headers);

        assert_eq!(head.query_param("access_token").as_deref(), Some("abc/def"));
        assert_eq!(head.query_param("a").as_deref(), Some("1"));
        assert!(head.query_param("missing").is_none());
    }

    #[test]
    fn query_param_without_query() {
        let method = Method::GET;
        let uri: Uri = "/things".parse().unwrap();
        let headers = HeaderMap::new();
        let head = RequestHead::new(&method, &uri, &headers);

        assert!(head.query_param("access_token").is_none());
    }

    #[test]
    fn https_uri_is_secure() {
        let method = Method::GET;
        let uri: Uri = "https://example.com/x".parse().unwrap();
        let headers = HeaderMap::new();

        assert!(RequestHead::new(&method, &uri, &headers).is_secure());
    }
}
