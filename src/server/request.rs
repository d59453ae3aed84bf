use http::Method;
use serde::Serialize;
use std::sync::Arc;

use crate::response::HeaderVec;

/// An inbound request as handed over by the host adapter.
///
/// Nothing here is interpreted yet: `uri` is the raw request target
/// (`/users/1?expand=posts`) and `body` the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    /// HTTP method
    pub method: Method,
    /// Request target including the query string
    pub uri: String,
    /// Headers in arrival order, names as sent
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl RawRequest {
    #[must_use]
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    #[must_use]
    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::POST, uri)
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `data` as the body and set `Content-Type: application/json`.
    ///
    /// # Errors
    ///
    /// Fails when `data` cannot be serialized.
    pub fn with_json<T: Serialize + ?Sized>(self, data: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(data)?;
        Ok(self
            .with_header("Content-Type", "application/json")
            .with_body(body))
    }

    /// Path component of the request target, without query or fragment.
    ///
    /// An absolute-form target (`http://host/a/b`) is reduced to its path.
    #[must_use]
    pub fn path(&self) -> &str {
        let target = origin_form(&self.uri);
        let end = target.find(['?', '#']).unwrap_or(target.len());
        &target[..end]
    }

    /// Raw query string after `?`, if any.
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        let target = origin_form(&self.uri);
        let start = target.find('?')? + 1;
        let rest = &target[start..];
        let end = rest.find('#').unwrap_or(rest.len());
        Some(&rest[..end])
    }
}

fn origin_form(uri: &str) -> &str {
    match uri.split_once("://") {
        Some((_, rest)) => match rest.find(['/', '?']) {
            Some(idx) => &rest[idx..],
            None => "/",
        },
        None => uri,
    }
}

/// Parse a query string into ordered `(name, value)` pairs.
///
/// Names and values are URL-decoded; repeated names are all kept.
#[must_use]
pub fn parse_query_params(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_and_query_split() {
        let req = RawRequest::get("/search?q=rust&page=2#top");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query_string(), Some("q=rust&page=2"));
    }

    #[test]
    fn test_no_query() {
        let req = RawRequest::get("/plain");
        assert_eq!(req.path(), "/plain");
        assert_eq!(req.query_string(), None);
    }

    #[test]
    fn test_absolute_form_target() {
        let req = RawRequest::get("http://example.com/a/b?x=1");
        assert_eq!(req.path(), "/a/b");
        assert_eq!(req.query_string(), Some("x=1"));
        assert_eq!(RawRequest::get("http://example.com").path(), "/");
    }

    #[test]
    fn test_parse_query_params() {
        let q = parse_query_params("x=1&y=hello%20world&x=2");
        assert_eq!(
            q,
            vec![
                ("x".to_string(), "1".to_string()),
                ("y".to_string(), "hello world".to_string()),
                ("x".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_with_json_sets_content_type() {
        let req = RawRequest::post("/items")
            .with_json(&serde_json::json!({"name": "pen"}))
            .unwrap();
        assert_eq!(req.headers[0].0.as_ref(), "Content-Type");
        assert_eq!(req.body, br#"{"name":"pen"}"#.to_vec());
    }
}
