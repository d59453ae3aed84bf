use http::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::HttpError;
use crate::response::HeaderVec;
use crate::router::{normalize_path, ParamVec};
use crate::server::{parse_query_params, RawRequest};

/// Read-only view of the current request.
///
/// Built once per request after routing. Query parameters are decoded up
/// front; the body is kept raw and parsed on demand by [`RequestView::body`]
/// or [`RequestView::json`].
#[derive(Debug, Clone)]
pub struct RequestView {
    method: Method,
    path: String,
    route_path: String,
    params: ParamVec,
    query: Vec<(String, String)>,
    headers: HeaderVec,
    body: Vec<u8>,
}

impl RequestView {
    /// View of `raw` as matched by the route `route_path` with `params`.
    ///
    /// `route_path` is empty when nothing matched.
    #[must_use]
    pub fn new(raw: RawRequest, route_path: &str, params: ParamVec) -> Self {
        let path = normalize_path(raw.path());
        let query = raw
            .query_string()
            .map(parse_query_params)
            .unwrap_or_default();
        Self {
            method: raw.method,
            path,
            route_path: route_path.to_string(),
            params,
            query,
            headers: raw.headers,
            body: raw.body,
        }
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Normalized request path: leading slash, no trailing slash.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Pattern of the matched route, e.g. `/users/:id`.
    #[must_use]
    pub fn route_path(&self) -> &str {
        &self.route_path
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// All path parameters in pattern order.
    #[must_use]
    pub fn params(&self) -> &ParamVec {
        &self.params
    }

    /// Query parameter by name; the last occurrence wins.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .rfind(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a repeated query parameter, in order.
    #[must_use]
    pub fn queries(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[must_use]
    pub fn all_queries(&self) -> &[(String, String)] {
        &self.query
    }

    /// First value of a header (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn headers(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[must_use]
    pub fn all_headers(&self) -> &HeaderVec {
        &self.headers
    }

    /// Media type of the body without parameters, lowercased.
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.header("Content-Type").map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    #[must_use]
    pub fn raw_body(&self) -> &[u8] {
        &self.body
    }

    /// Body parsed according to its content type.
    ///
    /// * JSON (`application/json`, `*+json`) becomes the parsed value.
    /// * `application/x-www-form-urlencoded` becomes an object; a repeated
    ///   field becomes an array of its values.
    /// * Anything else is returned as a string.
    ///
    /// An empty body is `Null` regardless of content type.
    ///
    /// # Errors
    ///
    /// `400 INVALID_JSON` when a JSON body does not parse.
    pub fn body(&self) -> Result<Value, HttpError> {
        if self.body.is_empty() {
            return Ok(Value::Null);
        }
        match self.content_type().as_deref() {
            Some(ct) if is_json(ct) => serde_json::from_slice(&self.body).map_err(invalid_json),
            Some("application/x-www-form-urlencoded") => Ok(form_to_value(&self.body)),
            _ => Ok(Value::String(String::from_utf8_lossy(&self.body).into_owned())),
        }
    }

    /// Deserialize the body as JSON into `T`, regardless of content type.
    ///
    /// # Errors
    ///
    /// `400 INVALID_JSON` when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(invalid_json)
    }
}

fn is_json(media_type: &str) -> bool {
    media_type == "application/json" || media_type.ends_with("+json")
}

fn invalid_json(err: serde_json::Error) -> HttpError {
    HttpError::bad_request(format!("Invalid JSON body: {err}")).with_code("INVALID_JSON")
}

fn form_to_value(body: &[u8]) -> Value {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    fn view(raw: RawRequest) -> RequestView {
        RequestView::new(raw, "", ParamVec::new())
    }

    #[test]
    fn test_path_is_normalized() {
        let v = view(RawRequest::get("/a/b/?x=1"));
        assert_eq!(v.path(), "/a/b");
    }

    #[test]
    fn test_params_and_route_path() {
        let mut params = ParamVec::new();
        params.push((Arc::from("id"), "42".to_string()));
        let v = RequestView::new(RawRequest::get("/users/42"), "/users/:id", params);
        assert_eq!(v.route_path(), "/users/:id");
        assert_eq!(v.param("id"), Some("42"));
        assert_eq!(v.param("missing"), None);
    }

    #[test]
    fn test_query_last_wins_and_queries_keeps_all() {
        let v = view(RawRequest::get("/s?tag=a&tag=b&q=x%20y"));
        assert_eq!(v.query("tag"), Some("b"));
        assert_eq!(v.queries("tag"), vec!["a", "b"]);
        assert_eq!(v.query("q"), Some("x y"));
        assert_eq!(v.all_queries().len(), 3);
    }

    #[test]
    fn test_headers_case_insensitive() {
        let v = view(
            RawRequest::get("/")
                .with_header("Accept", "text/html")
                .with_header("accept", "application/json"),
        );
        assert_eq!(v.header("ACCEPT"), Some("text/html"));
        assert_eq!(v.headers("accept"), vec!["text/html", "application/json"]);
    }

    #[test]
    fn test_json_body() {
        let v = view(
            RawRequest::post("/")
                .with_header("Content-Type", "application/json; charset=utf-8")
                .with_body(r#"{"a":[1,2]}"#),
        );
        assert_eq!(v.content_type().as_deref(), Some("application/json"));
        assert_eq!(v.body().unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_invalid_json_is_bad_request() {
        let v = view(
            RawRequest::post("/")
                .with_header("Content-Type", "application/json")
                .with_body("{nope"),
        );
        let err = v.body().unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.code(), "INVALID_JSON");
    }

    #[test]
    fn test_form_body_collects_repeated_fields() {
        let v = view(
            RawRequest::post("/")
                .with_header("Content-Type", "application/x-www-form-urlencoded")
                .with_body("name=Ada+Lovelace&lang=en&lang=fr"),
        );
        assert_eq!(
            v.body().unwrap(),
            json!({"name": "Ada Lovelace", "lang": ["en", "fr"]})
        );
    }

    #[test]
    fn test_other_and_empty_bodies() {
        let text = view(RawRequest::post("/").with_body("plain"));
        assert_eq!(text.body().unwrap(), json!("plain"));
        let empty = view(RawRequest::post("/").with_header("Content-Type", "application/json"));
        assert_eq!(empty.body().unwrap(), Value::Null);
    }

    #[test]
    fn test_typed_json() {
        #[derive(Deserialize)]
        struct Item {
            name: String,
        }
        let v = view(RawRequest::post("/").with_body(r#"{"name":"pen"}"#));
        let item: Item = v.json().unwrap();
        assert_eq!(item.name, "pen");
    }
}
