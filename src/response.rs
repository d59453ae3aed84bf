//! Response values and the handler return-value coercion.
//!
//! A handler may hand back a full [`Response`] or any value implementing
//! [`IntoResponse`]. Plain values are coerced to JSON; `()` becomes an empty
//! `200 OK`. That is the only coercion policy: anything that needs a
//! different content type builds a [`Response`] itself.

use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;

use crate::error::AppError;

/// Maximum inline headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Ordered header multimap.
///
/// Header names use `Arc<str>` so the common names (`Content-Type`,
/// `Location`, ...) are shared instead of copied per request.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Result type every handler and middleware produces.
pub type HandlerResult = Result<Response, AppError>;

/// A fully built HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers in insertion order
    pub headers: HeaderVec,
    /// Response body
    pub body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self::empty(200)
    }
}

impl Response {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A response with no headers and no body.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::new(status, HeaderVec::new(), Vec::new())
    }

    /// A body with the given content type.
    #[must_use]
    pub fn with_content_type(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        let mut res = Self::new(status, HeaderVec::new(), body.into());
        res.set_header("Content-Type", content_type.to_string());
        res
    }

    /// Serialize `data` as a JSON response.
    ///
    /// # Errors
    ///
    /// Fails when `data` cannot be represented as JSON (for example a map
    /// with non-string keys).
    pub fn json<T: Serialize + ?Sized>(status: u16, data: &T) -> Result<Self, AppError> {
        let body = serde_json::to_vec(data)?;
        Ok(Self::with_content_type(status, "application/json", body))
    }

    /// JSON response from an already built value. Never fails.
    #[must_use]
    pub fn json_value(status: u16, value: &Value) -> Self {
        Self::with_content_type(status, "application/json", value.to_string())
    }

    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::with_content_type(status, "text/plain; charset=UTF-8", body.into())
    }

    #[must_use]
    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self::with_content_type(status, "text/html; charset=UTF-8", body.into())
    }

    /// Redirect to `location` with an empty body.
    #[must_use]
    pub fn redirect(location: &str, status: u16) -> Self {
        let mut res = Self::empty(status);
        res.set_header("Location", location.to_string());
        res
    }

    /// Get the first header value by name (case-insensitive).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value stored under `name`, in insertion order.
    #[must_use]
    pub fn get_headers(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Add or replace a header.
    pub fn set_header(&mut self, name: &str, value: String) -> &mut Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
        self
    }

    /// Add a header, keeping earlier values under the same name.
    pub fn append_header(&mut self, name: &str, value: String) -> &mut Self {
        self.headers.push((Arc::from(name), value));
        self
    }

    /// Builder-style [`Response::set_header`].
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value.into());
        self
    }

    /// Builder-style status override.
    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Body as UTF-8, lossily.
    #[must_use]
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Wrapper marking a serializable value as a JSON response body.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

/// Conversion from a handler's return value into a response.
pub trait IntoResponse {
    /// # Errors
    ///
    /// Propagates the error carried by `Result` returns, or a serialization
    /// failure when coercing to JSON.
    fn into_response(self) -> HandlerResult;
}

impl IntoResponse for Response {
    fn into_response(self) -> HandlerResult {
        Ok(self)
    }
}

impl IntoResponse for () {
    fn into_response(self) -> HandlerResult {
        Ok(Response::empty(200))
    }
}

impl IntoResponse for Value {
    fn into_response(self) -> HandlerResult {
        Ok(Response::json_value(200, &self))
    }
}

impl IntoResponse for String {
    fn into_response(self) -> HandlerResult {
        Ok(Response::json_value(200, &Value::String(self)))
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> HandlerResult {
        Ok(Response::json_value(200, &Value::from(self)))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> HandlerResult {
        Response::json(200, &self.0)
    }
}

impl<T, E> IntoResponse for Result<T, E>
where
    T: IntoResponse,
    E: Into<AppError>,
{
    fn into_response(self) -> HandlerResult {
        match self {
            Ok(value) => value.into_response(),
            Err(err) => Err(err.into()),
        }
    }
}
