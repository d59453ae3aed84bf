use std::io;
use std::sync::Arc;

use super::ServerAdapter;
use crate::response::{HeaderVec, Response};

/// In-process adapter: serves one prepared request and keeps the response.
///
/// The method is stored as a raw token so that malformed methods can be
/// exercised too.
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    method: String,
    uri: String,
    headers: HeaderVec,
    body: Vec<u8>,
    response: Option<Response>,
}

impl MemoryServer {
    #[must_use]
    pub fn new(method: &str, uri: &str) -> Self {
        Self {
            method: method.to_string(),
            uri: uri.to_string(),
            ..Self::default()
        }
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

    /// The response sent by the last `send_response`, if any.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        self.response
    }
}

impl ServerAdapter for MemoryServer {
    fn method(&self) -> &str {
        &self.method
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn headers(&self) -> HeaderVec {
        self.headers.clone()
    }

    fn body(&mut self) -> io::Result<Vec<u8>> {
        Ok(std::mem::take(&mut self.body))
    }

    fn send_response(&mut self, status: u16, headers: &HeaderVec, body: &[u8]) -> io::Result<()> {
        self.response = Some(Response::new(status, headers.clone(), body.to_vec()));
        Ok(())
    }
}
