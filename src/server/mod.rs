//! Host server boundary.
//!
//! The framework never reads process-global request state. A host adapter
//! (CGI bridge, embedded HTTP server, test harness) implements
//! [`ServerAdapter`] and hands it to [`App::run`](crate::app::App::run),
//! which reads the request once and writes exactly one response back.

use std::io;

use crate::response::HeaderVec;

mod memory;
mod request;
mod response;

pub use memory::MemoryServer;
pub use request::{parse_query_params, RawRequest};
pub use response::{status_line, status_reason, write_http};

/// Contract between the dispatcher and the process hosting it.
pub trait ServerAdapter {
    /// Request method token as received, e.g. `GET`
    fn method(&self) -> &str;

    /// Request target, e.g. `/users/1?expand=posts`
    fn uri(&self) -> &str;

    /// Request headers in arrival order
    fn headers(&self) -> HeaderVec;

    /// Read the request body.
    ///
    /// # Errors
    ///
    /// I/O failures reading from the client.
    fn body(&mut self) -> io::Result<Vec<u8>>;

    /// Deliver the final response.
    ///
    /// # Errors
    ///
    /// I/O failures writing to the client.
    fn send_response(&mut self, status: u16, headers: &HeaderVec, body: &[u8]) -> io::Result<()>;
}
