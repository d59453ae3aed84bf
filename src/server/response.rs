use http::StatusCode;
use std::io::{self, Write};

use crate::response::Response;

/// Canonical reason phrase for `status`, `Unknown` for unregistered codes.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// `HTTP/1.1 <status> <reason>`
#[must_use]
pub fn status_line(status: u16) -> String {
    format!("HTTP/1.1 {} {}", status, status_reason(status))
}

/// Write `res` in HTTP/1.1 message form.
///
/// A `Content-Length` header is added unless the response already has one.
///
/// # Errors
///
/// Propagates write errors from `out`.
pub fn write_http<W: Write>(res: &Response, out: &mut W) -> io::Result<()> {
    writeln!(out, "{}\r", status_line(res.status))?;
    for (name, value) in &res.headers {
        writeln!(out, "{name}: {value}\r")?;
    }
    if !res.has_header("Content-Length") {
        writeln!(out, "Content-Length: {}\r", res.body.len())?;
    }
    out.write_all(b"\r\n")?;
    out.write_all(&res.body)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(599), "Unknown");
    }

    #[test]
    fn test_write_http() {
        let res = Response::text(201, "made");
        let mut out = Vec::new();
        write_http(&res, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "HTTP/1.1 201 Created\r\nContent-Type: text/plain; charset=UTF-8\r\nContent-Length: 4\r\n\r\nmade"
        );
    }
}
