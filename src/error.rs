//! Two-tier error model.
//!
//! [`HttpError`] is an intentional, client-facing failure with an explicit
//! status. Anything else that goes wrong inside a handler or middleware is an
//! [`InternalError`] and is always surfaced as `500`. Both travel through the
//! pipeline as [`AppError`] and are turned into a response by
//! [`error_response`] unless the application registered its own error hook.
//!
//! `AppError` intentionally does not implement `std::error::Error`: that is
//! what lets every `E: std::error::Error` convert into it through `?`.

use http::StatusCode;
use serde_json::{json, Value};
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, Location};
use std::sync::Once;

use crate::config::Environment;
use crate::response::Response;

/// An intentional HTTP failure.
#[derive(Debug, Clone)]
pub struct HttpError {
    status: u16,
    message: String,
    code: Option<String>,
    details: Value,
    custom_response: Option<Response>,
}

impl HttpError {
    #[must_use]
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
            details: Value::Null,
            custom_response: None,
        }
    }

    /// Error using the canonical reason phrase as message.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        Self::new(status, reason_phrase(status))
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::from_status(404)
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, message)
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }

    /// Machine-readable error code, e.g. `USER_NOT_FOUND`.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Structured details included in the default JSON body.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Pre-built response returned verbatim instead of the default JSON body.
    #[must_use]
    pub fn with_response(mut self, response: Response) -> Self {
        self.custom_response = Some(response);
        self
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The explicit code, or one derived from the status (`404` → `NOT_FOUND`).
    #[must_use]
    pub fn code(&self) -> String {
        match &self.code {
            Some(code) => code.clone(),
            None => reason_phrase(self.status)
                .chars()
                .filter(|c| *c != '\'')
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                .collect(),
        }
    }

    #[must_use]
    pub fn details(&self) -> &Value {
        &self.details
    }

    #[must_use]
    pub fn custom_response(&self) -> Option<&Response> {
        self.custom_response.as_ref()
    }

    /// The response this error produces when no error hook is registered.
    #[must_use]
    pub fn to_response(&self) -> Response {
        if let Some(custom) = &self.custom_response {
            return custom.clone();
        }
        let body = json!({
            "status": self.status,
            "error": {
                "code": self.code(),
                "message": self.message,
                "details": self.details,
            }
        });
        Response::json_value(self.status, &body)
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}: {}", self.status, self.message)
    }
}

/// An unclassified failure: a propagated error or a caught panic.
#[derive(Debug)]
pub struct InternalError {
    type_name: String,
    message: String,
    location: Option<(String, u32)>,
    backtrace: Backtrace,
    source: Option<anyhow::Error>,
}

/// Where the last panic on this thread was raised, recorded by the hook
/// installed through [`capture_panic_sites`].
struct PanicSite {
    file: String,
    line: u32,
    backtrace: Backtrace,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Record the file, line and backtrace of panics on the current thread so
/// that [`InternalError::from_panic`] can report them.
///
/// The hook is installed once per process and chains to the hook that was
/// active before, so panic output is unchanged. Each call also drops any
/// site left over from an earlier panic on this thread.
pub fn capture_panic_sites() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if let Some(location) = info.location() {
                let site = PanicSite {
                    file: location.file().to_string(),
                    line: location.line(),
                    backtrace: Backtrace::capture(),
                };
                LAST_PANIC
                    .try_with(|last| {
                        if let Ok(mut last) = last.try_borrow_mut() {
                            *last = Some(site);
                        }
                    })
                    .ok();
            }
            previous(info);
        }));
    });
    LAST_PANIC.with(|last| *last.borrow_mut() = None);
}

impl InternalError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            type_name: "internal".to_string(),
            message: message.into(),
            location: None,
            backtrace: Backtrace::capture(),
            source: None,
        }
    }

    fn from_source(
        type_name: &str,
        source: anyhow::Error,
        location: Option<&'static Location<'static>>,
    ) -> Self {
        Self {
            type_name: type_name.to_string(),
            message: format!("{source:#}"),
            location: location.map(|l| (l.file().to_string(), l.line())),
            backtrace: Backtrace::capture(),
            source: Some(source),
        }
    }

    /// Build from a payload caught by `catch_unwind`.
    ///
    /// File, line and backtrace point at the panic itself when
    /// [`capture_panic_sites`] was called before the panicking code ran;
    /// otherwise the location is unknown and the backtrace is taken here.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        let site = LAST_PANIC.with(|last| last.borrow_mut().take());
        let (location, backtrace) = match site {
            Some(site) => (Some((site.file, site.line)), site.backtrace),
            None => (None, Backtrace::capture()),
        };
        Self {
            type_name: "panic".to_string(),
            message,
            location,
            backtrace,
            source: None,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source file and line where the error entered the framework, if known.
    #[must_use]
    pub fn location(&self) -> Option<(&str, u32)> {
        self.location.as_ref().map(|(file, line)| (file.as_str(), *line))
    }

    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    #[must_use]
    pub fn source(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

/// Error flowing through handlers and middleware.
#[derive(Debug)]
pub enum AppError {
    Http(HttpError),
    Internal(InternalError),
}

impl AppError {
    /// An internal error with a plain message.
    #[track_caller]
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        let mut err = InternalError::new(message);
        let caller = Location::caller();
        err.location = Some((caller.file().to_string(), caller.line()));
        AppError::Internal(err)
    }

    /// Wrap an `anyhow::Error` as an internal error.
    #[track_caller]
    #[must_use]
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        AppError::Internal(InternalError::from_source(
            "anyhow::Error",
            err,
            Some(Location::caller()),
        ))
    }

    /// Status this error is surfaced with by default.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            AppError::Http(e) => e.status(),
            AppError::Internal(_) => 500,
        }
    }

    #[must_use]
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            AppError::Http(e) => Some(e),
            AppError::Internal(_) => None,
        }
    }

    #[must_use]
    pub fn as_internal(&self) -> Option<&InternalError> {
        match self {
            AppError::Internal(e) => Some(e),
            AppError::Http(_) => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Http(e) => e.fmt(f),
            AppError::Internal(e) => e.fmt(f),
        }
    }
}

impl From<HttpError> for AppError {
    fn from(err: HttpError) -> Self {
        AppError::Http(err)
    }
}

impl<E> From<E> for AppError
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[track_caller]
    fn from(err: E) -> Self {
        AppError::Internal(InternalError::from_source(
            std::any::type_name::<E>(),
            anyhow::Error::new(err),
            Some(Location::caller()),
        ))
    }
}

/// Misuse of the per-request context. Always a programmer error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// `render` was called twice within one request
    RendererAlreadySet,
    /// `view` was called before any renderer was registered
    RendererMissing {
        /// The view that was requested
        view: String,
    },
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::RendererAlreadySet => {
                write!(f, "a view renderer is already registered for this request")
            }
            ContextError::RendererMissing { view } => {
                write!(
                    f,
                    "cannot render view '{view}': no renderer registered for this request"
                )
            }
        }
    }
}

impl std::error::Error for ContextError {}

/// Default translation of an error into a response.
///
/// Typed errors keep their status and structured body. Internal errors are a
/// `500`; only the development environment shows what went wrong.
#[must_use]
pub fn error_response(err: &AppError, environment: Environment) -> Response {
    match err {
        AppError::Http(e) => e.to_response(),
        AppError::Internal(e) if environment.is_development() => development_page(e),
        AppError::Internal(_) => {
            Response::json_value(500, &json!({ "error": "Internal Server Error" }))
        }
    }
}

/// Diagnostic HTML page for an internal error.
#[must_use]
pub fn development_page(err: &InternalError) -> Response {
    let location = match err.location() {
        Some((file, line)) => format!("{}:{}", escape_html(file), line),
        None => "unknown".to_string(),
    };
    let trace = match err.backtrace().status() {
        BacktraceStatus::Captured => escape_html(&err.backtrace().to_string()),
        _ => "Backtrace not captured. Set RUST_BACKTRACE=1 to enable it.".to_string(),
    };
    let page = format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head><meta charset=\"UTF-8\"><title>500 Internal Server Error</title></head>\n\
         <body>\n\
         <h1>{type_name}</h1>\n\
         <p class=\"message\">{message}</p>\n\
         <p class=\"location\">{location}</p>\n\
         <h2>Backtrace</h2>\n\
         <pre>{trace}</pre>\n\
         </body>\n\
         </html>\n",
        type_name = escape_html(err.type_name()),
        message = escape_html(err.message()),
    );
    Response::html(500, page)
}

fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Error")
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
