//! # Application Module
//!
//! [`App`] owns the route table, the ordered global middleware list and the
//! optional error hook, and drives one request through its lifecycle:
//!
//! 1. **Normalize** - a path longer than `/` ending in `/` is answered with
//!    `301` to the trimmed path; routing is skipped.
//! 2. **Route** - first registered match wins; no match runs a synthesized
//!    handler that fails with `404` (there is no `405`).
//! 3. **Pipeline** - global middleware, then route middleware, then the
//!    handler, composed as an onion.
//! 4. **Translate** - an error from any stage (including a panic) goes to
//!    the error hook if one is registered, otherwise to
//!    [`error_response`](crate::error::error_response).
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata::{App, Context, HttpError};
//!
//! let mut api = App::new();
//! api.get("/users/:id", |c: &mut Context| {
//!     match c.req.param("id") {
//!         Some("0") => Err(HttpError::not_found()),
//!         Some(id) => Ok(c.text(format!("user {id}"))),
//!         None => Err(HttpError::bad_request("missing id")),
//!     }
//! });
//!
//! let mut app = App::new();
//! app.use_middleware(|c, next| {
//!     c.header("X-Powered-By", "strata");
//!     next.run(c)
//! });
//! app.route("/api", &api);
//! ```

mod core;

pub use self::core::{App, ErrorHandler, GlobalMiddleware};
