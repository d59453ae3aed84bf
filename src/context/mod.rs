//! Per-request context.
//!
//! A [`Context`] is created by the dispatcher after routing and passed by
//! `&mut` through every middleware and the handler. It is never shared
//! between requests.
//!
//! ```rust,ignore
//! app.get("/users/:id", |c: &mut Context| {
//!     let id = c.req.param("id").unwrap_or_default().to_string();
//!     c.status(200).header("Cache-Control", "no-store");
//!     c.json(&json!({ "id": id }))
//! });
//! ```

mod core;
mod request;

pub use self::core::{Context, Renderer};
pub use request::RequestView;
