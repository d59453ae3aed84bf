//! # Strata
//!
//! **Strata** is a small, synchronous HTTP application framework: a flat route
//! table with `:param` patterns, onion-ordered middleware, and a per-request
//! [`Context`] that bundles request access with response construction.
//!
//! ## Overview
//!
//! Client code registers `(method, pattern, handler)` triples and ordered
//! middleware on an [`App`], then hands each inbound request to
//! [`App::handle`] (or [`App::run`] with a [`server::ServerAdapter`]). Every
//! request ends in exactly one [`Response`]; failures anywhere in the
//! pipeline are translated by the error layer.
//!
//! ## Architecture
//!
//! - **[`router`]** - Route table and first-match-wins matcher
//! - **[`middleware`]** - `Middleware` trait, `Next`, onion composition, path scoping, request logger
//! - **[`context`]** - Per-request `Context` and read-only `RequestView`
//! - **[`response`]** - `Response`, header multimap, handler return coercion
//! - **[`error`]** - `HttpError` / `AppError` and the default error translation
//! - **[`app`]** - The dispatcher: registration, mounting, request lifecycle
//! - **[`server`]** - Host adapter contract and an in-memory adapter
//! - **[`config`]** - Environment and logging configuration (env vars, YAML)
//! - **[`logging`]** - `tracing-subscriber` setup
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Host as ServerAdapter
//!     participant App
//!     participant Router
//!     participant Pipeline as Middleware + Handler
//!     participant Errors as Error translation
//!
//!     Host->>App: run(&mut adapter)
//!     App->>App: trailing slash? 301
//!     App->>Router: find_route(method, path)
//!     Router-->>App: RouteMatch or none (404 handler)
//!     App->>Pipeline: compose(globals + route middleware, handler)
//!     Pipeline-->>App: Ok(Response) / Err(AppError) / panic
//!     App->>Errors: on_error hook or error_response
//!     App->>Host: send_response(status, headers, body)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use serde_json::json;
//! use strata::{App, Context, HttpError, RawRequest};
//!
//! let mut app = App::new();
//!
//! app.get("/greet/:name", |c: &mut Context| {
//!     let name = c.req.param("name").unwrap_or("stranger").to_string();
//!     c.text(format!("Hello, {name}"))
//! });
//!
//! app.post("/items", |c: &mut Context| {
//!     let item = c.req.body()?;
//!     if item.get("name").is_none() {
//!         return Err(HttpError::bad_request("name is required").into());
//!     }
//!     c.status(201).json(&json!({ "created": item }))
//! });
//!
//! let res = app.handle(RawRequest::get("/greet/Ada"));
//! assert_eq!(res.body_string(), "Hello, Ada");
//! ```
//!
//! ## Error Handling
//!
//! Handlers return anything implementing [`IntoResponse`]. Use
//! [`HttpError`] for intentional client-facing failures; any other error
//! propagated with `?` becomes an internal `500`, rendered with full
//! diagnostics only when the environment is `development`.

pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod response;
pub mod router;
pub mod server;

pub use app::App;
pub use config::{AppConfig, Environment};
pub use context::{Context, RequestView};
pub use error::{AppError, HttpError};
pub use http::Method;
pub use middleware::{from_fn, Handler, Middleware, Next};
pub use response::{HandlerResult, IntoResponse, Json, Response};
pub use server::RawRequest;
