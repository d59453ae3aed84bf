//! # Middleware Module
//!
//! The onion pipeline: a [`Middleware`] wraps everything registered after it
//! plus the final [`Handler`]. [`compose`] folds an ordered list right-to-left
//! so that for `[m1, m2]` around `h` the execution order is
//! `m1-before, m2-before, h, m2-after, m1-after`.
//!
//! Closures are middleware too:
//!
//! ```rust,ignore
//! app.use_middleware(|c, next| {
//!     c.header("X-Frame-Options", "DENY");
//!     next.run(c)
//! });
//! ```
//!
//! [`Scoped`] limits a middleware to a path prefix and [`Logger`] is a
//! ready-made request logger.

mod core;
mod logger;
mod scoped;

pub use self::core::{compose, from_fn, Endpoint, Handler, Middleware, Next};
pub use logger::Logger;
pub use scoped::Scoped;
