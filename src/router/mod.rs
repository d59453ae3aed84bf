//! # Router Module
//!
//! The route table: an ordered, flat list of [`Route`] records and the matcher
//! that resolves an incoming `(method, path)` against it.
//!
//! ## Patterns
//!
//! A pattern is a `/`-delimited sequence of segments. A segment starting with
//! `:` is a named parameter that captures exactly one non-empty path segment;
//! every other segment must match literally. There are no wildcard or
//! catch-all segments, so a pattern only matches paths with the same number of
//! segments.
//!
//! ```rust,ignore
//! router.add_route(Route::new(Method::GET, "/users/:id", handler, Vec::new()));
//! let m = router.find_route(&Method::GET, "/users/42").unwrap();
//! assert_eq!(m.param("id"), Some("42"));
//! ```
//!
//! ## Matching order
//!
//! Routes are scanned in registration order and the **first** match wins.
//! Matching is not ranked by specificity: with `/users/:id` registered before
//! `/users/special`, a request for `/users/special` resolves to `/users/:id`.
//! Registering the same `(method, pattern)` twice never overrides the first
//! registration.
//!
//! ## Performance
//!
//! Matching is O(routes × segments) per request. Patterns are split into
//! segments once, at registration, so a lookup only compares string slices.

mod core;
#[cfg(test)]
mod tests;

pub use self::core::{
    join_paths, normalize_path, split_segments, ParamVec, Route, RouteMatch, Router, Segment,
    MAX_INLINE_PARAMS,
};
