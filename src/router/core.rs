//! Route table and matcher.

use http::Method;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::middleware::{Handler, Middleware};

/// Maximum number of path parameters before heap allocation.
/// Most routes have ≤4 params (e.g. /users/:id/posts/:post_id).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Captured path parameters in pattern order.
///
/// Names are `Arc<str>` taken from the compiled pattern, so a lookup only
/// clones a pointer; values are per-request data from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// One compiled pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the path segment exactly
    Literal(String),
    /// `:name`, matches any single non-empty segment
    Param(Arc<str>),
}

impl Segment {
    /// Compile one raw segment. Only a leading `:` followed by a name makes a
    /// parameter; `a:b` or a bare `:` stay literal.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(':') {
            Some(name) if !name.is_empty() => Segment::Param(Arc::from(name)),
            _ => Segment::Literal(raw.to_string()),
        }
    }

    #[must_use]
    pub fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == segment,
            Segment::Param(_) => !segment.is_empty(),
        }
    }
}

/// Split a path into segments after trimming leading and trailing `/`.
/// The root path has no segments.
#[must_use]
pub fn split_segments(path: &str) -> SmallVec<[&str; MAX_INLINE_PARAMS]> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        SmallVec::new()
    } else {
        trimmed.split('/').collect()
    }
}

/// Leading-slash form without trailing slashes: `users/1/` → `/users/1`, `` → `/`.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    let mut out = String::with_capacity(trimmed.len() + 1);
    out.push('/');
    out.push_str(trimmed);
    out
}

/// Concatenate a mount prefix and a pattern: (`/api`, `/`) → `/api`,
/// (`/`, `/x`) → `/x`, (`/api/`, `x`) → `/api/x`.
#[must_use]
pub fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let path = path.trim_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{path}"),
        (false, true) => format!("/{prefix}"),
        (false, false) => format!("/{prefix}/{path}"),
    }
}

/// A registered route.
///
/// `middleware` is the route's complete stack as stored in the table. For a
/// route copied in by mounting, its first `inherited` entries are the global
/// middleware the owning application had at mount time; the dispatcher runs
/// the application's live global list in their place.
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    /// Pattern in leading-slash form, e.g. `/users/:id`
    pub pattern: String,
    segments: Arc<[Segment]>,
    pub handler: Arc<dyn Handler>,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub inherited: usize,
}

impl Route {
    #[must_use]
    pub fn new(
        method: Method,
        pattern: &str,
        handler: Arc<dyn Handler>,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Self {
        let pattern = normalize_path(pattern);
        let segments: Arc<[Segment]> = split_segments(&pattern)
            .iter()
            .map(|s| Segment::parse(s))
            .collect();

        warn_duplicate_params(&pattern, &segments);

        Self {
            method,
            pattern,
            segments,
            handler,
            middleware,
            inherited: 0,
        }
    }

    /// Mark the first `count` middleware entries as inherited globals.
    #[must_use]
    pub fn with_inherited(mut self, count: usize) -> Self {
        self.inherited = count.min(self.middleware.len());
        self
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of the `:` parameters, in pattern order.
    #[must_use]
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.as_ref()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Middleware registered on the route itself (and on mounted
    /// sub-applications), excluding the inherited global prefix.
    #[must_use]
    pub fn own_middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware[self.inherited..]
    }

    /// Match already-split path segments, returning the captured params.
    #[must_use]
    pub fn match_segments(&self, path: &[&str]) -> Option<ParamVec> {
        if path.len() != self.segments.len() {
            return None;
        }
        let mut params = ParamVec::new();
        for (pattern_seg, path_seg) in self.segments.iter().zip(path) {
            if !pattern_seg.matches(path_seg) {
                return None;
            }
            if let Segment::Param(name) = pattern_seg {
                params.push((Arc::clone(name), (*path_seg).to_string()));
            }
        }
        Some(params)
    }
}

fn warn_duplicate_params(pattern: &str, segments: &[Segment]) {
    let mut names: SmallVec<[&str; MAX_INLINE_PARAMS]> = SmallVec::new();
    for seg in segments {
        if let Segment::Param(name) = seg {
            if names.contains(&name.as_ref()) {
                warn!(
                    pattern = %pattern,
                    param = %name,
                    "Duplicate parameter name in pattern - last value wins"
                );
            }
            names.push(name.as_ref());
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("middleware", &self.middleware.len())
            .field("inherited", &self.inherited)
            .finish()
    }
}

/// Result of matching a request against the table.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: ParamVec,
}

impl RouteMatch<'_> {
    /// Get a path parameter by name ("last write wins" on duplicate names).
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.route.middleware
    }
}

/// Flat route table, built during setup and read-only while serving.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Append a route. No uniqueness check is performed.
    pub fn add_route(&mut self, route: Route) {
        debug!(
            method = %route.method,
            pattern = %route.pattern,
            middleware_count = route.middleware.len(),
            total_routes = self.routes.len() + 1,
            "Route registered"
        );
        self.routes.push(route);
    }

    /// Registered routes in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Print all registered routes to stdout.
    pub fn dump_routes(&self) {
        println!("[routes] count={}", self.routes.len());
        for route in &self.routes {
            println!(
                "[route] {:<7} {} (middleware: {})",
                route.method,
                route.pattern,
                route.middleware.len()
            );
        }
    }

    /// Resolve `(method, path)` to the first matching route.
    ///
    /// # Returns
    ///
    /// * `Some(RouteMatch)` - the route and its captured params
    /// * `None` - nothing matched (the dispatcher answers 404)
    #[must_use]
    pub fn find_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        debug!(method = %method, path = %path, "Route match attempt");

        let match_start = Instant::now();
        let segments = split_segments(path);

        let found = self
            .routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| route.match_segments(&segments).map(|params| (route, params)));

        let match_duration = match_start.elapsed();

        match found {
            Some((route, params)) => {
                if match_duration > Duration::from_millis(1) {
                    warn!(
                        method = %method,
                        path = %path,
                        route_pattern = %route.pattern,
                        duration_us = match_duration.as_micros(),
                        routes_count = self.routes.len(),
                        "Slow route matching detected"
                    );
                } else {
                    info!(
                        method = %method,
                        path = %path,
                        route_pattern = %route.pattern,
                        path_params = ?params,
                        duration_us = match_duration.as_micros(),
                        "Route matched"
                    );
                }
                Some(RouteMatch { route, params })
            }
            None => {
                warn!(
                    method = %method,
                    path = %path,
                    duration_us = match_duration.as_micros(),
                    "No route matched"
                );
                None
            }
        }
    }
}
