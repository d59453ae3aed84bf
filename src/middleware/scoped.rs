use std::sync::Arc;

use super::{Middleware, Next};
use crate::context::Context;
use crate::response::HandlerResult;
use crate::router::{join_paths, normalize_path, split_segments, Segment};

/// Runs `inner` only for request paths at or below `prefix`.
///
/// Matching is segment-wise: `/api` covers `/api` and `/api/users` but not
/// `/apis`. A `:name` segment in the prefix matches any one non-empty
/// segment. Outside the scope the request goes straight to `next`.
pub struct Scoped {
    prefix: String,
    segments: Vec<Segment>,
    inner: Arc<dyn Middleware>,
}

impl Scoped {
    #[must_use]
    pub fn new(prefix: &str, inner: Arc<dyn Middleware>) -> Self {
        let prefix = normalize_path(prefix);
        let segments = split_segments(&prefix)
            .iter()
            .map(|s| Segment::parse(s))
            .collect();
        Self {
            prefix,
            segments,
            inner,
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn covers(&self, path: &str) -> bool {
        let path = split_segments(path);
        path.len() >= self.segments.len()
            && self
                .segments
                .iter()
                .zip(path.iter())
                .all(|(seg, p)| seg.matches(p))
    }
}

impl Middleware for Scoped {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> HandlerResult {
        if self.covers(ctx.req.path()) {
            self.inner.handle(ctx, next)
        } else {
            next.run(ctx)
        }
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn rescope(&self, prefix: &str) -> Option<Arc<dyn Middleware>> {
        Some(Arc::new(Scoped::new(
            &join_paths(prefix, &self.prefix),
            Arc::clone(&self.inner),
        )))
    }
}
