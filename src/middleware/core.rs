use std::sync::Arc;

use crate::context::Context;
use crate::response::{HandlerResult, IntoResponse};

/// Final stage of a pipeline.
///
/// Implemented for every `Fn(&mut Context) -> R` where `R: IntoResponse`, so
/// a handler may return a [`Response`](crate::response::Response), a
/// `serde_json::Value`, `()`, or a `Result` of those.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: &mut Context) -> HandlerResult;
}

impl<F, R> Handler for F
where
    F: Fn(&mut Context) -> R + Send + Sync + 'static,
    R: IntoResponse,
{
    fn call(&self, ctx: &mut Context) -> HandlerResult {
        self(ctx).into_response()
    }
}

/// Code wrapped around the remainder of the pipeline.
///
/// A middleware may pass through (`next.run(ctx)`), post-process the
/// response `next` returns, short-circuit by returning without calling
/// `next`, or fail with an error.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> HandlerResult;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Copy of this middleware for an application mounted under `prefix`,
    /// or `None` when the middleware does not depend on the request path.
    fn rescope(&self, _prefix: &str) -> Option<Arc<dyn Middleware>> {
        None
    }
}

impl<F> Middleware for F
where
    F: Fn(&mut Context, Next<'_>) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> HandlerResult {
        self(ctx, next)
    }
}

/// Wrap a closure as a shareable middleware.
///
/// Spelling the bound out here lets the closure's argument types be inferred:
/// `from_fn(|c, next| next.run(c))`.
pub fn from_fn<F>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(&mut Context, Next<'_>) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A composed pipeline stage.
pub type Endpoint<'a> = Box<dyn Fn(&mut Context) -> HandlerResult + 'a>;

/// The rest of the pipeline, handed to each middleware.
///
/// `run` consumes it, so a middleware can invoke the downstream stages at
/// most once.
pub struct Next<'a> {
    endpoint: &'a dyn Fn(&mut Context) -> HandlerResult,
}

impl<'a> Next<'a> {
    /// Continuation that runs `endpoint`.
    #[must_use]
    pub fn new(endpoint: &'a dyn Fn(&mut Context) -> HandlerResult) -> Self {
        Self { endpoint }
    }

    /// Invoke the remaining middleware and the handler.
    ///
    /// # Errors
    ///
    /// Whatever a downstream middleware or the handler fails with.
    pub fn run(self, ctx: &mut Context) -> HandlerResult {
        (self.endpoint)(ctx)
    }
}

/// Compose `[m1, .., mn]` around `handler` into one callable.
///
/// Built as a right-to-left fold: the handler is the innermost endpoint and
/// each middleware wraps everything after it, so `m1`'s pre-logic runs first
/// and its post-logic last. Builder headers are not merged here; the caller
/// applies [`Context::finalize`] to whatever response comes out.
pub fn compose<'a>(middleware: &'a [Arc<dyn Middleware>], handler: &'a dyn Handler) -> Endpoint<'a> {
    let innermost: Endpoint<'a> = Box::new(move |ctx: &mut Context| handler.call(ctx));

    middleware.iter().rev().fold(innermost, |next, mw| {
        let wrapped: Endpoint<'a> =
            Box::new(move |ctx: &mut Context| mw.handle(ctx, Next::new(next.as_ref())));
        wrapped
    })
}
