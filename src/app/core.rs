use http::Method;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, Environment};
use crate::context::{Context, RequestView};
use crate::error::{capture_panic_sites, error_response, AppError, HttpError, InternalError};
use crate::ids::RequestId;
use crate::middleware::{compose, Handler, Middleware, Next, Scoped};
use crate::response::{HandlerResult, IntoResponse, Response};
use crate::router::{join_paths, normalize_path, ParamVec, Route, RouteMatch, Router};
use crate::server::{RawRequest, ServerAdapter};

/// Application-level error hook, see [`App::on_error`].
pub type ErrorHandler = Arc<dyn Fn(&AppError, &mut Context) -> Response + Send + Sync>;

/// One entry of the application's global middleware list.
///
/// `effective` is what runs: `original` itself, or `original` wrapped in
/// [`Scoped`] when registered with a path prefix.
#[derive(Clone)]
pub struct GlobalMiddleware {
    scope: Option<String>,
    original: Arc<dyn Middleware>,
    effective: Arc<dyn Middleware>,
}

impl GlobalMiddleware {
    fn global(middleware: Arc<dyn Middleware>) -> Self {
        Self {
            scope: None,
            effective: Arc::clone(&middleware),
            original: middleware,
        }
    }

    fn scoped(prefix: &str, middleware: Arc<dyn Middleware>) -> Self {
        let scoped = Scoped::new(prefix, Arc::clone(&middleware));
        Self {
            scope: Some(scoped.prefix().to_string()),
            effective: Arc::new(scoped),
            original: middleware,
        }
    }

    /// Same entry as seen from a parent that mounts its owner at `prefix`.
    fn rescoped(&self, prefix: &str) -> Self {
        match &self.scope {
            None => self.clone(),
            Some(scope) => Self::scoped(&join_paths(prefix, scope), Arc::clone(&self.original)),
        }
    }

    /// Path prefix this entry is limited to, `None` for every request.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// The middleware as it runs in the pipeline.
    #[must_use]
    pub fn middleware(&self) -> &Arc<dyn Middleware> {
        &self.effective
    }
}

/// Handler synthesized when no route matches.
struct NotFoundHandler;

impl Handler for NotFoundHandler {
    fn call(&self, _ctx: &mut Context) -> HandlerResult {
        Err(HttpError::not_found().into())
    }
}

/// The application: route table, global middleware and error hook.
///
/// Everything is configured through `&mut self` during setup; serving only
/// needs `&self`, so a built `App` can be shared across threads.
#[derive(Clone)]
pub struct App {
    router: Router,
    middleware: Vec<GlobalMiddleware>,
    error_handler: Option<ErrorHandler>,
    environment: Environment,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Empty application; the environment comes from `STRATA_ENV`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_environment(AppConfig::from_env().environment)
    }

    #[must_use]
    pub fn with_config(config: &AppConfig) -> Self {
        Self::with_environment(config.environment)
    }

    #[must_use]
    pub fn with_environment(environment: Environment) -> Self {
        Self {
            router: Router::new(),
            middleware: Vec::new(),
            error_handler: None,
            environment,
        }
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn set_environment(&mut self, environment: Environment) -> &mut Self {
        self.environment = environment;
        self
    }

    // Route registration

    pub fn get<H, R>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&mut Context) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.on(Method::GET, path, handler)
    }

    pub fn post<H, R>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&mut Context) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.on(Method::POST, path, handler)
    }

    pub fn put<H, R>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&mut Context) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete<H, R>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&mut Context) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.on(Method::DELETE, path, handler)
    }

    pub fn patch<H, R>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&mut Context) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.on(Method::PATCH, path, handler)
    }

    pub fn options<H, R>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&mut Context) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.on(Method::OPTIONS, path, handler)
    }

    /// Register a handler for any method.
    pub fn on<H, R>(&mut self, method: Method, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&mut Context) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.on_with(method, path, Vec::new(), handler)
    }

    /// Register a handler with route-level middleware, run after the global
    /// middleware in the order given.
    pub fn on_with<H, R>(
        &mut self,
        method: Method,
        path: &str,
        middleware: Vec<Arc<dyn Middleware>>,
        handler: H,
    ) -> &mut Self
    where
        H: Fn(&mut Context) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.add_route(Route::new(method, path, Arc::new(handler), middleware))
    }

    /// Append a prebuilt route, e.g. one with a struct [`Handler`].
    pub fn add_route(&mut self, route: Route) -> &mut Self {
        self.router.add_route(route);
        self
    }

    // Middleware registration

    /// Add a closure to the global middleware list.
    pub fn use_middleware<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(&mut Context, Next<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_middleware(Arc::new(middleware))
    }

    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        debug!(
            middleware_name = middleware.name(),
            position = self.middleware.len(),
            "Global middleware registered"
        );
        self.middleware.push(GlobalMiddleware::global(middleware));
        self
    }

    /// Add a closure that only runs for paths at or below `prefix`.
    pub fn use_at<F>(&mut self, prefix: &str, middleware: F) -> &mut Self
    where
        F: Fn(&mut Context, Next<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_middleware_at(prefix, Arc::new(middleware))
    }

    pub fn add_middleware_at(&mut self, prefix: &str, middleware: Arc<dyn Middleware>) -> &mut Self {
        let entry = GlobalMiddleware::scoped(prefix, middleware);
        debug!(
            middleware_name = entry.original.name(),
            scope = ?entry.scope,
            position = self.middleware.len(),
            "Scoped middleware registered"
        );
        self.middleware.push(entry);
        self
    }

    #[must_use]
    pub fn middleware(&self) -> &[GlobalMiddleware] {
        &self.middleware
    }

    /// Mount `sub` under `prefix`.
    ///
    /// Every route of `sub` is copied into this table as
    /// `prefix + pattern` with the middleware list
    /// `[this app's globals, sub's globals, the route's own]`. Path-scoped
    /// middleware of `sub` gets `prefix` prepended to its scope. The copy is
    /// taken now; later changes to `sub` are not seen. The error hook of
    /// `sub` is not carried over.
    pub fn route(&mut self, prefix: &str, sub: &App) -> &mut Self {
        let inherited: Vec<Arc<dyn Middleware>> = self
            .middleware
            .iter()
            .map(|g| Arc::clone(&g.effective))
            .collect();
        let sub_globals: Vec<GlobalMiddleware> =
            sub.middleware.iter().map(|g| g.rescoped(prefix)).collect();

        for route in sub.router.routes() {
            let mut stack = Vec::with_capacity(
                inherited.len() + sub_globals.len() + route.own_middleware().len(),
            );
            stack.extend(inherited.iter().map(Arc::clone));
            stack.extend(sub_globals.iter().map(|g| Arc::clone(&g.effective)));
            stack.extend(
                route
                    .own_middleware()
                    .iter()
                    .map(|m| m.rescope(prefix).unwrap_or_else(|| Arc::clone(m))),
            );

            let pattern = join_paths(prefix, &route.pattern);
            let mounted = Route::new(route.method.clone(), &pattern, Arc::clone(&route.handler), stack)
                .with_inherited(inherited.len());
            self.router.add_route(mounted);
        }

        info!(
            prefix = %normalize_path(prefix),
            routes = sub.router.len(),
            inherited_middleware = inherited.len(),
            sub_middleware = sub_globals.len(),
            "Sub-application mounted"
        );
        self
    }

    /// Register the error hook. It receives every error, typed or internal,
    /// and its response is final.
    pub fn on_error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&AppError, &mut Context) -> Response + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        self.router.routes()
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    // Dispatch

    /// Dispatch one request to completion. Never fails: every error is
    /// translated into a response.
    #[must_use]
    pub fn handle(&self, raw: RawRequest) -> Response {
        let request_id = RequestId::new();
        let start = Instant::now();
        let method = raw.method.clone();
        let path = raw.path().to_string();

        if path.len() > 1 && path.ends_with('/') {
            let mut location = normalize_path(&path);
            if let Some(query) = raw.query_string().filter(|q| !q.is_empty()) {
                location.push('?');
                location.push_str(query);
            }
            info!(
                request_id = %request_id,
                stage = "normalize",
                method = %method,
                path = %path,
                location = %location,
                "Trailing slash redirect"
            );
            return Response::redirect(&location, 301);
        }

        let (route_path, params, handler, route_middleware): (
            &str,
            ParamVec,
            &dyn Handler,
            &[Arc<dyn Middleware>],
        ) = match self.router.find_route(&method, &path) {
            Some(RouteMatch { route, params }) => (
                route.pattern.as_str(),
                params,
                route.handler.as_ref(),
                route.own_middleware(),
            ),
            None => ("", ParamVec::new(), &NotFoundHandler as &dyn Handler, &[][..]),
        };

        let stack: Vec<Arc<dyn Middleware>> = self
            .middleware
            .iter()
            .map(|g| Arc::clone(&g.effective))
            .chain(route_middleware.iter().map(Arc::clone))
            .collect();

        debug!(
            request_id = %request_id,
            stage = "pipeline",
            route_pattern = %route_path,
            middleware_count = stack.len(),
            "Running pipeline"
        );

        let req = RequestView::new(raw, route_path, params);
        let mut ctx = Context::new(req, self.environment, request_id);

        let pipeline = compose(&stack, handler);
        capture_panic_sites();
        let result = match panic::catch_unwind(AssertUnwindSafe(|| pipeline(&mut ctx))) {
            Ok(result) => result,
            Err(payload) => {
                let err = InternalError::from_panic(payload);
                error!(
                    request_id = %request_id,
                    stage = "pipeline",
                    method = %method,
                    path = %path,
                    panic_message = %err.message(),
                    location = ?err.location(),
                    "Handler panicked"
                );
                Err(AppError::Internal(err))
            }
        };

        let response = match result {
            Ok(res) => ctx.finalize(res),
            Err(err) => self.translate_error(&err, &mut ctx),
        };

        info!(
            request_id = %request_id,
            stage = "complete",
            method = %method,
            path = %path,
            status = response.status,
            latency_ms = start.elapsed().as_millis() as u64,
            "Request complete"
        );
        response
    }

    fn translate_error(&self, err: &AppError, ctx: &mut Context) -> Response {
        match err {
            AppError::Http(e) => info!(
                request_id = %ctx.request_id(),
                stage = "error",
                status = e.status(),
                code = %e.code(),
                message = %e.message(),
                "HTTP error"
            ),
            AppError::Internal(e) => error!(
                request_id = %ctx.request_id(),
                stage = "error",
                error_type = %e.type_name(),
                message = %e.message(),
                location = ?e.location(),
                "Internal error"
            ),
        }

        let Some(hook) = &self.error_handler else {
            return error_response(err, self.environment);
        };

        capture_panic_sites();
        match panic::catch_unwind(AssertUnwindSafe(|| hook(err, ctx))) {
            Ok(res) => res,
            Err(payload) => {
                let hook_err = InternalError::from_panic(payload);
                error!(
                    request_id = %ctx.request_id(),
                    stage = "error",
                    panic_message = %hook_err.message(),
                    "Error handler panicked, using default translation"
                );
                error_response(err, self.environment)
            }
        }
    }

    /// Serve one request from `server`.
    ///
    /// A method token that is not a valid HTTP method is answered with
    /// `400` without routing.
    ///
    /// # Errors
    ///
    /// I/O failures reading the body or sending the response.
    pub fn run<S: ServerAdapter + ?Sized>(&self, server: &mut S) -> io::Result<()> {
        let method = match Method::from_bytes(server.method().as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                warn!(
                    method = %server.method(),
                    uri = %server.uri(),
                    "Invalid request method"
                );
                let res = HttpError::bad_request("Invalid request method").to_response();
                return server.send_response(res.status, &res.headers, &res.body);
            }
        };

        let raw = RawRequest {
            method,
            uri: server.uri().to_string(),
            headers: server.headers(),
            body: server.body()?,
        };
        let res = self.handle(raw);
        server.send_response(res.status, &res.headers, &res.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::from_fn;

    fn app() -> App {
        App::with_environment(Environment::Testing)
    }

    #[test]
    fn test_mount_concatenates_middleware() {
        let gp = from_fn(|c, next| next.run(c));
        let gs = from_fn(|c, next| next.run(c));
        let rm = from_fn(|c, next| next.run(c));

        let mut sub = app();
        sub.add_middleware(Arc::clone(&gs));
        sub.on_with(Method::GET, "/x", vec![Arc::clone(&rm)], |_c: &mut Context| ());

        let mut parent = app();
        parent.add_middleware(Arc::clone(&gp));
        parent.route("/api", &sub);

        let route = &parent.routes()[0];
        assert_eq!(route.pattern, "/api/x");
        assert_eq!(route.method, Method::GET);
        assert_eq!(route.middleware.len(), 3);
        assert!(Arc::ptr_eq(&route.middleware[0], &gp));
        assert!(Arc::ptr_eq(&route.middleware[1], &gs));
        assert!(Arc::ptr_eq(&route.middleware[2], &rm));
        assert_eq!(route.inherited, 1);
        assert_eq!(route.own_middleware().len(), 2);
    }

    #[test]
    fn test_mount_root_route_and_nested_prefix() {
        let mut inner = app();
        inner.get("/", |_c: &mut Context| ());
        let mut middle = app();
        middle.route("/v1", &inner);
        let mut outer = app();
        outer.route("/api", &middle);
        assert_eq!(outer.routes()[0].pattern, "/api/v1");
    }

    #[test]
    fn test_scoped_middleware_is_rescoped_on_mount() {
        let mut sub = app();
        sub.use_at("admin/", |c, next| next.run(c));
        sub.add_middleware(from_fn(|c, next| next.run(c)));

        let entries = sub.middleware();
        assert_eq!(entries[0].scope(), Some("/admin"));
        assert_eq!(entries[0].rescoped("/api").scope(), Some("/api/admin"));
        assert_eq!(entries[1].scope(), None);
        assert_eq!(entries[1].rescoped("/api").scope(), None);
    }

    #[test]
    fn test_not_found_handler() {
        let req = RequestView::new(RawRequest::get("/"), "", ParamVec::new());
        let mut ctx = Context::new(req, Environment::Testing, RequestId::new());
        match NotFoundHandler.call(&mut ctx) {
            Err(AppError::Http(e)) => assert_eq!(e.status(), 404),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
