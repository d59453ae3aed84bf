use http::Extensions;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::RequestView;
use crate::config::Environment;
use crate::error::{AppError, ContextError};
use crate::ids::RequestId;
use crate::response::{HandlerResult, HeaderVec, Response};

static NULL: Value = Value::Null;

/// Template engine hook registered per request with [`Context::render`].
pub trait Renderer {
    /// Render the view `name` with `data`.
    ///
    /// # Errors
    ///
    /// Whatever the engine reports (unknown template, render failure).
    fn render(&self, name: &str, data: &Value) -> Result<String, AppError>;
}

impl<F> Renderer for F
where
    F: Fn(&str, &Value) -> Result<String, AppError>,
{
    fn render(&self, name: &str, data: &Value) -> Result<String, AppError> {
        self(name, data)
    }
}

/// Per-request state threaded through middleware and handler.
///
/// Holds the [`RequestView`], a string-keyed variable bag, typed
/// extensions and a response builder. The builder's status and headers are
/// applied by the content helpers (`json`, `text`, `html`, `send`,
/// `redirect`, `view`); headers are also merged into any [`Response`] the
/// handler builds itself.
pub struct Context {
    pub req: RequestView,
    request_id: RequestId,
    environment: Environment,
    vars: HashMap<String, Value>,
    extensions: Extensions,
    status: u16,
    headers: HeaderVec,
    renderer: Option<Box<dyn Renderer>>,
}

impl Context {
    /// Fresh context for `req`, logged under `request_id`. The variable
    /// `"environment"` is pre-set.
    #[must_use]
    pub fn new(req: RequestView, environment: Environment, request_id: RequestId) -> Self {
        let mut vars = HashMap::new();
        vars.insert("environment".to_string(), environment.to_value());
        Self {
            req,
            request_id,
            environment,
            vars,
            extensions: Extensions::new(),
            status: 200,
            headers: HeaderVec::new(),
            renderer: None,
        }
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    // Variable bag

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Value stored under `key`, `Null` when absent.
    #[must_use]
    pub fn get(&self, key: &str) -> &Value {
        self.vars.get(key).unwrap_or(&NULL)
    }

    /// Typed read of a variable. `None` when absent or of another shape.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.vars
            .get(key)
            .and_then(|v| T::deserialize(v).ok())
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    #[must_use]
    pub fn vars(&self) -> &HashMap<String, Value> {
        &self.vars
    }

    /// Typed request-scoped values.
    #[must_use]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    // Response builder

    /// Status used by the content helpers.
    pub fn status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    /// Set a response header, replacing earlier values of the same name.
    pub fn header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    /// Add a response header, keeping earlier values (e.g. `Set-Cookie`).
    pub fn append_header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn response_headers(&self) -> &HeaderVec {
        &self.headers
    }

    // Content helpers

    /// JSON response from `data` with the builder's status and headers.
    ///
    /// # Errors
    ///
    /// Fails when `data` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(&self, data: &T) -> HandlerResult {
        let body = serde_json::to_vec(data)?;
        Ok(self.send(body, "application/json"))
    }

    #[must_use]
    pub fn text(&self, body: impl Into<String>) -> Response {
        self.send(body.into(), "text/plain; charset=UTF-8")
    }

    #[must_use]
    pub fn html(&self, body: impl Into<String>) -> Response {
        self.send(body.into(), "text/html; charset=UTF-8")
    }

    /// Raw body with an explicit content type. A `Content-Type` set on the
    /// builder overrides `content_type`.
    #[must_use]
    pub fn send(&self, body: impl Into<Vec<u8>>, content_type: &str) -> Response {
        let mut res = Response::with_content_type(self.status, content_type, body);
        if self
            .headers
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        {
            res.headers.clear();
        }
        res.headers.extend(self.headers.iter().cloned());
        res
    }

    /// `302 Found` to `url`.
    #[must_use]
    pub fn redirect(&self, url: &str) -> Response {
        self.redirect_with(url, 302)
    }

    /// Redirect with an explicit status and an empty body.
    #[must_use]
    pub fn redirect_with(&self, url: &str, status: u16) -> Response {
        let mut res = Response::redirect(url, status);
        res.headers.extend(
            self.headers
                .iter()
                .filter(|(k, _)| !k.eq_ignore_ascii_case("location"))
                .cloned(),
        );
        res
    }

    // Views

    /// Register the template renderer for this request.
    ///
    /// # Errors
    ///
    /// [`ContextError::RendererAlreadySet`] on a second registration.
    #[track_caller]
    pub fn render<F>(&mut self, renderer: F) -> Result<(), AppError>
    where
        F: Fn(&str, &Value) -> Result<String, AppError> + 'static,
    {
        self.render_with(renderer)
    }

    /// [`Context::render`] for renderer types.
    ///
    /// # Errors
    ///
    /// [`ContextError::RendererAlreadySet`] on a second registration.
    #[track_caller]
    pub fn render_with<R: Renderer + 'static>(&mut self, renderer: R) -> Result<(), AppError> {
        if self.renderer.is_some() {
            return Err(AppError::from(ContextError::RendererAlreadySet));
        }
        self.renderer = Some(Box::new(renderer));
        Ok(())
    }

    /// Render `name` through the registered renderer into an HTML response.
    ///
    /// # Errors
    ///
    /// [`ContextError::RendererMissing`] when no renderer was registered, or
    /// the renderer's own failure.
    #[track_caller]
    pub fn view<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> HandlerResult {
        let Some(renderer) = &self.renderer else {
            return Err(AppError::from(ContextError::RendererMissing {
                view: name.to_string(),
            }));
        };
        let data = serde_json::to_value(data)?;
        let html = renderer.render(name, &data)?;
        Ok(self.html(html))
    }

    /// Merge builder headers into the response leaving the pipeline.
    ///
    /// Headers whose name the response already carries are left alone, so
    /// values set explicitly on the response win.
    #[must_use]
    pub fn finalize(&self, mut res: Response) -> Response {
        let missing: HeaderVec = self
            .headers
            .iter()
            .filter(|(k, _)| !res.has_header(k))
            .cloned()
            .collect();
        res.headers.extend(missing);
        res
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("req", &self.req)
            .field("request_id", &self.request_id)
            .field("environment", &self.environment)
            .field("vars", &self.vars)
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("renderer", &self.renderer.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::ParamVec;
    use crate::server::RawRequest;
    use serde_json::json;

    fn ctx() -> Context {
        let req = RequestView::new(RawRequest::get("/"), "/", ParamVec::new());
        Context::new(req, Environment::Testing, RequestId::new())
    }

    #[test]
    fn test_missing_var_reads_null() {
        let c = ctx();
        assert_eq!(c.get("nope"), &Value::Null);
        assert!(!c.has("nope"));
    }

    #[test]
    fn test_set_and_get() {
        let mut c = ctx();
        c.set("user", json!({"id": 7})).set("count", 3);
        assert_eq!(c.get("user")["id"], 7);
        assert_eq!(c.get_as::<u32>("count"), Some(3));
        assert_eq!(c.get_as::<String>("count"), None);
    }

    #[test]
    fn test_environment_var_is_seeded() {
        let c = ctx();
        assert_eq!(c.get("environment")["current"], "testing");
        assert_eq!(c.get("environment")["isTesting"], true);
    }

    #[test]
    fn test_helpers_use_builder_status_and_headers() {
        let mut c = ctx();
        c.status(201).header("X-Id", "9");
        let res = c.text("made");
        assert_eq!(res.status, 201);
        assert_eq!(res.get_header("X-Id"), Some("9"));
        assert_eq!(res.get_header("Content-Type"), Some("text/plain; charset=UTF-8"));
    }

    #[test]
    fn test_builder_content_type_overrides_default() {
        let mut c = ctx();
        c.header("Content-Type", "application/vnd.api+json");
        let res = c.json(&json!({"ok": true})).unwrap();
        assert_eq!(res.get_headers("content-type"), vec!["application/vnd.api+json"]);
    }

    #[test]
    fn test_header_replaces_append_keeps() {
        let mut c = ctx();
        c.header("X-A", "1").header("x-a", "2");
        c.append_header("Set-Cookie", "a=1").append_header("Set-Cookie", "b=2");
        let res = c.send("", "text/plain");
        assert_eq!(res.get_headers("X-A"), vec!["2"]);
        assert_eq!(res.get_headers("Set-Cookie"), vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_redirect() {
        let c = ctx();
        let res = c.redirect("/login");
        assert_eq!(res.status, 302);
        assert_eq!(res.get_header("Location"), Some("/login"));
        assert!(res.body.is_empty());
        assert_eq!(c.redirect_with("/moved", 308).status, 308);
    }

    #[test]
    fn test_finalize_keeps_explicit_headers() {
        let mut c = ctx();
        c.header("X-Test", "1").header("Content-Type", "text/csv");
        let res = c.finalize(Response::text(200, "ok"));
        assert_eq!(res.get_header("X-Test"), Some("1"));
        assert_eq!(res.get_headers("Content-Type"), vec!["text/plain; charset=UTF-8"]);
    }

    #[test]
    fn test_view_without_renderer_fails() {
        let c = ctx();
        let err = c.view("home", &json!({})).unwrap_err();
        assert_eq!(err.status(), 500);
        assert!(err.to_string().contains("home"));
    }

    #[test]
    fn test_second_renderer_fails() {
        let mut c = ctx();
        c.render(|name: &str, _: &Value| Ok(name.to_string())).unwrap();
        let err = c.render(|_: &str, _: &Value| Ok(String::new())).unwrap_err();
        let internal = err.as_internal().unwrap();
        assert!(internal.type_name().ends_with("ContextError"));
    }

    #[test]
    fn test_view_renders_html() {
        let mut c = ctx();
        c.render(|name: &str, data: &Value| Ok(format!("<h1>{name}: {}</h1>", data["title"])))
            .unwrap();
        let res = c.view("page", &json!({"title": "Hi"})).unwrap();
        assert_eq!(res.body_string(), r#"<h1>page: "Hi"</h1>"#);
        assert_eq!(res.get_header("Content-Type"), Some("text/html; charset=UTF-8"));
    }

    #[test]
    fn test_extensions_carry_typed_values() {
        #[derive(Clone, Debug, PartialEq)]
        struct UserId(u64);
        let mut c = ctx();
        c.extensions_mut().insert(UserId(5));
        assert_eq!(c.extensions().get::<UserId>(), Some(&UserId(5)));
    }
}
