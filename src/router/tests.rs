use super::*;
use crate::context::Context;
use crate::middleware::{from_fn, Handler};
use crate::response::Response;
use http::Method;
use std::sync::Arc;

fn noop() -> Arc<dyn Handler> {
    Arc::new(|_c: &mut Context| Response::empty(200))
}

fn route(method: Method, pattern: &str) -> Route {
    Route::new(method, pattern, noop(), Vec::new())
}

#[test]
fn test_root_path() {
    let mut router = Router::new();
    router.add_route(route(Method::GET, "/"));
    let m = router.find_route(&Method::GET, "/").unwrap();
    assert_eq!(m.route.pattern, "/");
    assert!(m.params.is_empty());
    assert!(router.find_route(&Method::GET, "").is_some());
}

#[test]
fn test_parameterized_path() {
    let mut router = Router::new();
    router.add_route(route(Method::GET, "/items/:id"));
    let m = router.find_route(&Method::GET, "/items/123").unwrap();
    assert_eq!(m.param("id"), Some("123"));
    assert_eq!(m.route.param_names(), vec!["id"]);
}

#[test]
fn test_params_in_pattern_order() {
    let mut router = Router::new();
    router.add_route(route(Method::GET, "/users/:user/posts/:post"));
    let m = router.find_route(&Method::GET, "/users/7/posts/abc").unwrap();
    let pairs: Vec<(&str, &str)> = m
        .params
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_str()))
        .collect();
    assert_eq!(pairs, vec![("user", "7"), ("post", "abc")]);
}

#[test]
fn test_segment_count_must_match() {
    let mut router = Router::new();
    router.add_route(route(Method::GET, "/a/:b"));
    assert!(router.find_route(&Method::GET, "/a").is_none());
    assert!(router.find_route(&Method::GET, "/a/1/2").is_none());
}

#[test]
fn test_param_never_matches_empty_segment() {
    let mut router = Router::new();
    router.add_route(route(Method::GET, "/a/:b/c"));
    assert!(router.find_route(&Method::GET, "/a//c").is_none());
}

#[test]
fn test_method_must_match() {
    let mut router = Router::new();
    router.add_route(route(Method::POST, "/items"));
    assert!(router.find_route(&Method::GET, "/items").is_none());
    assert!(router.find_route(&Method::POST, "/items").is_some());
}

#[test]
fn test_first_match_wins_over_specificity() {
    let mut router = Router::new();
    router.add_route(route(Method::GET, "/users/:id"));
    router.add_route(route(Method::GET, "/users/special"));
    let m = router.find_route(&Method::GET, "/users/special").unwrap();
    assert_eq!(m.route.pattern, "/users/:id");
    assert_eq!(m.param("id"), Some("special"));
}

#[test]
fn test_duplicate_registration_keeps_first() {
    let mut router = Router::new();
    let first = route(Method::GET, "/dup");
    let second = Route::new(
        Method::GET,
        "/dup",
        noop(),
        vec![from_fn(|c, next| next.run(c))],
    );
    router.add_route(first);
    router.add_route(second);
    assert_eq!(router.len(), 2);
    let m = router.find_route(&Method::GET, "/dup").unwrap();
    assert!(m.middleware().is_empty());
}

#[test]
fn test_inner_colon_is_literal() {
    assert_eq!(Segment::parse("a:b"), Segment::Literal("a:b".to_string()));
    assert_eq!(Segment::parse(":"), Segment::Literal(":".to_string()));
    assert_eq!(Segment::parse(":id"), Segment::Param(Arc::from("id")));

    let mut router = Router::new();
    router.add_route(route(Method::GET, "/time/12:30"));
    assert!(router.find_route(&Method::GET, "/time/12:30").is_some());
    assert!(router.find_route(&Method::GET, "/time/13:00").is_none());
}

#[test]
fn test_trailing_slashes_are_trimmed_for_matching() {
    let mut router = Router::new();
    router.add_route(route(Method::GET, "/docs/"));
    assert_eq!(router.routes()[0].pattern, "/docs");
    assert!(router.find_route(&Method::GET, "docs").is_some());
}

#[test]
fn test_join_paths() {
    assert_eq!(join_paths("/api", "/"), "/api");
    assert_eq!(join_paths("/", "/x"), "/x");
    assert_eq!(join_paths("/api/", "x/:id"), "/api/x/:id");
    assert_eq!(join_paths("", ""), "/");
}

#[test]
fn test_normalize_path() {
    assert_eq!(normalize_path(""), "/");
    assert_eq!(normalize_path("users/1/"), "/users/1");
    assert_eq!(normalize_path("/"), "/");
}

#[test]
fn test_with_inherited_is_clamped() {
    let r = route(Method::GET, "/x").with_inherited(3);
    assert_eq!(r.inherited, 0);
    assert!(r.own_middleware().is_empty());
}

#[test]
fn test_repeated_param_name_last_value_wins() {
    let mut router = Router::new();
    router.add_route(route(Method::GET, "/pairs/:id/:id"));
    let m = router.find_route(&Method::GET, "/pairs/1/2").unwrap();
    assert_eq!(m.route.param_names(), vec!["id", "id"]);
    assert_eq!(m.params.len(), 2);
    assert_eq!(m.param("id"), Some("2"));
}
