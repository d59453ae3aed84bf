use serde_json::Value;
use strata::server::{status_line, write_http, MemoryServer, ServerAdapter};
use strata::{App, Context, Environment, Response};

fn app() -> App {
    let mut app = App::with_environment(Environment::Testing);
    app.post("/echo/:id", |c: &mut Context| {
        let id = c.req.param("id").unwrap_or_default().to_string();
        let body = c.req.body()?;
        c.header("X-Echo-Id", id);
        c.json(&body)
    });
    app
}

#[test]
fn test_run_reads_request_and_sends_response() {
    let mut server = MemoryServer::new("POST", "/echo/5?debug=1")
        .with_header("Content-Type", "application/json")
        .with_body(r#"{"ok":true}"#);

    app().run(&mut server).unwrap();

    let res = server.response().unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.get_header("X-Echo-Id"), Some("5"));
    let body: Value = serde_json::from_slice(&res.body).unwrap();
    assert_eq!(body["ok"], true);
}

#[test]
fn test_invalid_method_token_is_400() {
    let mut server = MemoryServer::new("GE T", "/echo/5");
    app().run(&mut server).unwrap();

    let res = server.into_response().unwrap();
    assert_eq!(res.status, 400);
    let body: Value = serde_json::from_slice(&res.body).unwrap();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[test]
fn test_unknown_but_valid_method_is_404() {
    let mut server = MemoryServer::new("PURGE", "/echo/5");
    app().run(&mut server).unwrap();
    assert_eq!(server.response().unwrap().status, 404);
}

#[test]
fn test_memory_server_body_is_consumed_once() {
    let mut server = MemoryServer::new("POST", "/").with_body("abc");
    assert_eq!(server.body().unwrap(), b"abc".to_vec());
    assert!(server.body().unwrap().is_empty());
    assert!(server.response().is_none());
}

#[test]
fn test_trailing_slash_through_adapter() {
    let mut server = MemoryServer::new("GET", "/echo/5/");
    app().run(&mut server).unwrap();
    let res = server.response().unwrap();
    assert_eq!(res.status, 301);
    assert_eq!(res.get_header("Location"), Some("/echo/5"));
}

#[test]
fn test_write_http_format() {
    assert_eq!(status_line(301), "HTTP/1.1 301 Moved Permanently");

    let res = Response::redirect("/next", 302);
    let mut out = Vec::new();
    write_http(&res, &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "HTTP/1.1 302 Found\r\nLocation: /next\r\nContent-Length: 0\r\n\r\n"
    );
}
