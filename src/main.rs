use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use strata::config::{AppConfig, Environment};
use strata::logging::init_logging;
use strata::middleware::Logger;
use strata::server::{write_http, MemoryServer};
use strata::{App, AppError, Context, HttpError, Response};

const HELLO_TEMPLATE: &str = "<!DOCTYPE html>\n<html>\n<body>\n<h1>Hello, {{ name }}!</h1>\n<p>Rendered in {{ environment }} mode.</p>\n</body>\n</html>\n";

/// Command-line interface for the strata demo application
#[derive(Parser)]
#[command(name = "strata", version)]
#[command(about = "Dispatch requests through the strata demo application", long_about = None)]
struct Cli {
    /// Optional YAML configuration file
    #[arg(short, long, global = true, env = "STRATA_CONFIG")]
    config: Option<PathBuf>,

    /// Environment override: development, production or testing
    #[arg(long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch one request and print the raw HTTP response
    Request {
        /// Request method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Request target, e.g. /greet/Ada?lang=en
        uri: String,

        /// Request header as 'Name: value' (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Print the demo route table
    Routes,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(env) = &cli.env {
        config.environment = Environment::parse(env);
    }
    init_logging(&config.log)?;

    let app = demo_app(&config).context("failed to build demo application")?;

    match cli.command {
        Commands::Routes => app.router().dump_routes(),
        Commands::Request {
            method,
            uri,
            headers,
            data,
        } => {
            let mut server = MemoryServer::new(&method, &uri);
            for header in &headers {
                let (name, value) = header
                    .split_once(':')
                    .with_context(|| format!("invalid header '{header}', expected 'Name: value'"))?;
                server = server.with_header(name.trim(), value.trim());
            }
            if let Some(body) = data {
                server = server.with_body(body);
            }

            app.run(&mut server).context("dispatch failed")?;
            let res = server.response().context("application sent no response")?;

            let mut out = io::stdout().lock();
            write_http(res, &mut out)?;
            writeln!(out)?;
        }
    }

    Ok(())
}

fn templates() -> Result<minijinja::Environment<'static>> {
    let mut env = minijinja::Environment::new();
    env.add_template("hello.html", HELLO_TEMPLATE)
        .context("invalid hello.html template")?;
    Ok(env)
}

fn demo_app(config: &AppConfig) -> Result<App> {
    let templates = Arc::new(templates()?);

    let mut api = App::with_config(config);
    api.use_at("/admin", |c, next| match c.req.header("Authorization") {
        Some("Bearer demo-token") => next.run(c),
        _ => Err(HttpError::unauthorized("Missing or invalid bearer token")
            .with_code("AUTH_REQUIRED")
            .into()),
    });
    api.get("/admin/stats", |c: &mut Context| {
        c.json(&json!({
            "environment": c.environment().as_str(),
            "request_id": c.request_id().to_string(),
        }))
    });
    api.post("/echo", |c: &mut Context| {
        let body = c.req.body()?;
        c.status(201).json(&json!({ "received": body }))
    });
    api.get("/items/:id", |c: &mut Context| {
        let id = c.req.param("id").unwrap_or_default();
        if id == "0" {
            return Err(HttpError::not_found().with_details(json!({ "id": id })).into());
        }
        c.json(&json!({ "id": id, "expand": c.req.queries("expand") }))
    });

    let mut app = App::with_config(config);
    app.add_middleware(Arc::new(Logger));
    app.use_middleware(|c, next| {
        c.header("X-Powered-By", "strata");
        next.run(c)
    });

    app.get("/", |c: &mut Context| c.text("Welcome to strata"));
    app.get("/greet/:name", |c: &mut Context| {
        let name = c.req.param("name").unwrap_or_default().to_string();
        c.text(format!("Hello, {name}"))
    });
    app.get("/old-home", |c: &mut Context| c.redirect("/"));
    app.get("/hello/:name", move |c: &mut Context| {
        let env = Arc::clone(&templates);
        c.render(move |name: &str, data: &Value| {
            let template = env.get_template(name)?;
            Ok(template.render(data)?)
        })?;
        let data = json!({
            "name": c.req.param("name").unwrap_or_default(),
            "environment": c.environment().as_str(),
        });
        c.view("hello.html", &data)
    });
    app.get("/teapot", |_c: &mut Context| {
        Err::<Response, _>(HttpError::new(418, "I'm a teapot").with_code("TEAPOT"))
    });
    app.get("/fail", |_c: &mut Context| -> Result<Response, AppError> {
        let count: u32 = "not a number".parse()?;
        Ok(Response::text(200, count.to_string()))
    });

    app.route("/api", &api);
    Ok(app)
}
