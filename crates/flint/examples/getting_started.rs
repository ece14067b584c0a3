//! Getting started: manual routes, groups and middleware.
//!
//! Run with: cargo run --example getting_started -p flint

use flint::prelude::*;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut app = Application::new();
    app.middleware(recovery());
    app.middleware(logger());

    app.get("/", |ctx| {
        ctx.json(
            StatusCode::OK,
            &serde_json::json!({ "message": "Welcome to flint!" }),
        )
    });

    app.get("/hello/:name", |ctx| {
        let name = ctx.param("name").unwrap_or("world").to_owned();
        ctx.text(StatusCode::OK, format!("Hello, {name}!"))
    });

    let mut api = app.group("/api").middleware(middleware_fn(|next| {
        handler_fn(move |ctx| {
            ctx.set_header("x-api-version", "1");
            next(ctx)
        })
    }));
    api.get("/health", |ctx| {
        ctx.json(StatusCode::OK, &serde_json::json!({ "status": "healthy" }))
    });

    // The façade consumes parsed requests and returns responses; a
    // transport layer would sit in front of `handle`.
    let resp = app.handle(Request::get("/"));
    println!("GET /            -> {} {}", resp.status(), resp.text());
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.handle(Request::get("/hello/flint"));
    println!("GET /hello/flint -> {} {}", resp.status(), resp.text());
    assert_eq!(resp.text(), "Hello, flint!");

    let resp = app.handle(Request::get("/api/health"));
    println!(
        "GET /api/health  -> {} {} (x-api-version: {})",
        resp.status(),
        resp.text(),
        resp.header_value("x-api-version").unwrap_or("-")
    );

    let resp = app.handle(Request::get("/nonexistent"));
    println!("GET /nonexistent -> {}", resp.status());
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    println!("\nAll getting-started requests behaved as expected.");
}
