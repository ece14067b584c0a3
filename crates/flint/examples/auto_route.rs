//! Convention-based controller dispatch.
//!
//! Run with: cargo run --example auto_route -p flint

use flint::prelude::*;

/// Full CRUD-by-convention controller: operation names map to routes.
#[derive(Default)]
struct Product;

impl Controller for Product {
    fn expose(ops: &mut Operations<Self>) {
        ops.expose("Index", Self::index);
        ops.expose("Show", Self::show);
        ops.expose("Create", Self::create);
        ops.expose("Store", Self::store);
        ops.expose("Edit", Self::edit);
        ops.expose("Update", Self::update);
        ops.expose("Delete", Self::delete);
        ops.expose("Search", Self::search);
    }
}

impl Product {
    fn index(&mut self, ctx: &mut Context) -> Result<(), Error> {
        ctx.json(
            StatusCode::OK,
            &serde_json::json!({
                "message": "List all products",
                "products": [
                    { "id": 1, "name": "Laptop" },
                    { "id": 2, "name": "Mouse" },
                ],
            }),
        )
    }

    fn show(&mut self, ctx: &mut Context) -> Result<(), Error> {
        let id = ctx.param("id").unwrap_or("").to_owned();
        ctx.json(
            StatusCode::OK,
            &serde_json::json!({ "message": "Show product", "id": id }),
        )
    }

    fn create(&mut self, ctx: &mut Context) -> Result<(), Error> {
        ctx.json(
            StatusCode::OK,
            &serde_json::json!({ "message": "Show create form" }),
        )
    }

    fn store(&mut self, ctx: &mut Context) -> Result<(), Error> {
        #[derive(Deserialize, Serialize)]
        struct Input {
            name: String,
        }
        let input: Input = ctx.bind()?;
        ctx.json(
            StatusCode::CREATED,
            &serde_json::json!({ "message": "Product created", "product": input }),
        )
    }

    fn edit(&mut self, ctx: &mut Context) -> Result<(), Error> {
        let id = ctx.param("id").unwrap_or("").to_owned();
        ctx.json(
            StatusCode::OK,
            &serde_json::json!({ "message": "Show edit form", "id": id }),
        )
    }

    fn update(&mut self, ctx: &mut Context) -> Result<(), Error> {
        let id = ctx.param("id").unwrap_or("").to_owned();
        ctx.json(
            StatusCode::OK,
            &serde_json::json!({ "message": "Product updated", "id": id }),
        )
    }

    fn delete(&mut self, ctx: &mut Context) -> Result<(), Error> {
        let id = ctx.param("id").unwrap_or("").to_owned();
        ctx.json(
            StatusCode::OK,
            &serde_json::json!({ "message": "Product deleted", "id": id }),
        )
    }

    fn search(&mut self, ctx: &mut Context) -> Result<(), Error> {
        let q = ctx.query_default("q", "").to_owned();
        ctx.json(
            StatusCode::OK,
            &serde_json::json!({ "message": "Search products", "query": q }),
        )
    }
}

/// Controller registered below an `admin` prefix.
#[derive(Default)]
struct Dashboard;

impl Controller for Dashboard {
    fn expose(ops: &mut Operations<Self>) {
        ops.expose("Index", |_, ctx| {
            ctx.json(
                StatusCode::OK,
                &serde_json::json!({ "message": "Admin dashboard" }),
            )
        });
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .init();

    let mut app = Application::new();
    app.middleware(recovery());
    app.middleware(logger());

    app.register::<Product>();
    app.register_with_prefix::<Dashboard>("admin");
    app.auto_route();

    println!("Auto-generated routes:");
    println!("  GET    /product           -> Product::index");
    println!("  GET    /product/:id       -> Product::show");
    println!("  GET    /product/create    -> Product::create");
    println!("  POST   /product           -> Product::store");
    println!("  GET    /product/:id/edit  -> Product::edit");
    println!("  PUT    /product/:id       -> Product::update (also POST)");
    println!("  DELETE /product/:id       -> Product::delete (also POST)");
    println!("  GET    /product/search    -> Product::search (also POST)");
    println!("  GET    /admin/dashboard   -> Dashboard::index");
    println!();

    for request in [
        Request::get("/product"),
        Request::get("/product/7"),
        Request::post("/product").body(br#"{"name":"Keyboard"}"#.to_vec()),
        Request::new(Method::Put, "/product/7"),
        Request::new(Method::Delete, "/product/7"),
        Request::get("/product/search?q=laptop"),
        Request::get("/admin/dashboard"),
    ] {
        let line = format!("{} {}", request.method(), request.path());
        let resp = app.handle(request);
        println!("{line} -> {} {}", resp.status(), resp.text());
    }
}
