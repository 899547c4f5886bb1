//! In-memory items API on top of nanoserver.
//!
//! ```text
//! cargo run --example items [config.toml]
//!
//! curl localhost:8080/items
//! curl -XPOST localhost:8080/items -d '{"name":"Item 3"}'
//! curl -XPUT localhost:8080/items/3 -d '{"name":"Renamed"}'
//! curl -XDELETE localhost:8080/items/3
//! ```
//!
//! `POST /items` reports its own validation errors as 400. Everything else
//! that goes wrong inside a handler falls through to the framework's 500.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use nanoserver::{
    Context, HandlerError, HandlerResult, IntoHandler, Method, NanoServer, ServerConfig,
    StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize)]
struct Item {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ItemBody {
    name: Option<String>,
}

type Store = Arc<Mutex<Vec<Item>>>;

fn lock(store: &Store) -> Result<MutexGuard<'_, Vec<Item>>, HandlerError> {
    store
        .lock()
        .map_err(|_| HandlerError::msg("item store is unavailable"))
}

// Binds a store-aware handler to a clone of the store.
fn with_store<F, Fut>(store: &Store, handler: F) -> impl IntoHandler
where
    F: Fn(Context, Store) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let store = Arc::clone(store);
    move |ctx: Context| handler(ctx, Arc::clone(&store))
}

fn item_id(ctx: &Context) -> Option<u64> {
    ctx.param("id")?.parse().ok()
}

fn invalid_id(ctx: &Context) -> HandlerResult {
    ctx.send_json(&json!({"error": "Invalid ID"}), StatusCode::BadRequest)
}

fn not_found(ctx: &Context) -> HandlerResult {
    ctx.send_json(&json!({"error": "Item not found"}), StatusCode::NotFound)
}

async fn hello(ctx: Context) -> HandlerResult {
    ctx.send_json_ok(&json!({"message": "Hello from NanoServer!"}))
}

async fn list_items(ctx: Context, store: Store) -> HandlerResult {
    let items = lock(&store)?.clone();
    ctx.send_json_ok(&items)
}

fn required_name(ctx: &Context) -> Result<String, HandlerError> {
    let body: ItemBody = ctx.json()?;
    body.name
        .ok_or_else(|| HandlerError::msg("Missing 'name' field"))
}

async fn create_item(ctx: Context, store: Store) -> HandlerResult {
    let name = match required_name(&ctx) {
        Ok(name) => name,
        Err(err) => {
            return ctx.send_json(&json!({"error": err.to_string()}), StatusCode::BadRequest);
        }
    };

    let item = {
        let mut items = lock(&store)?;
        let id = items.iter().map(|item| item.id).max().unwrap_or(0) + 1;
        let item = Item { id, name };
        items.push(item.clone());
        item
    };
    ctx.send_json(&item, StatusCode::Created)
}

async fn show_item(ctx: Context, store: Store) -> HandlerResult {
    let Some(id) = item_id(&ctx) else {
        return invalid_id(&ctx);
    };
    let found = lock(&store)?.iter().find(|item| item.id == id).cloned();
    match found {
        Some(item) => ctx.send_json_ok(&item),
        None => not_found(&ctx),
    }
}

async fn update_item(ctx: Context, store: Store) -> HandlerResult {
    let Some(id) = item_id(&ctx) else {
        return invalid_id(&ctx);
    };
    let body: ItemBody = match ctx.json() {
        Ok(body) => body,
        Err(err) => {
            return ctx.send_json(&json!({"error": err.to_string()}), StatusCode::BadRequest);
        }
    };

    let updated = {
        let mut items = lock(&store)?;
        items.iter_mut().find(|item| item.id == id).map(|item| {
            if let Some(name) = body.name {
                item.name = name;
            }
            item.clone()
        })
    };
    match updated {
        Some(item) => ctx.send_json_ok(&item),
        None => not_found(&ctx),
    }
}

async fn delete_item(ctx: Context, store: Store) -> HandlerResult {
    let Some(id) = item_id(&ctx) else {
        return invalid_id(&ctx);
    };
    let deleted = {
        let mut items = lock(&store)?;
        items
            .iter()
            .position(|item| item.id == id)
            .map(|index| items.remove(index))
    };
    match deleted {
        Some(item) => ctx.send_json_ok(&json!({"deleted": item})),
        None => not_found(&ctx),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    let store: Store = Arc::new(Mutex::new(vec![
        Item {
            id: 1,
            name: "Item 1".to_owned(),
        },
        Item {
            id: 2,
            name: "Item 2".to_owned(),
        },
    ]));

    let mut server = NanoServer::with_config(config);
    server
        .get("/", hello)
        .get("/items", with_store(&store, list_items))
        .post("/items", with_store(&store, create_item))
        .route_pattern("/items/:id", Method::Get, with_store(&store, show_item))
        .route_pattern("/items/:id", Method::Put, with_store(&store, update_item))
        .route_pattern("/items/:id", Method::Delete, with_store(&store, delete_item));

    server.run().await?;
    Ok(())
}
