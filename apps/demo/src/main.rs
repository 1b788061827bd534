//! Example service: a small product catalogue.
//!
//! Configuration comes from the environment (a `.env` file is loaded first):
//! - `XYLITOL_LOG_LEVEL`, `XYLITOL_LOG_FILE`: logger level and file
//! - `DEMO_ADDR`: listen address, default `127.0.0.1:8080`
//! - `DEMO_DB`: SQLite file, default `tmp/demo.db`
//! - `DEMO_DB_LOG_LEVEL`: silent, error, warn or info (default info)

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::Response;
use axum::routing::get;
use axum::{Form, Router};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use xylitol_core::{set_default_logger, Field, Logger, LoggerConfig};
use xylitol_storage::{Database, DbLogLevel, DbLogger, QueryLogger};
use xylitol_web::{recovery, request_logging, Recovery, Reply};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS products (
    code TEXT PRIMARY KEY,
    price INTEGER NOT NULL
)";

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database<DbLogger>>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Product {
    code: String,
    price: i64,
}

async fn ping() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn list_products(State(state): State<AppState>, reply: Reply) -> Response {
    let products = state.db.lock().query_map(
        "SELECT code, price FROM products ORDER BY code",
        [],
        |row| {
            Ok(Product {
                code: row.get(0)?,
                price: row.get(1)?,
            })
        },
    );
    match products {
        Ok(products) => reply.ok(products, "ok"),
        Err(e) => reply.error(500, Some(&e), "failed to list products"),
    }
}

async fn create_product(
    State(state): State<AppState>,
    reply: Reply,
    Form(product): Form<Product>,
) -> Response {
    let result = state.db.lock().execute(
        "INSERT INTO products (code, price) VALUES (?1, ?2)",
        (&product.code, product.price),
    );
    match result {
        Ok(_) => reply.ok(product, "created"),
        Err(e) => reply.error(409, Some(&e), "product already exists"),
    }
}

async fn get_product(
    State(state): State<AppState>,
    Path(code): Path<String>,
    reply: Reply,
) -> Response {
    let price = state.db.lock().query_row(
        "SELECT price FROM products WHERE code = ?1",
        [code.as_str()],
        |row| row.get::<_, i64>(0),
    );
    match price {
        Ok(price) => reply.ok(Product { code, price }, "found"),
        Err(e) => reply.error(404, Some(&e), "product not found"),
    }
}

async fn crash() -> Response {
    panic!("demo panic")
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = LoggerConfig::from_env();
    let logger = Arc::new(Logger::from_config(&config));
    if let Err(e) = config.validate() {
        logger.warn("falling back to info level", Field::error(&e));
    }
    set_default_logger(logger.clone());

    let db_level = env_or("DEMO_DB_LOG_LEVEL", "info")
        .parse::<DbLogLevel>()
        .context("invalid DEMO_DB_LOG_LEVEL")?;
    let db_path = env_or("DEMO_DB", "tmp/demo.db");
    let db = Database::open(db_path.as_ref(), DbLogger::new(logger.clone()).log_mode(db_level))
        .with_context(|| format!("failed to open database at {}", db_path))?;
    db.execute_batch(SCHEMA).context("failed to create schema")?;

    let state = AppState {
        db: Arc::new(Mutex::new(db)),
    };

    let app = Router::new()
        .route("/ping", get(ping))
        .route("/products", get(list_products).post(create_product))
        .route("/products/{code}", get(get_product))
        .route("/crash", get(crash))
        .with_state(state)
        .layer(from_fn_with_state(Recovery::new(true), recovery))
        .layer(from_fn_with_state(logger.clone(), request_logging));

    let addr = env_or("DEMO_ADDR", "127.0.0.1:8080");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => logger.fatal("failed to bind listener", Field::error(&e)),
    };
    logger.info("listening", Field::str("addr", addr));

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
