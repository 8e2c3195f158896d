use axum::{
    http::{HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use dotenvy::dotenv;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

mod controllers;
mod db;
mod middleware;
mod models;
mod policy;
mod realtime;
mod routes;
mod services;
mod state;
mod store;
mod utils;

use realtime::{gateway, session::SessionRegistry, WsNotifier};
use services::poll_service::PollService;
use store::memory::{MemoryPollStore, MemoryUserDirectory};
use store::mongo::{MongoPollStore, MongoUserDirectory};
use store::{PollStore, UserDirectory};

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (polls, users): (Arc<dyn PollStore>, Arc<dyn UserDirectory>) =
        match std::env::var("MONGO_URI") {
            Ok(uri) => {
                let database = match db::connection::init_db(&uri).await {
                    Ok(database) => database,
                    Err(e) => {
                        tracing::error!("failed to initialize database: {}", e);
                        std::process::exit(1);
                    }
                };
                (
                    Arc::new(MongoPollStore::new(&database)),
                    Arc::new(MongoUserDirectory::new(&database)),
                )
            }
            Err(_) => {
                tracing::warn!("MONGO_URI not set, falling back to in-memory stores");
                let directory = MemoryUserDirectory::new();
                // seed one admin so the API is usable without a database
                let admin_id = mongodb::bson::oid::ObjectId::new();
                directory.insert(models::user_models::User {
                    id: admin_id,
                    username: "admin".to_string(),
                    email: "admin@localhost".to_string(),
                    role: models::user_models::Role::Admin,
                });
                tracing::info!(%admin_id, "seeded in-memory admin user");
                (Arc::new(MemoryPollStore::new()), Arc::new(directory))
            }
        };

    let registry = Arc::new(SessionRegistry::new());
    let notifier = Arc::new(WsNotifier::new(registry.clone()));
    let service = Arc::new(PollService::new(polls, users.clone(), notifier));
    let app_state = state::AppState::new(service, users, registry);

    let cors_origin = std::env::var("CORS_ORIGIN").unwrap_or_else(|_| {
        tracing::warn!("CORS_ORIGIN not set, defaulting to http://localhost:5173");
        "http://localhost:5173".to_string()
    });
    let origin = cors_origin.parse::<HeaderValue>().unwrap_or_else(|_| {
        tracing::error!("failed to parse CORS origin: {}", cors_origin);
        std::process::exit(1);
    });

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::header::AUTHORIZATION,
            axum::http::header::COOKIE,
        ])
        .allow_credentials(true);

    let realtime = Router::new()
        .route("/ws", get(gateway::ws_handler))
        .with_state(app_state.clone());

    let app = Router::new()
        .route("/", get(root))
        .nest("/api/polls", routes::poll_routes::poll_routes(app_state.clone()))
        .nest("/api/users", routes::user_routes::user_routes(app_state.clone()))
        .merge(realtime)
        .layer(cors);

    let server_addr =
        std::env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let addr: SocketAddr = server_addr.parse().unwrap_or_else(|_| {
        tracing::error!("failed to parse SERVER_ADDR: {}", server_addr);
        std::process::exit(1);
    });

    tracing::info!("server running at http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", e);
        std::process::exit(1);
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Polling backend is running"
    }))
}
