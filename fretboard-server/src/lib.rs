use std::{
    io,
    net::{Ipv6Addr, SocketAddr},
};

use axum::{extract::DefaultBodyLimit, routing::get, Json};
use log::info;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

mod auth;
mod context;
mod docs;
mod errors;
mod routes;
mod schemas;
mod serialized;
mod sse;

pub use auth::SESSION_COOKIE;
pub use context::ServerContext;
pub use errors::{ServerError, ServerResult};

pub type Router = axum::Router<ServerContext>;

/// Builds the whole application, ready to be served
pub fn build_router(context: ServerContext) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/auth", auth::router())
        .merge(routes::router());

    let media = ServeDir::new(&context.config.storage.directory);
    let body_limit = DefaultBodyLimit::max(context.config.server.max_upload_bytes);

    Router::new()
        .nest("/v1", version_one_router)
        .route("/health", get(health))
        .route("/api.json", get(docs::docs))
        .nest_service("/media", media)
        .layer(body_limit)
        .layer(cors)
        .with_state(context)
}

/// Starts the fretboard server and relays jam events to its listeners
pub async fn run_server(context: ServerContext) -> io::Result<()> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, context.config.server.port).into();

    tokio::spawn(sse::relay_events(
        context.sse.clone(),
        context.collab.events(),
    ));

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, build_router(context).into_make_service()).await
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
