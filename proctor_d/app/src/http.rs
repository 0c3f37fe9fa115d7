use anyhow::Result;
use axum::{extract::State, routing::get, Json, Router};
use log::info;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::session::SharedEngine;
use crate::sinks::EventLog;

#[derive(Clone)]
struct HttpState {
    log: EventLog,
    engine: SharedEngine,
}

pub fn get_router(log: EventLog, engine: SharedEngine) -> Router {
    let state = HttpState { log, engine };

    Router::new()
        .route("/events", get(events_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

async fn events_handler(State(state): State<HttpState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "events": state.log.entries()
    }))
}

async fn status_handler(State(state): State<HttpState>) -> Json<Value> {
    let engine_state = {
        let engine = state
            .engine
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        format!("{:?}", engine.state())
    };
    Json(json!({
        "status": "ok",
        "state": engine_state,
        "events": state.log.len()
    }))
}

pub async fn serve(port: u16, router: Router) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, router).await
}

pub async fn serve_on(listener: TcpListener, router: Router) -> Result<()> {
    info!("Event log available on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
