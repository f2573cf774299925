//! WebSocket Handlers
//!
//! Upgrade endpoints for the live feeds. Each upgraded socket is handed to
//! a [`Session`], which owns it until the connection closes.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use tracing::info;

use super::handlers::AppState;
use crate::error::AppError;
use crate::live::{Partition, Session};
use crate::models::CountryQuery;

/// Handler for GET /ws/colleges?country=
///
/// The country is validated before the upgrade, so a missing or blank
/// value is a plain 400 response.
pub async fn colleges_ws_handler(
    State(state): State<AppState>,
    Query(query): Query<CountryQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(country) = query.country() else {
        return AppError::InvalidRequest("country parameter required".to_string()).into_response();
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    info!(country = %country, "WebSocket connection request");

    let partition = Partition::country(country);
    let label = country.to_string();
    ws.on_upgrade(move |socket| run_session(socket, state, partition, label))
}

/// Handler for GET /ws/countries (also serves /ws)
pub async fn countries_ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    info!("Countries feed connection request");
    ws.on_upgrade(move |socket| {
        run_session(socket, state, Partition::Countries, "countries".to_string())
    })
}

async fn run_session(socket: WebSocket, state: AppState, partition: Partition, label: String) {
    let (sink, stream) = socket.split();
    let session = Session::new(
        partition,
        label,
        state.registry.clone(),
        state.store.clone(),
        state.session_config.clone(),
    );
    session.run(sink, stream).await;
}
