use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::session::{SessionIdentity, SessionRegistry};
use crate::state::AppState;

/// Messages a client may send over the socket. Identity is self-reported
/// once after connecting; everything else the client receives, not sends.
#[derive(Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Authenticate { user_id: String },
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| client_session(socket, state.registry.clone()))
}

async fn client_session(socket: WebSocket, registry: Arc<SessionRegistry>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn_id = registry.register(tx);
    tracing::debug!(%conn_id, "realtime session connected");

    let send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => handle_client_message(&registry, conn_id, text.as_str()),
            Message::Close(_) => break,
            _ => {}
        }
    }

    match registry.identity(conn_id) {
        Some(SessionIdentity::Authenticated(user)) => {
            tracing::debug!(%conn_id, %user, "realtime session disconnected");
        }
        _ => tracing::debug!(%conn_id, "realtime session disconnected"),
    }
    registry.unregister(conn_id);
    send_task.abort();
}

fn handle_client_message(registry: &SessionRegistry, conn_id: Uuid, raw: &str) {
    let message = match serde_json::from_str::<ClientMessage>(raw) {
        Ok(message) => message,
        Err(_) => {
            tracing::debug!(%conn_id, "ignoring unrecognized realtime message");
            return;
        }
    };

    match message {
        ClientMessage::Authenticate { user_id } => match ObjectId::parse_str(&user_id) {
            Ok(user) => {
                if registry.authenticate(conn_id, user) {
                    tracing::debug!(%conn_id, %user, "realtime session authenticated");
                }
            }
            Err(_) => {
                tracing::debug!(%conn_id, "authenticate carried an invalid user id");
            }
        },
    }
}
