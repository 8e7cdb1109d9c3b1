//! WebSocket handler for Axum
//!
//! Handles WebSocket connections and event routing. Connections are
//! anonymous at upgrade time; identity (seller dashboard, delivery agent,
//! customer) is declared through registration events after connecting.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::dispatch::{arbiter, broadcaster, chat, location};
use crate::state::AppState;

use super::{
    connection::Connection,
    events::{ClientEvent, ServerEvent},
    room::{order_room, SELLER_ROOM},
};

/// WebSocket handler - upgrades HTTP connection to WebSocket
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Create channel for sending events to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let conn = Connection::new(tx);
    let conn = app_state.ws.add_connection(conn).await;
    let session_id = conn.session_id;

    // Send connection acknowledgment
    let _ = conn.send(ServerEvent::Connected { session_id });

    // Spawn task to send messages to client
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize WebSocket event");
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = receiver.next().await {
        if let Ok(msg) = msg {
            match msg {
                Message::Text(text) => {
                    match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            handle_client_event(event, Arc::clone(&conn), app_state.clone()).await;
                        }
                        Err(e) => {
                            tracing::warn!(
                                error = ?e,
                                message = %text,
                                "Failed to parse client event"
                            );
                            let _ = conn.send(ServerEvent::Error {
                                message: "Invalid event format".to_string(),
                            });
                        }
                    }
                }
                Message::Close(_) => {
                    tracing::info!(session_id = %session_id, "WebSocket close frame received");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // Axum handles ping/pong automatically
                }
                _ => {} // Ignore binary messages
            }
        }
    }

    // Cleanup on disconnect: the reaper drops the connection from the
    // registry and every room it joined.
    tracing::info!(session_id = %session_id, "WebSocket connection closing");
    app_state.ws.remove_connection(&session_id).await;

    send_task.abort();
}

/// Handle client event
pub async fn handle_client_event(event: ClientEvent, conn: Arc<Connection>, state: AppState) {
    use ClientEvent::*;

    match event {
        SetName { name } => {
            conn.set_name(name).await;
        }

        JoinSeller => {
            state.ws.rooms.join(SELLER_ROOM, Arc::clone(&conn)).await;
            tracing::debug!(session_id = %conn.session_id, "Seller dashboard joined");
        }

        RegisterAgent { agent_id } => {
            state.ws.bind_agent(&conn, agent_id).await;

            // Reply with the agent's current assignments so a reconnecting
            // client can rebuild its view
            match state.store.orders_for_agent(agent_id).await {
                Ok(orders) => {
                    let _ = conn.send(ServerEvent::MyOrders { orders });
                }
                Err(e) => {
                    tracing::error!(agent_id = %agent_id, error = ?e, "Order list fetch failed");
                    let _ = conn.send(ServerEvent::Error {
                        message: "Could not load your orders, please retry".to_string(),
                    });
                }
            }
        }

        JoinOrderRoom { order_id } => {
            state
                .ws
                .rooms
                .join(&order_room(order_id), Arc::clone(&conn))
                .await;
        }

        RequestLocation { room } => {
            location::request_location(&state, &conn, &room).await;
        }

        ShareLocation { room, location } => {
            location::share_location(&state, &conn, &room, location).await;
        }

        RequestConnection { room } => {
            chat::request_connection(&state, &conn, &room).await;
        }

        AcceptConnection { room, sender_id } => {
            chat::accept_connection(&state, &conn, &room, sender_id).await;
        }

        RejectConnection { room, sender_id } => {
            chat::reject_connection(&state, &conn, &room, sender_id).await;
        }

        SendMessage {
            room,
            message,
            sender_name,
            sender_role,
            timestamp,
        } => {
            chat::send_message(
                &state,
                &conn,
                &room,
                message,
                sender_name,
                sender_role,
                timestamp,
            )
            .await;
        }

        SendToDelivery { order } => {
            broadcaster::announce(&state, order.id).await;
        }

        AcceptOrder { order_id } => {
            arbiter::accept_order(&state, &conn, order_id).await;
        }

        UpdateOrderStatus { order_id, status } => {
            arbiter::update_order_status(&state, &conn, order_id, status).await;
        }

        Ping => {
            let _ = conn.send(ServerEvent::Pong);
        }
    }
}
