//! End-to-end dispatch scenarios driven through the event router
//!
//! These tests exercise the same code path the WebSocket handler uses,
//! feeding parsed client events into `handle_client_event` against an
//! in-memory store and inspecting what each connection's channel received.

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::mpsc;
use uuid::Uuid;

use fleetly_coordinator::store::{MemoryStore, OrderStore};
use fleetly_coordinator::websocket::connection::Connection;
use fleetly_coordinator::websocket::events::{ClientEvent, LocationSample, OrderRef, ServerEvent};
use fleetly_coordinator::websocket::handler::handle_client_event;
use fleetly_coordinator::websocket::room::{order_room, DELIVERY_ROOM};
use fleetly_coordinator::{AppState, Config};
use fleetly_shared::{
    AgentContact, AgentId, ChatStatus, HistoryAction, Order, OrderId, OrderStatus, Role,
};

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".to_string(),
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
    }
}

fn test_state() -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(test_config(), store.clone());
    (state, store)
}

fn sample_order() -> Order {
    Order {
        id: OrderId::new(),
        customer_id: Uuid::new_v4(),
        items: vec![],
        amount: 249.0,
        address: "12 Hill Road".into(),
        status: OrderStatus::Placed,
        chat_status: ChatStatus::None,
        payment_type: "COD".into(),
        is_paid: false,
        assigned_agent: None,
        agent: None,
        accepted_at: None,
        delivered_at: None,
        created_at: OffsetDateTime::now_utc(),
    }
}

fn sample_agent(name: &str) -> AgentContact {
    AgentContact {
        id: AgentId::new(),
        name: name.into(),
        phone: "9000000001".into(),
        vehicle: "bike".into(),
    }
}

async fn connect(state: &AppState) -> (Arc<Connection>, mpsc::UnboundedReceiver<ServerEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let conn = state.ws.add_connection(Connection::new(tx)).await;
    (conn, rx)
}

/// Register a connection as an agent through the event router and drain the
/// initial myOrders reply.
async fn connect_agent(
    state: &AppState,
    agent_id: AgentId,
) -> (Arc<Connection>, mpsc::UnboundedReceiver<ServerEvent>) {
    let (conn, mut rx) = connect(state).await;
    handle_client_event(
        ClientEvent::RegisterAgent { agent_id },
        Arc::clone(&conn),
        state.clone(),
    )
    .await;
    drain(&mut rx);
    (conn, rx)
}

async fn connect_seller(
    state: &AppState,
) -> (Arc<Connection>, mpsc::UnboundedReceiver<ServerEvent>) {
    let (conn, rx) = connect(state).await;
    handle_client_event(ClientEvent::JoinSeller, Arc::clone(&conn), state.clone()).await;
    (conn, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn register_replies_with_current_assignments() {
    let (state, store) = test_state();
    let agent = sample_agent("Ravi");
    store.insert_agent(agent.clone()).await;

    let mut assigned = sample_order();
    assigned.assigned_agent = Some(agent.id);
    assigned.status = OrderStatus::OutForDelivery;
    store.insert_order(assigned.clone()).await;
    store.insert_order(sample_order()).await; // unassigned, must not appear

    let (conn, mut rx) = connect(&state).await;
    handle_client_event(
        ClientEvent::RegisterAgent { agent_id: agent.id },
        Arc::clone(&conn),
        state.clone(),
    )
    .await;

    let events = drain(&mut rx);
    let Some(ServerEvent::MyOrders { orders }) = events
        .iter()
        .find(|e| matches!(e, ServerEvent::MyOrders { .. }))
    else {
        panic!("Expected myOrders reply, got {events:?}");
    };
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, assigned.id);

    // Registration also joins the claim pool
    assert_eq!(state.ws.rooms.room_size(DELIVERY_ROOM).await, 1);
}

#[tokio::test]
async fn concurrent_claims_have_exactly_one_winner() {
    let (state, store) = test_state();
    let order = sample_order();
    store.insert_order(order.clone()).await;

    let (_seller, mut seller_rx) = connect_seller(&state).await;

    let mut agents = Vec::new();
    for i in 0..8 {
        let contact = sample_agent(&format!("Agent{i}"));
        store.insert_agent(contact.clone()).await;
        let (conn, rx) = connect_agent(&state, contact.id).await;
        agents.push((conn, rx));
    }

    let mut tasks = Vec::new();
    for (conn, _) in &agents {
        let conn = Arc::clone(conn);
        let state = state.clone();
        let order_id = order.id;
        tasks.push(tokio::spawn(async move {
            handle_client_event(ClientEvent::AcceptOrder { order_id }, conn, state).await;
        }));
    }
    for task in tasks {
        task.await.expect("claim task panicked");
    }

    let mut winners = 0;
    let mut losers = 0;
    for (_, rx) in agents.iter_mut() {
        let events = drain(rx);
        let won = events
            .iter()
            .any(|e| matches!(e, ServerEvent::OrderUpdated { .. }));
        let lost = events.iter().any(|e| {
            matches!(
                e,
                ServerEvent::OrderRejectedNotification { success: false, .. }
            )
        });
        assert!(won ^ lost, "each claimant either wins or loses: {events:?}");
        // The winner is excluded from the pool-wide retraction
        if won {
            winners += 1;
            assert!(!events
                .iter()
                .any(|e| matches!(e, ServerEvent::OrderRemoved { .. })));
        } else {
            losers += 1;
            assert!(events
                .iter()
                .any(|e| matches!(e, ServerEvent::OrderRemoved { .. })));
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(losers, 7);

    // The seller dashboard hears about exactly one assignment
    let seller_events = drain(&mut seller_rx);
    let accepted: Vec<_> = seller_events
        .iter()
        .filter(|e| matches!(e, ServerEvent::OrderAcceptedByDelivery { .. }))
        .collect();
    assert_eq!(accepted.len(), 1);

    let stored = store.find_order(order.id).await.unwrap().unwrap();
    assert!(stored.assigned_agent.is_some());
    assert_eq!(stored.status, OrderStatus::OutForDelivery);

    // Exactly one accepted ledger entry
    let history = store.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, HistoryAction::Accepted);
}

#[tokio::test]
async fn cancel_returns_order_to_pool_for_another_agent() {
    let (state, store) = test_state();
    let order = sample_order();
    store.insert_order(order.clone()).await;

    let first = sample_agent("First");
    let second = sample_agent("Second");
    store.insert_agent(first.clone()).await;
    store.insert_agent(second.clone()).await;

    let (first_conn, mut first_rx) = connect_agent(&state, first.id).await;
    let (second_conn, mut second_rx) = connect_agent(&state, second.id).await;

    handle_client_event(
        ClientEvent::AcceptOrder { order_id: order.id },
        Arc::clone(&first_conn),
        state.clone(),
    )
    .await;
    drain(&mut first_rx);
    drain(&mut second_rx);

    // First agent cancels; the order goes back into circulation
    handle_client_event(
        ClientEvent::UpdateOrderStatus {
            order_id: order.id,
            status: OrderStatus::Cancelled,
        },
        Arc::clone(&first_conn),
        state.clone(),
    )
    .await;

    let second_events = drain(&mut second_rx);
    assert!(
        second_events
            .iter()
            .any(|e| matches!(e, ServerEvent::NewDeliveryOrder { .. })),
        "re-announce must reach the remaining pool: {second_events:?}"
    );

    let stored = store.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.assigned_agent, None);
    assert_eq!(stored.status, OrderStatus::Placed);

    // Second agent can now claim it
    handle_client_event(
        ClientEvent::AcceptOrder { order_id: order.id },
        Arc::clone(&second_conn),
        state.clone(),
    )
    .await;
    let stored = store.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.assigned_agent, Some(second.id));
}

#[tokio::test]
async fn delivery_settles_ledger_and_leaderboard() {
    let (state, store) = test_state();
    let order = sample_order();
    store.insert_order(order.clone()).await;
    let agent = sample_agent("Ravi");
    store.insert_agent(agent.clone()).await;

    let (_seller, mut seller_rx) = connect_seller(&state).await;
    let (conn, mut rx) = connect_agent(&state, agent.id).await;

    handle_client_event(
        ClientEvent::AcceptOrder { order_id: order.id },
        Arc::clone(&conn),
        state.clone(),
    )
    .await;
    drain(&mut rx);
    drain(&mut seller_rx);

    handle_client_event(
        ClientEvent::UpdateOrderStatus {
            order_id: order.id,
            status: OrderStatus::Delivered,
        },
        Arc::clone(&conn),
        state.clone(),
    )
    .await;

    let agent_events = drain(&mut rx);
    assert!(agent_events
        .iter()
        .any(|e| matches!(e, ServerEvent::OrderDelivered { .. })));
    assert!(agent_events
        .iter()
        .any(|e| matches!(e, ServerEvent::LeaderboardUpdated)));

    let seller_events = drain(&mut seller_rx);
    assert!(seller_events
        .iter()
        .any(|e| matches!(e, ServerEvent::OrderDelivered { .. })));

    assert_eq!(store.total_delivered(agent.id).await, 1);
    let history = store.history().await;
    assert!(history
        .iter()
        .any(|h| h.action == HistoryAction::Delivered && h.order_id == order.id));
}

#[tokio::test]
async fn unregistered_connection_cannot_claim() {
    let (state, store) = test_state();
    let order = sample_order();
    store.insert_order(order.clone()).await;

    let (conn, mut rx) = connect(&state).await;
    handle_client_event(
        ClientEvent::AcceptOrder { order_id: order.id },
        Arc::clone(&conn),
        state.clone(),
    )
    .await;

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, ServerEvent::Error { .. })));
    let stored = store.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.assigned_agent, None);
}

#[tokio::test]
async fn location_relay_suppresses_self_echo() {
    let (state, store) = test_state();
    let order = sample_order();
    store.insert_order(order.clone()).await;
    let room = order_room(order.id);

    let (agent_conn, mut agent_rx) = connect(&state).await;
    let (customer_conn, mut customer_rx) = connect(&state).await;
    for conn in [&agent_conn, &customer_conn] {
        handle_client_event(
            ClientEvent::JoinOrderRoom { order_id: order.id },
            Arc::clone(conn),
            state.clone(),
        )
        .await;
    }

    handle_client_event(
        ClientEvent::RequestLocation { room: room.clone() },
        Arc::clone(&customer_conn),
        state.clone(),
    )
    .await;
    assert!(drain(&mut agent_rx)
        .iter()
        .any(|e| matches!(e, ServerEvent::RequestLocationPing { .. })));
    assert!(drain(&mut customer_rx).is_empty(), "no self-echo");

    handle_client_event(
        ClientEvent::ShareLocation {
            room,
            location: LocationSample {
                latitude: 12.9716,
                longitude: 77.5946,
            },
        },
        Arc::clone(&agent_conn),
        state.clone(),
    )
    .await;

    let received = drain(&mut customer_rx);
    assert!(received.iter().any(|e| matches!(
        e,
        ServerEvent::ReceiveLocation {
            location: LocationSample { latitude, .. }
        } if *latitude == 12.9716
    )));
    assert!(drain(&mut agent_rx).is_empty(), "no self-echo");
}

#[tokio::test]
async fn chat_handshake_reject_then_accept() {
    let (state, store) = test_state();
    let order = sample_order();
    store.insert_order(order.clone()).await;
    let room = order_room(order.id);

    let (customer_conn, mut customer_rx) = connect(&state).await;
    let (agent_conn, mut agent_rx) = connect(&state).await;
    for conn in [&customer_conn, &agent_conn] {
        handle_client_event(
            ClientEvent::JoinOrderRoom { order_id: order.id },
            Arc::clone(conn),
            state.clone(),
        )
        .await;
    }
    customer_conn.set_name("Asha".into()).await;

    // Request reaches the agent, not the requester
    handle_client_event(
        ClientEvent::RequestConnection { room: room.clone() },
        Arc::clone(&customer_conn),
        state.clone(),
    )
    .await;
    let agent_events = drain(&mut agent_rx);
    assert!(agent_events.iter().any(|e| matches!(
        e,
        ServerEvent::RequestConnection { sender_name, .. } if sender_name.as_str() == "Asha"
    )));
    assert!(drain(&mut customer_rx).is_empty());

    // Reject resets the handshake and notifies the requester only
    handle_client_event(
        ClientEvent::RejectConnection {
            room: room.clone(),
            sender_id: customer_conn.session_id,
        },
        Arc::clone(&agent_conn),
        state.clone(),
    )
    .await;
    assert!(drain(&mut customer_rx)
        .iter()
        .any(|e| matches!(e, ServerEvent::RejectConnection)));
    let stored = store.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.chat_status, ChatStatus::None);

    // A fresh request can then be accepted; both ends are notified
    handle_client_event(
        ClientEvent::RequestConnection { room: room.clone() },
        Arc::clone(&customer_conn),
        state.clone(),
    )
    .await;
    drain(&mut agent_rx);
    handle_client_event(
        ClientEvent::AcceptConnection {
            room,
            sender_id: customer_conn.session_id,
        },
        Arc::clone(&agent_conn),
        state.clone(),
    )
    .await;
    assert!(drain(&mut customer_rx)
        .iter()
        .any(|e| matches!(e, ServerEvent::AcceptConnection)));
    assert!(drain(&mut agent_rx)
        .iter()
        .any(|e| matches!(e, ServerEvent::AcceptConnection)));

    let stored = store.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.chat_status, ChatStatus::Accepted);
}

#[tokio::test]
async fn bare_accept_without_request_is_dropped() {
    let (state, store) = test_state();
    let order = sample_order();
    store.insert_order(order.clone()).await;
    let room = order_room(order.id);

    let (customer_conn, mut customer_rx) = connect(&state).await;
    let (agent_conn, mut agent_rx) = connect(&state).await;

    handle_client_event(
        ClientEvent::AcceptConnection {
            room,
            sender_id: customer_conn.session_id,
        },
        Arc::clone(&agent_conn),
        state.clone(),
    )
    .await;

    assert!(drain(&mut customer_rx).is_empty());
    assert!(drain(&mut agent_rx).is_empty());
    let stored = store.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.chat_status, ChatStatus::None);
}

#[tokio::test]
async fn chat_messages_reach_other_room_members_with_timestamp() {
    let (state, store) = test_state();
    let order = sample_order();
    store.insert_order(order.clone()).await;
    let room = order_room(order.id);

    let (sender_conn, mut sender_rx) = connect(&state).await;
    let (peer_conn, mut peer_rx) = connect(&state).await;
    for conn in [&sender_conn, &peer_conn] {
        handle_client_event(
            ClientEvent::JoinOrderRoom { order_id: order.id },
            Arc::clone(conn),
            state.clone(),
        )
        .await;
    }

    handle_client_event(
        ClientEvent::SendMessage {
            room,
            message: "On my way".into(),
            sender_name: "Ravi".into(),
            sender_role: Role::Agent,
            timestamp: None,
        },
        Arc::clone(&sender_conn),
        state.clone(),
    )
    .await;

    let events = drain(&mut peer_rx);
    let Some(ServerEvent::ReceiveMessage {
        message, timestamp, ..
    }) = events
        .iter()
        .find(|e| matches!(e, ServerEvent::ReceiveMessage { .. }))
    else {
        panic!("Expected relayed message, got {events:?}");
    };
    assert_eq!(message.as_str(), "On my way");
    assert!(!timestamp.is_empty(), "server stamps missing timestamps");
    assert!(drain(&mut sender_rx).is_empty(), "no self-echo");
}

#[tokio::test]
async fn announce_reaches_pool_and_skips_unknown_orders() {
    let (state, store) = test_state();
    let agent = sample_agent("Ravi");
    store.insert_agent(agent.clone()).await;
    let (conn, mut rx) = connect_agent(&state, agent.id).await;

    // Unknown order: nothing is broadcast
    handle_client_event(
        ClientEvent::SendToDelivery {
            order: OrderRef { id: OrderId::new() },
        },
        Arc::clone(&conn),
        state.clone(),
    )
    .await;
    assert!(drain(&mut rx).is_empty());

    let order = sample_order();
    store.insert_order(order.clone()).await;
    handle_client_event(
        ClientEvent::SendToDelivery {
            order: OrderRef { id: order.id },
        },
        Arc::clone(&conn),
        state.clone(),
    )
    .await;
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::NewDeliveryOrder { order: o } if o.id == order.id
    )));
}

#[tokio::test]
async fn disconnect_reaper_leaves_assignment_untouched() {
    let (state, store) = test_state();
    let order = sample_order();
    store.insert_order(order.clone()).await;
    let agent = sample_agent("Ravi");
    store.insert_agent(agent.clone()).await;

    let (conn, mut rx) = connect_agent(&state, agent.id).await;
    handle_client_event(
        ClientEvent::AcceptOrder { order_id: order.id },
        Arc::clone(&conn),
        state.clone(),
    )
    .await;
    drain(&mut rx);

    state.ws.remove_connection(&conn.session_id).await;

    // No room memberships survive, but the claim does
    assert_eq!(state.ws.rooms.room_count().await, 0);
    assert_eq!(state.ws.connection_count().await, 0);
    let stored = store.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.assigned_agent, Some(agent.id));
    assert_eq!(stored.status, OrderStatus::OutForDelivery);
}
