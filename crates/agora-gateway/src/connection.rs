use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use agora_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a WebSocket connection whose JWT was validated at the HTTP upgrade.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, username: String) {
    let (mut sender, mut receiver) = socket.split();
    let socket_id = Uuid::new_v4();

    info!("{} connected to gateway (socket {})", username, socket_id);

    let ready = GatewayEvent::Ready {
        username: username.clone(),
        socket_id,
    };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    // Subscribe before announcing presence so we see our own peers' replies
    let mut broadcast_rx = dispatcher.subscribe();
    dispatcher.user_online(&username).await;

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let send_username = username.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let envelope = match result {
                        Ok(envelope) => envelope,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} messages", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    if !envelope.is_for(socket_id, &send_username) {
                        continue;
                    }

                    if send_event(&mut sender, &envelope.event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let recv_dispatcher = dispatcher.clone();
    let recv_username = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => handle_command(&recv_dispatcher, socket_id, &recv_username, cmd),
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            recv_username,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.user_offline(&username).await;
    info!("{} disconnected from gateway (socket {})", username, socket_id);
}

fn handle_command(dispatcher: &Dispatcher, socket_id: Uuid, username: &str, cmd: GatewayCommand) {
    match cmd {
        GatewayCommand::StartTyping { to } => {
            dispatcher.broadcast_to_others(
                Some(socket_id),
                GatewayEvent::TypingStart {
                    from: username.to_string(),
                    to,
                },
            );
        }
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode gateway event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}
