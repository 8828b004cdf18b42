use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::debug;
use uuid::Uuid;

use agora_types::events::GatewayEvent;

/// A gateway event plus the connection that caused it, if any.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub origin: Option<Uuid>,
    pub event: GatewayEvent,
}

impl Envelope {
    /// Whether the connection `socket_id` of `username` should see this event.
    pub fn is_for(&self, socket_id: Uuid, username: &str) -> bool {
        self.origin != Some(socket_id) && self.event.is_visible_to(username)
    }
}

/// Manages connected clients and fans out events.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every connection subscribes; filtering happens per connection
    broadcast_tx: broadcast::Sender<Envelope>,

    /// Online users: username -> number of open connections
    online_users: RwLock<HashMap<String, usize>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                online_users: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to every connected client.
    pub fn broadcast(&self, event: GatewayEvent) {
        self.broadcast_to_others(None, event);
    }

    /// Broadcast an event to every connected client except `origin`.
    /// Fire-and-forget: having no listeners is not an error.
    pub fn broadcast_to_others(&self, origin: Option<Uuid>, event: GatewayEvent) {
        if self.inner.broadcast_tx.send(Envelope { origin, event }).is_err() {
            debug!("No gateway listeners, event dropped");
        }
    }

    /// Register a connection for `username`. Announces presence on the first one.
    pub async fn user_online(&self, username: &str) {
        let first = {
            let mut online = self.inner.online_users.write().await;
            let count = online.entry(username.to_string()).or_insert(0);
            *count += 1;
            *count == 1
        };

        if first {
            self.broadcast(GatewayEvent::PresenceUpdate {
                username: username.to_string(),
                online: true,
            });
        }
    }

    /// Drop a connection for `username`. Announces absence when the last one closes.
    pub async fn user_offline(&self, username: &str) {
        let last = {
            let mut online = self.inner.online_users.write().await;
            match online.get_mut(username) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                Some(_) => {
                    online.remove(username);
                    true
                }
                None => false,
            }
        };

        if last {
            self.broadcast(GatewayEvent::PresenceUpdate {
                username: username.to_string(),
                online: false,
            });
        }
    }

    /// Get list of online users.
    pub async fn online_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.inner.online_users.read().await.keys().cloned().collect();
        users.sort();
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_to_others_tags_origin() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();
        let origin = Uuid::new_v4();

        dispatcher.broadcast_to_others(
            Some(origin),
            GatewayEvent::TypingStart {
                from: "alice".into(),
                to: "bob".into(),
            },
        );

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.origin, Some(origin));
        assert!(!envelope.is_for(origin, "alice"));
        assert!(envelope.is_for(Uuid::new_v4(), "bob"));
        assert!(!envelope.is_for(Uuid::new_v4(), "carol"));
    }

    #[tokio::test]
    async fn presence_announced_on_first_and_last_connection() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        dispatcher.user_online("alice").await;
        dispatcher.user_online("alice").await;
        assert_eq!(dispatcher.online_users().await, vec!["alice".to_string()]);

        dispatcher.user_offline("alice").await;
        assert_eq!(dispatcher.online_users().await.len(), 1);
        dispatcher.user_offline("alice").await;
        assert!(dispatcher.online_users().await.is_empty());

        let first = rx.recv().await.unwrap();
        assert!(matches!(first.event, GatewayEvent::PresenceUpdate { online: true, .. }));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second.event, GatewayEvent::PresenceUpdate { online: false, .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn broadcasting_without_listeners_is_harmless() {
        let dispatcher = Dispatcher::new();
        dispatcher.broadcast(GatewayEvent::PresenceUpdate {
            username: "nobody".into(),
            online: true,
        });
    }
}
