use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::topics;
use super::types::ServerMessage;
use crate::user::Role;

pub type ConnectionSender = mpsc::UnboundedSender<ServerMessage>;

/// One authenticated websocket connection. Lives only in hub memory and is
/// dropped wholesale on disconnect; the registry is rebuilt empty on
/// restart.
struct Connection {
    user_id: Uuid,
    role: Role,
    topics: HashSet<String>,
    sender: ConnectionSender,
    authenticated_at: DateTime<Utc>,
}

enum HubCommand {
    Register {
        connection_id: Uuid,
        user_id: Uuid,
        role: Role,
        sender: ConnectionSender,
    },
    Subscribe {
        connection_id: Uuid,
        topics: Vec<String>,
    },
    Unregister {
        connection_id: Uuid,
    },
    Publish {
        topic: String,
        message: ServerMessage,
    },
}

/// Handle to the connection-registry actor. The actor task is the only
/// owner of connection state; everything else sends it commands, so
/// concurrent connects, disconnects and broadcasts cannot lose updates.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Spawn the registry actor and return a cloneable handle to it.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_hub(rx));
        Self { tx }
    }

    /// Bind an authenticated identity to a connection. The hub subscribes
    /// the connection to its role's default topics and confirms with an
    /// `authenticated` message.
    pub fn register(&self, connection_id: Uuid, user_id: Uuid, role: Role, sender: ConnectionSender) {
        let _ = self.tx.send(HubCommand::Register {
            connection_id,
            user_id,
            role,
            sender,
        });
    }

    pub fn subscribe(&self, connection_id: Uuid, topics: Vec<String>) {
        let _ = self.tx.send(HubCommand::Subscribe {
            connection_id,
            topics,
        });
    }

    pub fn unregister(&self, connection_id: Uuid) {
        let _ = self.tx.send(HubCommand::Unregister { connection_id });
    }

    /// Deliver to every connection subscribed to the topic at publish time.
    /// No replay for later subscribers; durable notification rows are the
    /// history.
    pub fn publish(&self, topic: impl Into<String>, message: ServerMessage) {
        let _ = self.tx.send(HubCommand::Publish {
            topic: topic.into(),
            message,
        });
    }

    pub fn publish_to_user(&self, user_id: Uuid, message: ServerMessage) {
        self.publish(topics::user_topic(user_id), message);
    }
}

async fn run_hub(mut rx: mpsc::UnboundedReceiver<HubCommand>) {
    let mut connections: HashMap<Uuid, Connection> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            HubCommand::Register {
                connection_id,
                user_id,
                role,
                sender,
            } => {
                let default_topics: HashSet<String> =
                    topics::default_topics(role, user_id).into_iter().collect();

                let _ = sender.send(ServerMessage::Authenticated { user_id, role });

                connections.insert(
                    connection_id,
                    Connection {
                        user_id,
                        role,
                        topics: default_topics,
                        sender,
                        authenticated_at: Utc::now(),
                    },
                );
                tracing::info!("User {} connected ({} online)", user_id, connections.len());
            }
            HubCommand::Subscribe {
                connection_id,
                topics: requested,
            } => {
                let Some(connection) = connections.get_mut(&connection_id) else {
                    continue;
                };

                // Reject the whole request on the first unauthorized topic;
                // the connection and its existing subscriptions stay intact.
                if let Some(denied) = requested
                    .iter()
                    .find(|t| !topics::is_authorized(connection.role, connection.user_id, t))
                {
                    let _ = connection.sender.send(ServerMessage::Error {
                        message: format!("Not authorized to subscribe to {denied}"),
                    });
                    continue;
                }

                connection.topics.extend(requested.iter().cloned());
                let _ = connection.sender.send(ServerMessage::Subscribed {
                    topics: requested,
                });
            }
            HubCommand::Unregister { connection_id } => {
                if let Some(connection) = connections.remove(&connection_id) {
                    let connected_for = Utc::now() - connection.authenticated_at;
                    tracing::info!(
                        "User {} disconnected after {}s ({} online)",
                        connection.user_id,
                        connected_for.num_seconds(),
                        connections.len()
                    );
                }
            }
            HubCommand::Publish { topic, message } => {
                // Each connection has its own unbounded send path; a slow
                // consumer cannot stall the rest.
                for connection in connections.values() {
                    if connection.topics.contains(&topic) {
                        let _ = connection.sender.send(message.clone());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    async fn recv(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Option<ServerMessage> {
        tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .ok()
            .flatten()
    }

    fn notification(event_type: &str) -> ServerMessage {
        ServerMessage::Notification {
            event_type: event_type.to_string(),
            data: json!({}),
        }
    }

    async fn connect(
        hub: &HubHandle,
        role: Role,
    ) -> (Uuid, Uuid, mpsc::UnboundedReceiver<ServerMessage>) {
        let connection_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.register(connection_id, user_id, role, tx);

        let first = recv(&mut rx).await.expect("authenticated reply");
        assert!(matches!(first, ServerMessage::Authenticated { .. }));
        (connection_id, user_id, rx)
    }

    #[tokio::test]
    async fn broadcast_reaches_exactly_the_subscribed_connections() {
        let hub = HubHandle::spawn();
        let (_, _, mut professor_rx) = connect(&hub, Role::Professor).await;
        let (_, _, mut student_rx) = connect(&hub, Role::Student).await;

        hub.publish(topics::TOPIC_ALERTS, notification("alert_raised"));

        let received = recv(&mut professor_rx).await.expect("professor delivery");
        assert!(matches!(received, ServerMessage::Notification { ref event_type, .. } if event_type == "alert_raised"));

        // The student was never subscribed to the alerts topic.
        assert!(recv(&mut student_rx).await.is_none());
    }

    #[tokio::test]
    async fn late_subscribers_get_no_replay() {
        let hub = HubHandle::spawn();
        let (_, _, mut early_rx) = connect(&hub, Role::Professor).await;

        hub.publish(topics::TOPIC_ALERTS, notification("alert_raised"));
        assert!(recv(&mut early_rx).await.is_some());

        let (_, _, mut late_rx) = connect(&hub, Role::Professor).await;
        assert!(recv(&mut late_rx).await.is_none());
    }

    #[tokio::test]
    async fn point_to_point_delivery_targets_one_user() {
        let hub = HubHandle::spawn();
        let (_, user_a, mut rx_a) = connect(&hub, Role::Student).await;
        let (_, _user_b, mut rx_b) = connect(&hub, Role::Student).await;

        hub.publish_to_user(user_a, notification("schedule_approved"));

        assert!(recv(&mut rx_a).await.is_some());
        assert!(recv(&mut rx_b).await.is_none());
    }

    #[tokio::test]
    async fn unauthorized_subscribe_is_rejected_but_connection_survives() {
        let hub = HubHandle::spawn();
        let (connection_id, user_id, mut rx) = connect(&hub, Role::Student).await;

        hub.subscribe(connection_id, vec![topics::TOPIC_LAB_STATS.to_string()]);

        let reply = recv(&mut rx).await.expect("error reply");
        assert!(matches!(reply, ServerMessage::Error { .. }));

        // Still registered and still receiving on the default topic.
        hub.publish_to_user(user_id, notification("direct_message"));
        assert!(matches!(
            recv(&mut rx).await,
            Some(ServerMessage::Notification { .. })
        ));
    }

    #[tokio::test]
    async fn authorized_subscribe_extends_delivery() {
        let hub = HubHandle::spawn();
        let (connection_id, _, mut rx) = connect(&hub, Role::Admin).await;
        let other_user = Uuid::new_v4();

        hub.subscribe(connection_id, vec![topics::user_topic(other_user)]);
        let reply = recv(&mut rx).await.expect("subscribed reply");
        assert!(matches!(reply, ServerMessage::Subscribed { .. }));

        hub.publish_to_user(other_user, notification("task_assigned"));
        assert!(matches!(
            recv(&mut rx).await,
            Some(ServerMessage::Notification { .. })
        ));
    }

    #[tokio::test]
    async fn unregister_drops_all_subscriptions_atomically() {
        let hub = HubHandle::spawn();
        let (connection_id, user_id, mut rx) = connect(&hub, Role::Professor).await;

        hub.unregister(connection_id);

        hub.publish(topics::TOPIC_ALERTS, notification("alert_raised"));
        hub.publish_to_user(user_id, notification("direct_message"));
        assert!(recv(&mut rx).await.is_none());
    }
}
