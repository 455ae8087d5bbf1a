use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::Role;

/// Server-to-client push messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Authenticated { user_id: Uuid, role: Role },
    Subscribed { topics: Vec<String> },
    Notification { event_type: String, data: serde_json::Value },
    Error { message: String },
}

/// Client-to-server messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Authenticate { token: String },
    Subscribe { topics: Vec<String> },
}
