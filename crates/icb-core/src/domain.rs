use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat server user id (numeric, stable).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chat participant as delivered with every message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub first_name: Option<String>,
    /// URL to the user's profile picture, or blank.
    #[serde(default)]
    pub profile_image: Option<String>,
    /// The user's color in the current chat session.
    #[serde(default)]
    pub color: String,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - \"{}\" ({})",
            self.id,
            self.username,
            self.first_name.as_deref().unwrap_or("")
        )
    }
}

/// A text message posted to the channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub created: String,
    pub user: User,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl ChatMessage {
    /// Server timestamp, when it parses as RFC 3339.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}
