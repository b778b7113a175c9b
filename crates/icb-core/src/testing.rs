//! In-memory fakes shared by the unit tests.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;

use crate::{
    domain::{ChatMessage, User, UserId},
    messaging::port::OutboundPort,
    Error, Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Sent {
    Join { mountpoint: String, auth_token: String },
    Text(String),
    KeepAlive,
}

#[derive(Default)]
pub(crate) struct RecordingOutbound {
    sent: Mutex<Vec<Sent>>,
    fail: AtomicBool,
}

impl RecordingOutbound {
    pub(crate) fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(true),
        }
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn joins(&self) -> Vec<(String, String)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Join {
                    mountpoint,
                    auth_token,
                } => Some((mountpoint, auth_token)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn keep_alives(&self) -> usize {
        self.sent()
            .iter()
            .filter(|s| matches!(s, Sent::KeepAlive))
            .count()
    }

    fn record(&self, s: Sent) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Transport("socket closed".to_string()));
        }
        self.sent.lock().unwrap().push(s);
        Ok(())
    }
}

#[async_trait]
impl OutboundPort for RecordingOutbound {
    async fn join_channel(&self, mountpoint: &str, auth_token: &str) -> Result<()> {
        self.record(Sent::Join {
            mountpoint: mountpoint.to_string(),
            auth_token: auth_token.to_string(),
        })
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.record(Sent::Text(text.to_string()))
    }

    async fn keep_alive(&self) -> Result<()> {
        self.record(Sent::KeepAlive)
    }
}

pub(crate) fn user(id: i64, username: &str) -> User {
    User {
        id: UserId(id),
        username: username.to_string(),
        first_name: None,
        profile_image: None,
        color: "#123456".to_string(),
    }
}

pub(crate) fn chat(from: &User, text: &str) -> ChatMessage {
    ChatMessage {
        id: 1,
        text: text.to_string(),
        created: "2020-03-01T18:04:05Z".to_string(),
        user: from.clone(),
        kind: "message".to_string(),
    }
}
