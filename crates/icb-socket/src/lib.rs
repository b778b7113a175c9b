//! Websocket adapter (tokio-tungstenite).
//!
//! This crate implements the `icb-core` OutboundPort over the chat server's
//! websocket and turns inbound frames into `InboundEvent`s.

use async_trait::async_trait;
use tokio::sync::mpsc;

pub mod codec;
pub mod router;

use icb_core::{errors::Error, messaging::port::OutboundPort, Result};

/// Cloneable write handle. Every frame goes through one channel into the
/// single socket writer task, so concurrent callers never interleave.
#[derive(Clone)]
pub struct SocketOutbound {
    frames: mpsc::UnboundedSender<String>,
}

impl SocketOutbound {
    pub fn new(frames: mpsc::UnboundedSender<String>) -> Self {
        Self { frames }
    }

    fn push(&self, frame: String) -> Result<()> {
        tracing::debug!("Websocket sent \"{}\"", codec::loggable(&frame));
        self.frames
            .send(frame)
            .map_err(|_| Error::Transport("socket writer has stopped".to_string()))
    }
}

#[async_trait]
impl OutboundPort for SocketOutbound {
    async fn join_channel(&self, mountpoint: &str, auth_token: &str) -> Result<()> {
        self.push(codec::encode_join(mountpoint, auth_token))
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.push(codec::encode_text(text))
    }

    async fn keep_alive(&self) -> Result<()> {
        self.push(codec::KEEP_ALIVE_FRAME.to_string())
    }
}
