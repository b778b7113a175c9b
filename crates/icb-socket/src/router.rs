use std::sync::Arc;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};

use icb_core::messaging::types::InboundEvent;

use crate::{codec, SocketOutbound};

const EVENT_BUFFER: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Dial `url` in the background.
///
/// Returns immediately with the write handle and the inbound event stream.
/// The stream yields `ConnectionOpened` once the handshake completes and ends
/// with exactly one `ConnectionFailed` when the socket breaks. Frames queued
/// before the socket opens are sent right after it does.
pub fn connect(url: &str) -> (Arc<SocketOutbound>, mpsc::Receiver<InboundEvent>) {
    install_crypto_provider();

    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

    let url = url.to_string();
    let failed_tx = event_tx.clone();
    tokio::spawn(async move {
        let socket = tokio::spawn(run_socket(url, frame_rx, event_tx));
        if let Err(e) = socket.await {
            tracing::error!("Websocket task aborted: {e}");
            let _ = failed_tx
                .send(InboundEvent::ConnectionFailed {
                    cause: format!("websocket task aborted: {e}"),
                })
                .await;
        }
    });

    (Arc::new(SocketOutbound::new(frame_tx)), event_rx)
}

/// Select ring as the process-wide rustls provider for `wss://` dials.
///
/// Safe to call repeatedly; only the first call installs anything.
pub fn install_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_some() {
        return;
    }
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        tracing::debug!("rustls crypto provider already installed: {e:?}");
    }
}

async fn open(url: &str) -> anyhow::Result<WsStream> {
    let (stream, _response) = connect_async(url)
        .await
        .with_context(|| format!("websocket connect to {url} failed"))?;
    Ok(stream)
}

async fn run_socket(
    url: String,
    mut frames: mpsc::UnboundedReceiver<String>,
    events: mpsc::Sender<InboundEvent>,
) {
    let stream = match open(&url).await {
        Ok(s) => s,
        Err(e) => {
            let _ = events
                .send(InboundEvent::ConnectionFailed {
                    cause: format!("{e:#}"),
                })
                .await;
            return;
        }
    };
    tracing::info!("Websocket connected to {url}");

    let (mut sink, mut inbound) = stream.split();
    if events.send(InboundEvent::ConnectionOpened).await.is_err() {
        return;
    }

    let cause = loop {
        tokio::select! {
          frame = frames.recv() => {
            let Some(frame) = frame else {
              // Every write handle is gone: the bot is shutting down.
              let _ = sink.close().await;
              tracing::info!("Websocket closed");
              return;
            };
            if let Err(e) = sink.send(WsMessage::text(frame)).await {
              break format!("send failed: {e}");
            }
          }
          msg = inbound.next() => {
            match msg {
              Some(Ok(WsMessage::Text(txt))) => {
                if let Some(ev) = route_frame(txt.as_str()) {
                  if events.send(ev).await.is_err() {
                    return;
                  }
                }
              }
              Some(Ok(WsMessage::Close(frame))) => {
                break format!("closed by server: {frame:?}");
              }
              Some(Ok(_other)) => {
                // ping/pong and binary frames
              }
              Some(Err(e)) => break e.to_string(),
              None => break "stream ended".to_string(),
            }
          }
        }
    };

    let _ = events
        .send(InboundEvent::ConnectionFailed { cause })
        .await;
}

/// Decode a text frame; undecodable chat payloads are logged and dropped.
fn route_frame(txt: &str) -> Option<InboundEvent> {
    tracing::trace!("Websocket received \"{txt}\"");
    match codec::decode(txt) {
        Ok(ev) => Some(ev),
        Err(e) => {
            tracing::warn!("Dropping undecodable chat frame: {e}");
            None
        }
    }
}
