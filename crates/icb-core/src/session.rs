//! One connection's lifetime: drives the dispatcher from the transport's event
//! stream and owns the scheduler.
//!
//! A session is single-shot. It ends on shutdown or on the first transport
//! failure; reconnecting is never attempted. Timers are stopped before `run`
//! returns, so the caller can persist the config right after.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    dispatcher::{ConnectionState, Dispatcher, Transition},
    messaging::{port::OutboundPort, types::InboundEvent},
    scheduler::Scheduler,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// Shutdown was requested locally.
    Shutdown,
    /// The connection failed or closed.
    TransportFailed { cause: String },
}

pub struct ChatSession {
    dispatcher: Dispatcher,
    scheduler: Scheduler,
}

impl ChatSession {
    pub fn new(cfg: Config, outbound: Arc<dyn OutboundPort>) -> Self {
        Self {
            dispatcher: Dispatcher::new(cfg, outbound.clone()),
            scheduler: Scheduler::new(outbound),
        }
    }

    pub fn config(&self) -> &Config {
        self.dispatcher.config()
    }

    pub fn state(&self) -> ConnectionState {
        self.dispatcher.state()
    }

    /// Consume the session and hand back the (possibly modified) config.
    pub fn into_config(self) -> Config {
        self.dispatcher.into_config()
    }

    pub async fn run(
        &mut self,
        mut events: mpsc::Receiver<InboundEvent>,
        shutdown: CancellationToken,
    ) -> SessionEnd {
        self.dispatcher.connecting();

        let end = loop {
            tokio::select! {
              biased;
              _ = shutdown.cancelled() => break SessionEnd::Shutdown,
              ev = events.recv() => {
                let Some(ev) = ev else {
                  break SessionEnd::TransportFailed {
                    cause: "transport event stream ended".to_string(),
                  };
                };
                tracing::trace!("Inbound event: {}", ev.kind());
                match self.dispatcher.handle_event(ev).await {
                  Transition::Stay => {}
                  Transition::Joined => {
                    self.scheduler.start(&self.dispatcher.config().timed_messages);
                  }
                  Transition::Failed { cause } => break SessionEnd::TransportFailed { cause },
                }
              }
            }
        };

        self.scheduler.stop().await;
        tracing::info!("Session ended: {end:?}");
        end
    }
}
