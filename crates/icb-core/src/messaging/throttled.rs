use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{messaging::port::OutboundPort, Result};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between chat messages (timed messages and replies alike).
    pub text_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            text_min_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// OutboundPort decorator that spaces out chat messages.
///
/// Join and keep-alive frames pass straight through; only `send_text` waits
/// for a slot, so a burst of timed messages and replies cannot flood the room.
pub struct ThrottledOutbound {
    inner: Arc<dyn OutboundPort>,
    text: Mutex<IntervalLimiter>,
}

impl ThrottledOutbound {
    pub fn new(inner: Arc<dyn OutboundPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            text: Mutex::new(IntervalLimiter::new(cfg.text_min_interval)),
        }
    }

    async fn throttle_text(&self) {
        let wait = { self.text.lock().await.reserve() };
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl OutboundPort for ThrottledOutbound {
    async fn join_channel(&self, mountpoint: &str, auth_token: &str) -> Result<()> {
        self.inner.join_channel(mountpoint, auth_token).await
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.throttle_text().await;
        self.inner.send_text(text).await
    }

    async fn keep_alive(&self) -> Result<()> {
        self.inner.keep_alive().await
    }
}
