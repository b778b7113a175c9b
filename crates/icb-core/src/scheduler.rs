//! Periodic outbound traffic: the transport keep-alive and timed messages.
//!
//! Every schedule runs as its own tokio task on a fixed-rate interval. Timed
//! message N first fires `N * 60s` after start so that a long list does not
//! burst into the channel all at once.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::{config::TimedMessage, messaging::port::OutboundPort};

pub const KEEP_ALIVE_DELAY: Duration = Duration::from_millis(1_000);
pub const KEEP_ALIVE_PERIOD: Duration = Duration::from_millis(4_000);
pub const TIMED_MESSAGE_STAGGER: Duration = Duration::from_millis(60_000);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Job {
    KeepAlive,
    TimedMessage { index: usize, message: String },
}

/// When a job first fires (relative to scheduler start) and how often it repeats.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Firing {
    pub job: Job,
    pub first_delay: Duration,
    pub period: Duration,
}

/// Compute the schedule for a session: keep-alive first, then one entry per
/// timed message in config order. Messages with a zero interval are skipped.
pub fn plan(timed_messages: &[TimedMessage]) -> Vec<Firing> {
    let mut firings = vec![Firing {
        job: Job::KeepAlive,
        first_delay: KEEP_ALIVE_DELAY,
        period: KEEP_ALIVE_PERIOD,
    }];

    for (index, timed) in timed_messages.iter().enumerate() {
        if timed.interval == 0 {
            tracing::warn!("Skipping timed message with zero interval: {timed}");
            continue;
        }
        firings.push(Firing {
            job: Job::TimedMessage {
                index,
                message: timed.message.clone(),
            },
            first_delay: stagger(index),
            period: Duration::from_millis(timed.interval),
        });
    }

    firings
}

/// First-fire delay of the timed message at `index`, saturating on overflow.
fn stagger(index: usize) -> Duration {
    let step = u64::try_from(TIMED_MESSAGE_STAGGER.as_millis()).unwrap_or(u64::MAX);
    let index = u64::try_from(index).unwrap_or(u64::MAX);
    Duration::from_millis(step.saturating_mul(index))
}

pub struct Scheduler {
    outbound: Arc<dyn OutboundPort>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(outbound: Arc<dyn OutboundPort>) -> Self {
        Self {
            outbound,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Spawn one task per planned job. Returns the number of jobs started;
    /// calling it again while running starts nothing.
    pub fn start(&mut self, timed_messages: &[TimedMessage]) -> usize {
        if self.is_running() {
            return 0;
        }
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }

        let start = Instant::now();
        for firing in plan(timed_messages) {
            let outbound = self.outbound.clone();
            let cancel = self.cancel.clone();
            self.tasks.push(tokio::spawn(async move {
                run_job(start, firing, outbound, cancel).await;
            }));
        }

        tracing::info!(
            "Scheduler started: keep-alive + {} timed messages",
            self.tasks.len().saturating_sub(1)
        );
        self.tasks.len()
    }

    /// Cancel every job and wait for the tasks to exit.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!("Scheduled task ended abnormally: {e}");
            }
        }
    }
}

async fn run_job(
    start: Instant,
    firing: Firing,
    outbound: Arc<dyn OutboundPort>,
    cancel: CancellationToken,
) {
    let Some(first) = start.checked_add(firing.first_delay) else {
        tracing::warn!("Not scheduling {:?}: first firing is out of range", firing.job);
        return;
    };
    let mut tick = interval_at(first, firing.period);
    loop {
        tokio::select! {
          _ = cancel.cancelled() => break,
          _ = tick.tick() => {
            let res = match &firing.job {
              Job::KeepAlive => outbound.keep_alive().await,
              Job::TimedMessage { index, message } => {
                tracing::debug!("Sending timed message #{index}: {message}");
                outbound.send_text(message).await
              }
            };
            if let Err(e) = res {
              tracing::warn!("Scheduled send failed ({:?}): {e}", firing.job);
            }
          }
        }
    }
}
