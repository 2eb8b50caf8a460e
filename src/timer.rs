//! Per-question countdown.
//!
//! A countdown is a spawned task scoped to one `(session, question)` pair. It
//! ticks once per interval, reports every new value to its sink, and reports
//! expiry exactly once when it reaches zero. Cancelling the token stops it
//! before the next tick is reported.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::session::SessionId;

/// Identifies one countdown run. `generation` tells apart two runs for the
/// same question, e.g. before and after a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub session_id: SessionId,
    pub question_index: usize,
    pub generation: u64,
}

impl TimerKey {
    pub fn new(session_id: SessionId, question_index: usize, generation: u64) -> Self {
        Self {
            session_id,
            question_index,
            generation,
        }
    }
}

/// Receives countdown progress.
#[async_trait]
pub trait CountdownSink: Send + Sync {
    /// Called after every tick with the new remaining value, including the final `0`.
    async fn tick(&self, key: TimerKey, remaining: u32);
    /// Called once when the countdown reaches zero.
    async fn expired(&self, key: TimerKey);
}

/// Owner-side view of a running countdown.
#[derive(Debug)]
pub struct CountdownHandle {
    key: TimerKey,
    token: CancellationToken,
    remaining: Arc<AtomicU32>,
    task: JoinHandle<()>,
}

impl CountdownHandle {
    pub fn key(&self) -> TimerKey {
        self.key
    }

    /// Live countdown value in whole seconds.
    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::SeqCst)
    }

    /// Stops further ticks. The task is never aborted mid-callback.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }
}

/// Spawns a countdown starting at `initial`. Zero expires on the first poll.
pub fn start_countdown(
    key: TimerKey,
    initial: u32,
    tick: Duration,
    sink: Arc<dyn CountdownSink>,
) -> CountdownHandle {
    let token = CancellationToken::new();
    let remaining = Arc::new(AtomicU32::new(initial));

    let task = tokio::spawn(run_countdown(
        key,
        tick,
        token.clone(),
        remaining.clone(),
        sink,
    ));
    tracing::debug!(
        session_id = %key.session_id,
        question_index = key.question_index,
        initial,
        "countdown started"
    );

    CountdownHandle {
        key,
        token,
        remaining,
        task,
    }
}

async fn run_countdown(
    key: TimerKey,
    tick: Duration,
    token: CancellationToken,
    remaining: Arc<AtomicU32>,
    sink: Arc<dyn CountdownSink>,
) {
    if remaining.load(Ordering::SeqCst) == 0 {
        if !token.is_cancelled() {
            sink.expired(key).await;
        }
        return;
    }

    let mut ticker = interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(
                    session_id = %key.session_id,
                    question_index = key.question_index,
                    "countdown cancelled"
                );
                return;
            }
            _ = ticker.tick() => {
                let left = remaining.load(Ordering::SeqCst).saturating_sub(1);
                remaining.store(left, Ordering::SeqCst);
                sink.tick(key, left).await;
                if left == 0 {
                    if !token.is_cancelled() {
                        tracing::info!(
                            session_id = %key.session_id,
                            question_index = key.question_index,
                            "countdown expired"
                        );
                        sink.expired(key).await;
                    }
                    return;
                }
            }
        }
    }
}
