// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Bounded fan-out / counted fan-in
//!
//! Each item becomes one task; a semaphore caps how many run their work at
//! once. Every task publishes at most one message. The receiving side knows
//! how many tasks were spawned and stops after that many messages, when all
//! senders are gone, or when the run is cancelled.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Result of waiting for the next message
#[derive(Debug)]
pub(crate) enum Next<T> {
    Item(T),
    /// All expected messages arrived, or every producer is gone
    Done,
    Cancelled,
}

/// Receiving half of a fan-out
pub(crate) struct FanOut<T> {
    rx: mpsc::Receiver<T>,
    expected: usize,
    received: usize,
    lost: usize,
    cancel: CancellationToken,
    // Dropping the set aborts tasks still running
    _tasks: JoinSet<()>,
}

impl<T: Send + 'static> FanOut<T> {
    /// Spawn one task per item, at most `limit` running `work` at a time
    pub(crate) fn spawn<I, F, Fut>(
        items: Vec<I>,
        limit: usize,
        cancel: &CancellationToken,
        work: F,
    ) -> Self
    where
        I: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let expected = items.len();
        let semaphore = Arc::new(Semaphore::new(limit.clamp(1, Semaphore::MAX_PERMITS)));
        let (tx, rx) = mpsc::channel(expected.max(1));
        let work = Arc::new(work);
        let mut tasks = JoinSet::new();

        for item in items {
            let tx = tx.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let work = Arc::clone(&work);

            tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };

                let message = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    message = (*work)(item) => message,
                };
                drop(permit);

                tokio::select! {
                    _ = tx.send(message) => {}
                    _ = cancel.cancelled() => {}
                }
            });
        }
        drop(tx);

        Self {
            rx,
            expected,
            received: 0,
            lost: 0,
            cancel: cancel.clone(),
            _tasks: tasks,
        }
    }
}

impl<T> FanOut<T> {
    /// Wait for the next message
    pub(crate) async fn next(&mut self) -> Next<T> {
        if self.received + self.lost >= self.expected {
            return Next::Done;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Next::Cancelled,
            message = self.rx.recv() => match message {
                Some(message) => {
                    self.received += 1;
                    Next::Item(message)
                }
                None => {
                    // Every sender dropped without publishing the rest
                    self.lost = self.expected - self.received;
                    tracing::warn!("{} worker(s) exited without a result", self.lost);
                    Next::Done
                }
            },
        }
    }

    /// Number of tasks spawned
    pub(crate) fn expected(&self) -> usize {
        self.expected
    }

    /// Tasks that ended without publishing
    pub(crate) fn lost(&self) -> usize {
        self.lost
    }
}
