//! Bounded pub-sub channel for marketplace events.
//!
//! Producers queue events on a bounded channel. A single [`EventHandler`] loop pulls them off and runs the handler for
//! each one on its own task, so a slow subscriber never holds up the API call that raised the event.
//!
//! The loop owns every task it spawns. Finished tasks are reaped as the loop runs, a handler that panics is reported
//! and counted without taking the loop down, and once the last producer is dropped the loop waits for the tasks still
//! in flight before it returns.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// What a handler loop did before it shut down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerReport {
    pub handled: u64,
    pub failed: u64,
}

impl HandlerReport {
    fn record(&mut self, outcome: Result<(), tokio::task::JoinError>) {
        match outcome {
            Ok(()) => self.handled += 1,
            Err(e) if e.is_panic() => {
                self.failed += 1;
                error!("📬️ An event handler panicked. The event it was handling is lost. {e}");
            },
            Err(e) => {
                self.failed += 1;
                warn!("📬️ An event handler task was cancelled. {e}");
            },
        }
    }
}

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size.max(1));
        Self { listener, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped and every spawned job has finished.
    pub async fn start_handler(self) -> HandlerReport {
        let Self { mut listener, sender, handler } = self;
        // Only producers may keep the channel open.
        drop(sender);
        debug!("📬️ Event handler started");
        let mut jobs = JoinSet::new();
        let mut report = HandlerReport::default();
        loop {
            tokio::select! {
                Some(outcome) = jobs.join_next(), if !jobs.is_empty() => report.record(outcome),
                event = listener.recv() => match event {
                    Some(event) => {
                        let handler = Arc::clone(&handler);
                        jobs.spawn(async move { handler(event).await });
                        trace!("📬️ Event queued. {} jobs in flight", jobs.len());
                    },
                    None => break,
                },
            }
        }
        if !jobs.is_empty() {
            debug!("📬️ All producers are gone. Waiting for {} jobs to finish", jobs.len());
        }
        while let Some(outcome) = jobs.join_next().await {
            report.record(outcome);
        }
        if report.failed > 0 {
            warn!("📬️ Event handler shut down. {} events handled, {} lost to failures", report.handled, report.failed);
        } else {
            debug!("📬️ Event handler shut down after handling {} events", report.handled);
        }
        report
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Queues the event for the handler, waiting for room if the buffer is full. A closed channel is logged and
    /// otherwise ignored, since notifications never undo the change that raised them.
    pub async fn publish_event(&self, event: E) {
        if self.sender.send(event).await.is_err() {
            error!("📬️ The event handler has shut down. An event was dropped.");
        }
    }
}
