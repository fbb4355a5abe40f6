//! Event-capable promise.
//!
//! A [`PromiEvent`] has two channels: a settlement future (await it directly) and
//! lifecycle events delivered to [`Subscription`]s. The first subscription receives
//! every event since the promise was created, up to the channel capacity, so work
//! spawned before the caller subscribes is never missed. Later subscriptions only
//! see events emitted after they subscribed.

use std::future::IntoFuture;
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{broadcast, oneshot};
use tracing::warn;

use crate::client::TxEvent;
use crate::{Error, Result};

/// Producer side of a [`PromiEvent`]
pub struct Deferred<T> {
    events: broadcast::Sender<TxEvent>,
    outcome: Option<oneshot::Sender<Result<T>>>,
}

impl<T> Deferred<T> {
    /// Emit a lifecycle event
    pub fn emit(&self, event: TxEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    /// Resolve the promise. Returns `false` if it was already settled.
    pub fn resolve(&mut self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Reject the promise. Returns `false` if it was already settled.
    pub fn reject(&mut self, err: Error) -> bool {
        self.settle(Err(err))
    }

    /// Whether the promise has been resolved or rejected
    pub fn is_settled(&self) -> bool {
        self.outcome.is_none()
    }

    /// A second deferred emitting on the same event channel but settling separately
    pub(crate) fn relay<U>(&self) -> (Deferred<U>, oneshot::Receiver<Result<U>>) {
        let (outcome, receiver) = oneshot::channel();
        let deferred = Deferred {
            events: self.events.clone(),
            outcome: Some(outcome),
        };
        (deferred, receiver)
    }

    fn settle(&mut self, result: Result<T>) -> bool {
        match self.outcome.take() {
            Some(outcome) => {
                // The consumer may have dropped the promise
                let _ = outcome.send(result);
                true
            }
            None => false,
        }
    }
}

/// Consumer side: settlement future plus lifecycle event subscriptions
pub struct PromiEvent<T> {
    // Receiver created with the channel; buffers from creation until first taken
    first: Mutex<Option<broadcast::Receiver<TxEvent>>>,
    events: broadcast::Receiver<TxEvent>,
    outcome: oneshot::Receiver<Result<T>>,
}

impl<T> PromiEvent<T> {
    /// Create a connected deferred/promise pair
    pub fn channel(capacity: usize) -> (Deferred<T>, PromiEvent<T>) {
        let (events, receiver) = broadcast::channel(capacity.max(1));
        let (outcome, outcome_rx) = oneshot::channel();

        let deferred = Deferred {
            events,
            outcome: Some(outcome),
        };
        let promise = PromiEvent {
            events: receiver.resubscribe(),
            first: Mutex::new(Some(receiver)),
            outcome: outcome_rx,
        };
        (deferred, promise)
    }

    /// Subscribe to lifecycle events.
    ///
    /// The first call replays the events buffered since creation; later calls only
    /// see events emitted from now on.
    pub fn subscribe(&self) -> Subscription {
        let first = match self.first.lock() {
            Ok(mut first) => first.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        Subscription {
            receiver: first.unwrap_or_else(|| self.events.resubscribe()),
        }
    }

    /// Wait for settlement
    pub async fn settle(self) -> Result<T> {
        match self.outcome.await {
            Ok(result) => result,
            Err(_) => Err(Error::generic("promise dropped before settlement")),
        }
    }
}

impl<T: Send + 'static> IntoFuture for PromiEvent<T> {
    type Output = Result<T>;
    type IntoFuture = BoxFuture<'static, Result<T>>;

    fn into_future(self) -> Self::IntoFuture {
        self.settle().boxed()
    }
}

/// Live subscription to lifecycle events; drop it to unsubscribe
pub struct Subscription {
    receiver: broadcast::Receiver<TxEvent>,
}

impl Subscription {
    /// Next event, or `None` once the producer is gone and the backlog is drained
    pub async fn next(&mut self) -> Option<TxEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagged behind, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-buffered event without waiting
    pub fn try_next(&mut self) -> Option<TxEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagged behind, events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Drain every remaining event until the producer is gone
    pub async fn collect(mut self) -> Vec<TxEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }

    /// Stop receiving events
    pub fn unsubscribe(self) {}
}
