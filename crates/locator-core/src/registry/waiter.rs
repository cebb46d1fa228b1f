//! Readiness waiters.
//!
//! One broadcast sender per pending contract is the shared completion
//! source. Every waiting call subscribes its own receiver, so a caller that
//! gives up only drops its receiver and never touches the shared sender.

use tokio::sync::broadcast;

use crate::domain::contract::ServiceInstance;

/// Message delivered to every subscriber of a waiter.
#[derive(Debug, Clone)]
pub(crate) enum Readiness {
    Ready(ServiceInstance),
    Withdrawn,
}

/// Shared completion source for one contract.
#[derive(Debug)]
pub(crate) struct Waiter {
    sender: broadcast::Sender<Readiness>,
}

impl Waiter {
    pub(crate) fn new() -> Self {
        // Exactly one message is ever sent.
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Readiness> {
        self.sender.subscribe()
    }

    pub(crate) fn listeners(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Resolve every subscriber with the instance. Consumes the waiter.
    pub(crate) fn complete(self, instance: ServiceInstance) -> usize {
        self.sender.send(Readiness::Ready(instance)).unwrap_or(0)
    }

    /// Tell every subscriber the provider went away. Consumes the waiter.
    pub(crate) fn withdraw(self) -> usize {
        self.sender.send(Readiness::Withdrawn).unwrap_or(0)
    }
}
