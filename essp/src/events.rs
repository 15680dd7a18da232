//! Poll event subscriptions

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{trace, warn};

use essp_types::{EventKind, PollEvent};

use crate::decoder::CommandResult;

/// Events of one kind, in arrival order
pub struct EventStream {
    kind: EventKind,
    receiver: broadcast::Receiver<PollEvent>,
}

impl EventStream {
    pub(crate) fn new(kind: EventKind, receiver: broadcast::Receiver<PollEvent>) -> Self {
        Self { kind, receiver }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Wait for the next matching event
    ///
    /// Returns `None` once the device is dropped.
    pub async fn recv(&mut self) -> Option<PollEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.kind == Some(self.kind) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(kind = self.kind.name(), skipped, "Event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Broadcast every event of a POLL result
pub(crate) fn publish(sender: &broadcast::Sender<PollEvent>, result: &CommandResult) {
    for event in result.events() {
        trace!("Publishing {}", event);
        // No subscribers is not an error
        let _ = sender.send(event.clone());
    }
}
