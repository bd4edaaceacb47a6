//! Messages exchanged between the command router and the coordinator.

use std::time::Duration;

use watch_core::RecipientId;

/// A validated request to start, retime, or stop a session.
///
/// Produced by the router, consumed exactly once by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    Start {
        recipient_id: RecipientId,
        account: String,
        interval: Duration,
        /// Router-assigned, strictly increasing per accepted start.
        generation: u64,
    },
    UpdateInterval {
        recipient_id: RecipientId,
        interval: Duration,
    },
    Stop {
        recipient_id: RecipientId,
    },
}

impl ControlEvent {
    pub fn recipient_id(&self) -> RecipientId {
        match self {
            ControlEvent::Start { recipient_id, .. }
            | ControlEvent::UpdateInterval { recipient_id, .. }
            | ControlEvent::Stop { recipient_id } => *recipient_id,
        }
    }
}

/// Coordinator → router notice that a session's task ended on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLapsed {
    pub recipient_id: RecipientId,
    pub generation: u64,
}
