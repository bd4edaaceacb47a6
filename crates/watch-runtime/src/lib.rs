//! Session runtime: command routing, task coordination, per-session
//! monitoring loops and outbound notifications.
//!
//! Data flows in one direction:
//!
//! ```text
//! inbound messages → CommandRouter → ControlEvent → Coordinator → MonitorTask
//!                          ↑                            │
//!                          └──────── SessionLapsed ─────┘
//! ```

pub mod coordinator;
pub mod events;
pub mod monitor_loop;
pub mod notifier;
pub mod router;
pub mod session;

#[cfg(test)]
mod testing;

pub use coordinator::Coordinator;
pub use events::{ControlEvent, SessionLapsed};
pub use monitor_loop::{LoopExit, MonitorContext, MonitorTask};
pub use notifier::Notifier;
pub use router::{parse_request, CommandRouter, Request, RequestKind, MAX_INTERVAL_MINUTES};
pub use session::{SessionConfig, Snapshot};
