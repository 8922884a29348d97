//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Logging → Metrics → Vault → Chain → Gateway → Key check → Tasks
//!
//! Shutdown (shutdown.rs):
//!     Signal → Broadcast stop → Listener exits → Dispatcher drains queue
//!            → Cancel monitors → Flush vault → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then storage and chain, then tasks
//! - Fail fast: any startup error is fatal
//! - Subscribers are created before their task is spawned

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{build_bridge, Bridge, StartupError};
