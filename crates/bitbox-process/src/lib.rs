//! Process supervision: spawning children with redirected output,
//! tracking their lifecycle, and multiplexing captured output to live
//! subscribers.
//!
//! The transport (RPC, CLI), authentication, and logging policy are
//! deliberately not part of this crate — it exposes only the in-process
//! API ([`Registry`]) that any front-end can adapt.

pub mod handle;
pub mod registry;
pub mod sink;

pub use bitbox_core::{OutputEvent, ProcessId, ProcessInfo, ProcessStatus, SupervisorError};
pub use handle::{ProcessHandle, SpawnOptions, Subscription, SupervisorOptions};
pub use registry::Registry;
