//! Hostlink Runtime
//!
//! This crate wires the hostlink core into something a scripting host can run:
//! - `HostRuntime`: the explicitly constructed context (bridge, router, state)
//! - `RuntimeBuilder`: registers feature classes and freezes the router
//! - `Transport`: the async seam frames travel through, with an in-memory
//!   channel implementation for tests and tools
//! - Protocol counters published as a diagnostics emitter
//!
//! `hostlink-core` provides the protocol itself; this crate only orchestrates it.

pub mod builder;
pub mod logging;
mod runtime;
pub mod state;
pub mod stats;
pub mod transport;

pub use builder::RuntimeBuilder;
pub use logging::init_logging;
pub use runtime::HostRuntime;
pub use state::RuntimeState;
pub use stats::{ProtocolStats, StatsSnapshot};
pub use transport::{ChannelTransport, NativeEndpoint, Transport};

// Re-export core types for convenience
pub use hostlink_core::{
    Bridge, DispatchTable, FrameReport, HostObject, HostlinkConfig, HostlinkError,
    HostlinkResult, IncomingCommand, LogLevel, ObjectId, Opcode, ScriptValue,
};
