//! Hostlink Core Protocol Implementation
//!
//! This crate provides the substrate shared by every scripting-side feature class:
//! the object registry, the scalar codec, the command encoder, the command router,
//! callback correlation, the optional argument validator and the diagnostics
//! pub/sub channel built on top of them.
//!
//! Nothing in here is global. A [`Bridge`] owns the registry and the outgoing
//! buffer, and a [`Router`] owns the dispatch tables; the runtime crate wires
//! both together once at startup.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod bridge;
pub mod callbacks;
pub mod codec;
pub mod command;
pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod errors;
pub mod registry;
pub mod types;
pub mod validation;
pub mod value;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use bridge::Bridge;
pub use callbacks::{CallbackRegistry, Continuation};
pub use command::{CommandBuffer, CommandRecord, Target};
pub use config::{DiagnosticsConfig, HostlinkConfig, LogLevel, LoggingConfig, TransportConfig};
pub use diagnostics::{
    DiagnosticRegistry, DiagnosticsHost, DiagnosticsRecord, EmitterHandle, ListenerId,
};
pub use dispatch::{DispatchOutcome, DispatchTable, FrameReport, IncomingCommand, Router};
pub use errors::{
    DecodeError, DiagnosticsError, EncodeError, HostlinkError, HostlinkResult, ProtocolError,
    RegistryError, Result, ValidationError,
};
pub use registry::{HostObject, ObjectRegistry};
pub use types::{CallbackId, ClassId, MethodId, ObjectId, Opcode};
pub use value::{ScriptFunction, ScriptValue};
