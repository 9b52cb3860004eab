//! Error types for the hostlink protocol
//!
//! This module contains every error used by the core: codec failures, inbound
//! protocol failures (always recovered by the router), outbound validation
//! failures, and the `HostlinkError` type that unifies them all.

use crate::types::{CallbackId, ClassId, MethodId};

// ----------------------------------------------------------------------------
// Codec Error Types
// ----------------------------------------------------------------------------

/// A token could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Missing {expected} token")]
    Missing { expected: &'static str },
    #[error("Invalid {kind} token: {token:?}")]
    Invalid { kind: &'static str, token: String },
}

impl DecodeError {
    pub fn missing(expected: &'static str) -> Self {
        DecodeError::Missing { expected }
    }

    pub fn invalid<T: Into<String>>(kind: &'static str, token: T) -> Self {
        DecodeError::Invalid {
            kind,
            token: token.into(),
        }
    }
}

/// A value could not be encoded into a token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("Cannot encode {kind} value")]
    Unencodable { kind: &'static str },
    #[error("Instance of class {class_id:#x} is not registered")]
    UnregisteredInstance { class_id: ClassId },
    #[error("JSON encoding failed: {reason}")]
    Json { reason: String },
}

// ----------------------------------------------------------------------------
// Protocol Error Types
// ----------------------------------------------------------------------------

/// Inbound command failures; the router logs these and drops the command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed command: {reason}")]
    Parse { reason: String },
    #[error("Unknown class id {class_id:#x}")]
    UnknownClass { class_id: i64 },
    #[error("Unknown command {method_id} for class {class_id:#x}")]
    UnknownMethod { class_id: ClassId, method_id: MethodId },
    #[error(
        "Class {class_id:#x} command {method_id}: instance {instance_id} could not be found, \
         it may have been destroyed this frame"
    )]
    DanglingReference {
        class_id: ClassId,
        method_id: MethodId,
        instance_id: i64,
    },
    #[error("No pending callback with id {callback_id}")]
    UnknownCallback { callback_id: CallbackId },
}

impl From<DecodeError> for ProtocolError {
    fn from(err: DecodeError) -> Self {
        ProtocolError::Parse {
            reason: err.to_string(),
        }
    }
}

impl ProtocolError {
    /// Wrong token count for a command's declared shape
    pub fn token_count(expected: usize, actual: usize) -> Self {
        ProtocolError::Parse {
            reason: format!("expected {expected} argument tokens, got {actual}"),
        }
    }
}

// ----------------------------------------------------------------------------
// Outbound Error Types
// ----------------------------------------------------------------------------

/// Pre-flight schema check failure on an outgoing call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: expected {expected}: {message}")]
pub struct ValidationError {
    /// Location of the failing value, e.g. `args[1].name`
    pub path: String,
    /// Human readable expected kind, e.g. `number` or `integer[]`
    pub expected: String,
    pub message: String,
}

impl ValidationError {
    pub fn new<P, E, M>(path: P, expected: E, message: M) -> Self
    where
        P: Into<String>,
        E: Into<String>,
        M: Into<String>,
    {
        Self {
            path: path.into(),
            expected: expected.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Object id space exhausted")]
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiagnosticsError {
    #[error("Diagnostics emitter already registered: {name}")]
    DuplicateEmitter { name: String },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error type for the hostlink protocol
#[derive(Debug, thiserror::Error)]
pub enum HostlinkError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Diagnostics error: {0}")]
    Diagnostics(#[from] DiagnosticsError),

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// Transport error (frame delivery between the two sides)
    #[error("Transport error: {reason}")]
    Transport { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl HostlinkError {
    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        HostlinkError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a transport error with a reason
    pub fn transport_error<T: Into<String>>(reason: T) -> Self {
        HostlinkError::Transport {
            reason: reason.into(),
        }
    }

    /// Create a parse error for a malformed inbound command
    pub fn parse_error<T: Into<String>>(reason: T) -> Self {
        HostlinkError::Protocol(ProtocolError::Parse {
            reason: reason.into(),
        })
    }

    /// Expected races (an instance destroyed while a message was in flight)
    pub fn is_dangling_reference(&self) -> bool {
        matches!(
            self,
            HostlinkError::Protocol(ProtocolError::DanglingReference { .. })
        )
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, HostlinkError>;
pub type HostlinkResult<T> = Result<T>;
