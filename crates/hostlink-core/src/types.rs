//! Core identifier types for the hostlink protocol
//!
//! Object ids, callback ids and the packed opcode that names one remote
//! operation.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::errors::DecodeError;

/// Numeric class identifier (high half of an opcode)
pub type ClassId = u16;

/// Signed method identifier (low half of an opcode)
pub type MethodId = i16;

// ----------------------------------------------------------------------------
// Object Identifier
// ----------------------------------------------------------------------------

/// Handle of a live object mirrored on both sides of the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Wire token for "no object"
    pub const NULL_TOKEN: i64 = -1;

    /// Create an object id; zero is not a valid id
    pub fn new(raw: u32) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    /// Interpret a decoded wire integer, `None` for the null sentinel or anything out of range
    pub fn from_wire(raw: i64) -> Option<Self> {
        u32::try_from(raw).ok().and_then(Self::new)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Callback Identifier
// ----------------------------------------------------------------------------

/// Correlation token pairing an asynchronous reply with its request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallbackId(u32);

impl CallbackId {
    /// The caller did not request a callback
    pub const NONE: CallbackId = CallbackId(0);

    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Opcode
// ----------------------------------------------------------------------------

/// A `(classId, methodId)` pair packed as `(classId << 16) | (methodId & 0xFFFF)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Opcode {
    pub class_id: ClassId,
    pub method_id: MethodId,
}

impl Opcode {
    /// Conventional method id of the "create" operation
    pub const CREATE: MethodId = -1;

    pub fn new(class_id: ClassId, method_id: MethodId) -> Self {
        Self {
            class_id,
            method_id,
        }
    }

    /// The "create" opcode of a class
    pub fn create(class_id: ClassId) -> Self {
        Self::new(class_id, Self::CREATE)
    }

    pub fn pack(self) -> u32 {
        ((self.class_id as u32) << 16) | (self.method_id as u16 as u32)
    }

    pub fn unpack(raw: u32) -> Self {
        Self {
            class_id: (raw >> 16) as u16,
            method_id: raw as u16 as i16,
        }
    }

    pub fn is_create(self) -> bool {
        self.method_id == Self::CREATE
    }

    /// Static or class-level operation (no target instance)
    pub fn is_static(self) -> bool {
        self.method_id <= 0
    }

    pub fn is_instance(self) -> bool {
        self.method_id > 0
    }

    /// Lowercase hexadecimal wire form
    pub fn to_hex(self) -> String {
        format!("{:x}", self.pack())
    }

    pub fn from_hex(token: &str) -> Result<Self, DecodeError> {
        u32::from_str_radix(token, 16)
            .map(Self::unpack)
            .map_err(|_| DecodeError::invalid("opcode", token))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}:{}", self.class_id, self.method_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_opcode_low_bits() {
        let opcode = Opcode::create(0x148);
        assert_eq!(opcode.pack() & 0xFFFF, 0xFFFF);
        assert_eq!(opcode.pack() >> 16, 0x148);
        assert!(opcode.is_create());
        assert!(opcode.is_static());
    }

    #[test]
    fn test_opcode_hex() {
        let opcode = Opcode::new(0x148, 3);
        assert_eq!(opcode.to_hex(), "1480003");
        assert_eq!(Opcode::from_hex("1480003").unwrap(), opcode);
        assert_eq!(Opcode::from_hex("148ffff").unwrap(), Opcode::create(0x148));
        assert!(Opcode::from_hex("zz").is_err());
    }

    #[test]
    fn test_object_id_from_wire() {
        assert_eq!(ObjectId::from_wire(1), ObjectId::new(1));
        assert_eq!(ObjectId::from_wire(-1), None);
        assert_eq!(ObjectId::from_wire(0), None);
        assert_eq!(ObjectId::from_wire(i64::from(u32::MAX) + 1), None);
    }

    #[test]
    fn test_callback_none() {
        assert!(CallbackId::NONE.is_none());
        assert!(!CallbackId::new(1).is_none());
    }
}
