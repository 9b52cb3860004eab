//! Outgoing command records and the shared outgoing buffer

use smallvec::SmallVec;

use crate::codec::{encode_object_ref, TOKEN_SEPARATOR};
use crate::types::{ObjectId, Opcode};

/// Encoded argument tokens of one record
pub type ArgTokens = SmallVec<[String; 4]>;

// ----------------------------------------------------------------------------
// Command Record
// ----------------------------------------------------------------------------

/// Instance addressed by an outgoing command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Null reference, sent as `-1`
    Null,
    Object(ObjectId),
}

impl Target {
    pub fn to_token(self) -> String {
        match self {
            Target::Null => encode_object_ref(None),
            Target::Object(id) => encode_object_ref(Some(id)),
        }
    }
}

impl From<Option<ObjectId>> for Target {
    fn from(id: Option<ObjectId>) -> Self {
        id.map_or(Target::Null, Target::Object)
    }
}

/// One outgoing record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandRecord {
    /// `[opcodeHex, instanceId?, args...]`
    Command {
        opcode: Opcode,
        target: Option<Target>,
        args: ArgTokens,
    },
    /// Continuation of the previous command's payload, no opcode
    Subcommand { args: ArgTokens },
}

impl CommandRecord {
    pub fn command(opcode: Opcode, args: impl IntoIterator<Item = String>) -> Self {
        CommandRecord::Command {
            opcode,
            target: None,
            args: args.into_iter().collect(),
        }
    }

    pub fn instance_command(
        opcode: Opcode,
        target: Target,
        args: impl IntoIterator<Item = String>,
    ) -> Self {
        CommandRecord::Command {
            opcode,
            target: Some(target),
            args: args.into_iter().collect(),
        }
    }

    pub fn subcommand(args: impl IntoIterator<Item = String>) -> Self {
        CommandRecord::Subcommand {
            args: args.into_iter().collect(),
        }
    }

    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            CommandRecord::Command { opcode, .. } => Some(*opcode),
            CommandRecord::Subcommand { .. } => None,
        }
    }

    pub fn args(&self) -> &[String] {
        match self {
            CommandRecord::Command { args, .. } | CommandRecord::Subcommand { args } => &args[..],
        }
    }

    /// Wire tokens; a subcommand starts with an empty token
    pub fn to_tokens(&self) -> Vec<String> {
        let mut tokens = Vec::with_capacity(self.args().len() + 2);
        match self {
            CommandRecord::Command { opcode, target, .. } => {
                tokens.push(opcode.to_hex());
                if let Some(target) = target {
                    tokens.push(target.to_token());
                }
            }
            CommandRecord::Subcommand { .. } => tokens.push(String::new()),
        }
        tokens.extend(self.args().iter().cloned());
        tokens
    }

    pub fn encode(&self) -> String {
        self.to_tokens().join(&TOKEN_SEPARATOR.to_string())
    }
}

// ----------------------------------------------------------------------------
// Command Buffer
// ----------------------------------------------------------------------------

/// Outgoing records accumulated during one tick
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    records: Vec<CommandRecord>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fully composed record
    pub fn push(&mut self, record: CommandRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[CommandRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&CommandRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Take every pending record, leaving the buffer empty
    pub fn drain(&mut self) -> Vec<CommandRecord> {
        core::mem::take(&mut self.records)
    }
}
