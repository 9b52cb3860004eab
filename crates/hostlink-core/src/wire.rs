//! Frame format
//!
//! A frame carries every record exchanged in one tick. Records are joined by
//! `:` and tokens inside a record by `,`; the codec escapes both characters out
//! of string and JSON tokens, so splitting is unambiguous.
//!
//! Outgoing records: `[opcodeHex, instanceId?, args...]`, or `["", args...]`
//! for a subcommand. Incoming records: `[classId, cmdId, instanceId?, args...]`.

use crate::codec::{decode_object_ref, RECORD_SEPARATOR, TOKEN_SEPARATOR};
use crate::command::{CommandRecord, Target};
use crate::dispatch::IncomingCommand;
use crate::errors::DecodeError;
use crate::types::Opcode;

/// Join outgoing records into one frame
pub fn encode_frame(records: &[CommandRecord]) -> String {
    records
        .iter()
        .map(CommandRecord::encode)
        .collect::<Vec<_>>()
        .join(&RECORD_SEPARATOR.to_string())
}

/// Split an incoming frame into commands, skipping empty records
///
/// Only line terminators at the frame boundary are dropped; whitespace inside
/// a record belongs to its tokens.
pub fn parse_frame(frame: &str) -> impl Iterator<Item = IncomingCommand> + '_ {
    frame
        .trim_end_matches(['\r', '\n'])
        .split(RECORD_SEPARATOR)
        .filter(|record| !record.is_empty())
        .map(IncomingCommand::parse)
}

/// Decode an outgoing frame back into records
///
/// This is the native side's view of a frame; the runtime only ever produces
/// frames, but tools and tests need to read them.
pub fn decode_outgoing_frame(frame: &str) -> Result<Vec<CommandRecord>, DecodeError> {
    frame
        .split(RECORD_SEPARATOR)
        .filter(|record| !record.is_empty())
        .map(decode_outgoing_record)
        .collect()
}

fn decode_outgoing_record(record: &str) -> Result<CommandRecord, DecodeError> {
    let mut tokens = record.split(TOKEN_SEPARATOR).map(str::to_string);
    let head = tokens.next().ok_or_else(|| DecodeError::missing("opcode"))?;

    if head.is_empty() {
        return Ok(CommandRecord::subcommand(tokens));
    }

    let opcode = Opcode::from_hex(&head)?;
    if opcode.is_static() {
        return Ok(CommandRecord::command(opcode, tokens));
    }

    let target_token = tokens
        .next()
        .ok_or_else(|| DecodeError::missing("instance id"))?;
    let target = Target::from(decode_object_ref(&target_token)?);
    Ok(CommandRecord::instance_command(opcode, target, tokens))
}
