//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};
use hostlink_core::{ClassId, MethodId};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pack a class id and method id into a wire opcode
    Pack {
        /// Class id, decimal or 0x-prefixed hex
        #[arg(value_parser = parse_class_id)]
        class_id: ClassId,
        /// Method id (-1 is create, <= 0 is static)
        #[arg(allow_negative_numbers = true)]
        method_id: MethodId,
    },
    /// Split a hex wire opcode into class id and method id
    Unpack {
        /// Opcode as sent on the wire, e.g. 148ffff
        opcode: String,
    },
    /// Print the records of a frame
    Decode {
        /// The frame text
        frame: String,
        /// Treat the frame as native-to-script (decimal class and method ids)
        #[arg(short, long)]
        inbound: bool,
    },
    /// Feed a file of inbound frames through a runtime and print every outgoing frame
    Replay {
        /// File with one inbound frame per line; blank lines and `#` comments are skipped
        file: String,
        /// Print the protocol counters as JSON once the replay ends
        #[arg(short, long)]
        stats: bool,
    },
}

/// Accept `336` as well as `0x150`
pub fn parse_class_id(value: &str) -> Result<ClassId, String> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => ClassId::from_str_radix(hex, 16),
        None => value.parse::<ClassId>(),
    };
    parsed.map_err(|e| format!("invalid class id '{value}': {e}"))
}
