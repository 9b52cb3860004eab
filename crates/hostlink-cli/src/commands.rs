//! Command handlers for the hostlink CLI

use std::fs;
use std::time::Duration;

use hostlink_core::codec::decode_string;
use hostlink_core::wire::{decode_outgoing_frame, parse_frame};
use hostlink_core::{ClassId, CommandRecord, IncomingCommand, MethodId, Opcode, Target};
use hostlink_runtime::{ChannelTransport, HostlinkError, RuntimeBuilder, StatsSnapshot};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::{CliError, Result};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command, printing its output to stdout
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Pack {
                class_id,
                method_id,
            } => {
                println!("{}", Self::pack(class_id, method_id));
                Ok(())
            }
            Commands::Unpack { opcode } => {
                println!("{}", Self::unpack(&opcode)?);
                Ok(())
            }
            Commands::Decode { frame, inbound } => {
                let lines = if inbound {
                    Self::describe_inbound_frame(&frame)?
                } else {
                    Self::describe_outgoing_frame(&frame)?
                };
                for line in lines {
                    println!("{line}");
                }
                Ok(())
            }
            Commands::Replay { file, stats } => {
                let frames = Self::read_frames(&file)?;
                info!("Replaying {} frames from {}", frames.len(), file);
                let outcome = Self::replay(&config, &frames).await?;
                for frame in &outcome.outbound {
                    println!("{frame}");
                }
                if stats {
                    println!("{}", serde_json::to_string_pretty(&outcome.stats)?);
                }
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Opcodes
    // ------------------------------------------------------------------------

    pub fn pack(class_id: ClassId, method_id: MethodId) -> String {
        let opcode = Opcode::new(class_id, method_id);
        format!("{} ({})", opcode.to_hex(), opcode.pack())
    }

    pub fn unpack(hex: &str) -> Result<String> {
        let opcode = Opcode::from_hex(hex.trim())?;
        Ok(format!(
            "class={:#x} ({}) method={} {}",
            opcode.class_id,
            opcode.class_id,
            opcode.method_id,
            method_kind(opcode)
        ))
    }

    // ------------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------------

    /// One line per script-to-native record
    pub fn describe_outgoing_frame(frame: &str) -> Result<Vec<String>> {
        let records = decode_outgoing_frame(frame)?;
        Ok(records.iter().map(describe_record).collect())
    }

    /// One line per native-to-script record
    pub fn describe_inbound_frame(frame: &str) -> Result<Vec<String>> {
        parse_frame(frame).map(describe_incoming).collect()
    }

    /// Inbound frames of a replay file
    pub fn read_frames(path: &str) -> Result<Vec<String>> {
        let text = fs::read_to_string(path)?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect())
    }

    // ------------------------------------------------------------------------
    // Replay
    // ------------------------------------------------------------------------

    /// Run `frames` through a fresh runtime, one tick per frame
    ///
    /// No feature classes are registered, so only diagnostics traffic is
    /// handled; everything else shows up in the drop counters.
    pub async fn replay(config: &AppConfig, frames: &[String]) -> Result<ReplayOutcome> {
        let mut runtime = RuntimeBuilder::new()
            .with_config(config.hostlink.clone())
            .build()?;
        let (mut transport, mut native) =
            ChannelTransport::pair(config.hostlink.transport.channel_buffer_size);

        let task = tokio::spawn(async move {
            runtime.run(&mut transport).await?;
            Ok::<_, HostlinkError>(runtime.stats())
        });

        let wait = Duration::from_millis(config.replay.tick_timeout_ms);
        let mut outbound = Vec::with_capacity(frames.len());
        for (index, frame) in frames.iter().enumerate() {
            native.send_frame(frame.as_str()).await?;
            let reply = timeout(wait, native.recv_frame())
                .await
                .map_err(|_| {
                    CliError::Replay(format!(
                        "no reply to frame {} within {} ms",
                        index + 1,
                        config.replay.tick_timeout_ms
                    ))
                })?
                .ok_or_else(|| CliError::Replay("runtime stopped early".to_string()))?;
            debug!(frame = index + 1, bytes = reply.len(), "replayed");
            outbound.push(reply);
        }

        native.finish();
        let stats = task
            .await
            .map_err(|e| CliError::Replay(format!("runtime task failed: {e}")))??;
        Ok(ReplayOutcome { outbound, stats })
    }
}

/// Result of a replay
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    /// One outgoing frame per replayed inbound frame
    pub outbound: Vec<String>,
    pub stats: StatsSnapshot,
}

// ----------------------------------------------------------------------------
// Formatting
// ----------------------------------------------------------------------------

fn method_kind(opcode: Opcode) -> &'static str {
    if opcode.is_create() {
        "create"
    } else if opcode.is_static() {
        "static"
    } else {
        "instance"
    }
}

/// String tokens are shown unescaped; anything else is shown as sent
fn display_args(args: &[String]) -> String {
    let shown: Vec<String> = args
        .iter()
        .map(|token| match decode_string(token) {
            Ok(text) => format!("{text:?}"),
            Err(_) => format!("{token:?}"),
        })
        .collect();
    format!("[{}]", shown.join(", "))
}

fn describe_record(record: &CommandRecord) -> String {
    match record {
        CommandRecord::Command {
            opcode,
            target,
            args,
        } => {
            let target = match target {
                Some(Target::Object(id)) => format!(" target={id}"),
                Some(Target::Null) => " target=null".to_string(),
                None => String::new(),
            };
            format!(
                "{} class={:#x} method={} {}{} args={}",
                opcode.to_hex(),
                opcode.class_id,
                opcode.method_id,
                method_kind(*opcode),
                target,
                display_args(args)
            )
        }
        CommandRecord::Subcommand { args } => format!("  (subcommand) args={}", display_args(args)),
    }
}

fn describe_incoming(mut command: IncomingCommand) -> Result<String> {
    let class_id = command.pop_int()?;
    let method_id = command.pop_int()?;
    let mut rest = Vec::with_capacity(command.remaining());
    while !command.is_empty() {
        rest.push(command.pop_token("argument")?);
    }
    let kind = if method_id > 0 { "instance" } else { "static" };
    Ok(format!(
        "class={:#x} ({}) method={} {} tokens={}",
        class_id,
        class_id,
        method_id,
        kind,
        display_args(&rest)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlink_core::HostlinkConfig;

    fn replay_config() -> AppConfig {
        AppConfig {
            hostlink: HostlinkConfig::testing(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_pack_and_unpack() {
        assert_eq!(CommandDispatcher::pack(0x148, -1), "148ffff (21561343)");
        assert_eq!(CommandDispatcher::pack(0x150, 2), "1500002 (22020098)");

        let line = CommandDispatcher::unpack("148ffff").unwrap();
        assert_eq!(line, "class=0x148 (328) method=-1 create");
        let line = CommandDispatcher::unpack("1500002").unwrap();
        assert!(line.ends_with("method=2 instance"));
        assert!(CommandDispatcher::unpack("not-hex").is_err());
    }

    #[test]
    fn test_describe_outgoing_frame() {
        let lines = CommandDispatcher::describe_outgoing_frame(
            "148ffff,1,clip%2Ca:1480004,-1,0.5:,x",
        )
        .unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "148ffff class=0x148 method=-1 create args=[\"1\", \"clip,a\"]"
        );
        assert_eq!(
            lines[1],
            "1480004 class=0x148 method=4 instance target=null args=[\"0.5\"]"
        );
        assert!(lines[2].contains("subcommand"));
    }

    #[test]
    fn test_describe_inbound_frame() {
        let lines = CommandDispatcher::describe_inbound_frame("336,1,1,2:336,2,1").unwrap();
        assert_eq!(
            lines[0],
            "class=0x150 (336) method=1 instance tokens=[\"1\", \"2\"]"
        );
        assert_eq!(lines[1], "class=0x150 (336) method=2 instance tokens=[\"1\"]");

        assert!(CommandDispatcher::describe_inbound_frame("abc,1").is_err());
    }

    #[tokio::test]
    async fn test_replay_emits_one_frame_per_tick() {
        let frames = vec![
            String::new(),
            "336,1,1,1".to_string(),
            "999,0".to_string(),
        ];
        let outcome = CommandDispatcher::replay(&replay_config(), &frames)
            .await
            .unwrap();

        assert_eq!(outcome.outbound.len(), 3);
        assert_eq!(outcome.outbound[0], "150ffff,1,hostlink.protocol,1");
        assert!(outcome.outbound[1].starts_with("1500002,1,"));
        assert_eq!(outcome.stats.frames_in, 3);
        assert_eq!(outcome.stats.commands_handled, 1);
        assert_eq!(outcome.stats.commands_dropped, 1);
    }

    #[tokio::test]
    async fn test_replay_rejects_invalid_config() {
        let mut config = replay_config();
        config.hostlink.transport.channel_buffer_size = 0;
        let result = CommandDispatcher::replay(&config, &[]).await;
        assert!(matches!(result, Err(CliError::Hostlink(_))));
    }

    #[test]
    fn test_read_frames_skips_comments() {
        let path = std::env::temp_dir().join(format!("hostlink-frames-{}.log", std::process::id()));
        fs::write(&path, "# recorded session\n336,1,1,1\n\n  336,2,1  \n").unwrap();
        let frames = CommandDispatcher::read_frames(path.to_str().unwrap()).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(frames, vec!["336,1,1,1".to_string(), "336,2,1".to_string()]);
    }
}
