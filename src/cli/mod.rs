//! Command-line utilities for the slot host.
//!
//! - `message_sender <target> <channel_id> <message>` — select then write
//! - `message_reader <target> <channel_id>` — select then read, printing the
//!   exact bytes with no trailing newline
//!
//! A target is a slot number, or a device-style path whose trailing digits
//! name the slot (`/dev/msgslot3` is slot 3). Both utilities exit 0 on
//! success and 1 with a one-line diagnostic on any failure; neither retries.

use std::io::Write;

use anyhow::Context;

use crate::client::SlotClient;
use crate::error::SlotError;
use crate::registry::{ChannelId, SlotId};

/// Available CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliCommand {
    /// Write one message to a channel.
    Send,
    /// Read the current message of a channel.
    Read,
}

impl CliCommand {
    /// Usage line for this command.
    pub fn usage(&self) -> &'static str {
        match self {
            Self::Send => "message_sender <target> <channel_id> <message>",
            Self::Read => "message_reader <target> <channel_id>",
        }
    }
}

impl std::fmt::Display for CliCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Send => write!(f, "message_sender"),
            Self::Read => write!(f, "message_reader"),
        }
    }
}

/// Parse a CLI command from a program name.
pub fn parse_command(cmd: &str) -> Option<CliCommand> {
    match cmd {
        "message_sender" | "send" => Some(CliCommand::Send),
        "message_reader" | "read" => Some(CliCommand::Read),
        _ => None,
    }
}

/// Arguments for `message_sender`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendArgs {
    pub slot_id: SlotId,
    pub channel_id: ChannelId,
    pub message: Vec<u8>,
}

/// Arguments for `message_reader`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadArgs {
    pub slot_id: SlotId,
    pub channel_id: ChannelId,
}

/// Resolve a target to a slot id.
///
/// The range check against the host's configured slot count happens when
/// the handle is opened.
pub fn parse_target(target: &str) -> Result<SlotId, SlotError> {
    let trailing = target
        .bytes()
        .rev()
        .take_while(|b| b.is_ascii_digit())
        .count();
    let digits = &target[target.len() - trailing..];
    if digits.is_empty() {
        return Err(SlotError::InvalidArgument(format!(
            "target '{}' does not name a slot",
            target
        )));
    }
    digits.parse().map_err(|_| {
        SlotError::InvalidArgument(format!("slot number in '{}' is out of range", target))
    })
}

/// Parse a channel id. Zero parses; the host rejects it on select.
pub fn parse_channel_id(raw: &str) -> Result<ChannelId, SlotError> {
    raw.trim()
        .parse()
        .map_err(|_| SlotError::InvalidArgument(format!("'{}' is not a channel id", raw)))
}

/// Parse `message_sender` arguments (program name excluded).
pub fn parse_send_args(args: &[String]) -> Result<SendArgs, SlotError> {
    match args {
        [target, channel, message] => Ok(SendArgs {
            slot_id: parse_target(target)?,
            channel_id: parse_channel_id(channel)?,
            message: message.as_bytes().to_vec(),
        }),
        _ => Err(usage_error(CliCommand::Send)),
    }
}

/// Parse `message_reader` arguments (program name excluded).
pub fn parse_read_args(args: &[String]) -> Result<ReadArgs, SlotError> {
    match args {
        [target, channel] => Ok(ReadArgs {
            slot_id: parse_target(target)?,
            channel_id: parse_channel_id(channel)?,
        }),
        _ => Err(usage_error(CliCommand::Read)),
    }
}

fn usage_error(command: CliCommand) -> SlotError {
    SlotError::InvalidArgument(format!("usage: {}", command.usage()))
}

/// Open the target, select the channel and write the message.
pub async fn send(client: &SlotClient, args: &SendArgs) -> anyhow::Result<usize> {
    let handle = client
        .open(args.slot_id)
        .await
        .with_context(|| format!("failed to open slot {}", args.slot_id))?;
    handle
        .select(args.channel_id)
        .await
        .with_context(|| format!("failed to select channel {}", args.channel_id))?;
    let written = handle
        .write(&args.message)
        .await
        .context("failed to write message to channel")?;

    if let Err(e) = handle.close().await {
        log::warn!("failed to close handle: {}", e);
    }
    Ok(written)
}

/// Open the target, select the channel, read with a buffer of the host's
/// maximum message size and copy the bytes verbatim to `out`.
pub async fn receive(
    client: &SlotClient,
    args: &ReadArgs,
    mut out: impl Write,
) -> anyhow::Result<usize> {
    let handle = client
        .open(args.slot_id)
        .await
        .with_context(|| format!("failed to open slot {}", args.slot_id))?;
    handle
        .select(args.channel_id)
        .await
        .with_context(|| format!("failed to select channel {}", args.channel_id))?;
    let message = handle
        .read(None)
        .await
        .context("failed to read message from channel")?;

    if let Err(e) = handle.close().await {
        log::warn!("failed to close handle: {}", e);
    }

    out.write_all(&message)
        .and_then(|_| out.flush())
        .map_err(|e| SlotError::IoFailure(e.to_string()))
        .context("failed to write message to standard output")?;
    Ok(message.len())
}

/// Entry point for `message_sender`.
pub async fn sender_main(args: &[String]) -> anyhow::Result<usize> {
    let args = parse_send_args(args)?;
    let client = SlotClient::from_env()?;
    send(&client, &args).await
}

/// Entry point for `message_reader`.
pub async fn reader_main(args: &[String], out: impl Write) -> anyhow::Result<usize> {
    let args = parse_read_args(args)?;
    let client = SlotClient::from_env()?;
    receive(&client, &args, out).await
}

/// Print the one-line diagnostic for a failed command.
pub fn report_failure(command: CliCommand, err: &anyhow::Error) {
    eprintln!("{}: {:#}", command, err);
}
