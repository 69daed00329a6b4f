use std::collections::VecDeque;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::{
    backend::InMemoryPlatform,
    domain::{events::UserAction, message::MessageId},
    usecases::contracts::UserActionSource,
};

const INPUT_UNKNOWN_COMMAND: &str = "INPUT_UNKNOWN_COMMAND";
const INPUT_NOTIFICATION_OPENED: &str = "INPUT_NOTIFICATION_OPENED";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    Send(String),
    Acknowledge,
    Reconnect,
    /// Simulate tapping a notification, keyed to a message when given.
    Open(Option<MessageId>),
    Quit,
    Unknown(String),
    Blank,
}

pub fn parse_line(line: &str) -> InputCommand {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return InputCommand::Blank;
    }

    let Some(command) = trimmed.strip_prefix('/') else {
        return InputCommand::Send(line.trim_end_matches(['\r', '\n']).to_owned());
    };

    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("ack"), None) => InputCommand::Acknowledge,
        (Some("reconnect"), None) => InputCommand::Reconnect,
        (Some("quit" | "q"), None) => InputCommand::Quit,
        (Some("open"), id) => InputCommand::Open(id.map(MessageId::new)),
        _ => InputCommand::Unknown(trimmed.to_owned()),
    }
}

/// Reads user actions line by line. A text line becomes an edit followed
/// by a send.
pub struct LineActionSource<R> {
    lines: Lines<R>,
    pending: VecDeque<UserAction>,
    platform: InMemoryPlatform,
}

pub type StdinActionSource = LineActionSource<BufReader<Stdin>>;

impl StdinActionSource {
    pub fn stdin(platform: InMemoryPlatform) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), platform)
    }
}

impl<R: AsyncBufRead + Unpin> LineActionSource<R> {
    pub fn new(reader: R, platform: InMemoryPlatform) -> Self {
        Self {
            lines: reader.lines(),
            pending: VecDeque::new(),
            platform,
        }
    }
}

impl<R: AsyncBufRead + Unpin> UserActionSource for LineActionSource<R> {
    async fn next_action(&mut self) -> Result<Option<UserAction>> {
        loop {
            if let Some(action) = self.pending.pop_front() {
                return Ok(Some(action));
            }

            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };

            match parse_line(&line) {
                InputCommand::Send(text) => {
                    self.pending.push_back(UserAction::Edit(text));
                    self.pending.push_back(UserAction::Send);
                }
                InputCommand::Acknowledge => return Ok(Some(UserAction::AcknowledgeAlert)),
                InputCommand::Reconnect => return Ok(Some(UserAction::Reconnect)),
                InputCommand::Quit => return Ok(Some(UserAction::Quit)),
                InputCommand::Open(id) => {
                    let delivered = self.platform.open_notification(id.as_ref());
                    tracing::debug!(
                        code = INPUT_NOTIFICATION_OPENED,
                        delivered,
                        "notification tap simulated"
                    );
                }
                InputCommand::Unknown(command) => {
                    tracing::warn!(
                        code = INPUT_UNKNOWN_COMMAND,
                        command = %command,
                        "unknown command"
                    );
                }
                InputCommand::Blank => {}
            }
        }
    }
}
