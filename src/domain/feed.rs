//! Ordered feed projection and its lifecycle states.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::message::{display_order, Message, MessageId};

/// Complete ordered view of the messages visible at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedSnapshot {
    messages: Vec<Message>,
}

/// What a merge had to repair in an incoming snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeReport {
    /// Previously visible messages the backend omitted.
    pub retained: usize,
    /// Extra copies of the same id inside the incoming snapshot.
    pub duplicates: usize,
}

impl FeedSnapshot {
    /// Builds a snapshot from messages in any order.
    pub fn from_unordered(messages: Vec<Message>) -> Self {
        Self::default().merge(messages).0
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|message| &message.id == id)
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| &message.id == id)
    }

    /// Replaces this snapshot with `incoming`, re-deriving order from
    /// timestamps. A later snapshot never loses a message this one shows.
    pub fn merge(&self, incoming: Vec<Message>) -> (Self, MergeReport) {
        let mut report = MergeReport::default();
        let mut positions: HashMap<MessageId, usize> = HashMap::with_capacity(incoming.len());
        let mut merged: Vec<Message> = Vec::with_capacity(incoming.len() + self.messages.len());

        for message in incoming {
            match positions.get(&message.id) {
                Some(&index) => {
                    report.duplicates += 1;
                    if !(message.is_pending() && !merged[index].is_pending()) {
                        merged[index] = message;
                    }
                }
                None => {
                    positions.insert(message.id.clone(), merged.len());
                    merged.push(message);
                }
            }
        }

        // A pending redelivery never demotes a message already shown resolved.
        let previous: HashMap<&MessageId, &Message> =
            self.messages.iter().map(|message| (&message.id, message)).collect();
        for message in merged.iter_mut().filter(|message| message.is_pending()) {
            if let Some(resolved) = previous.get(&message.id).filter(|p| !p.is_pending()) {
                *message = (*resolved).clone();
            }
        }

        let seen: HashSet<&MessageId> = positions.keys().collect();
        let retained: Vec<Message> = self
            .messages
            .iter()
            .filter(|message| !seen.contains(&message.id))
            .cloned()
            .collect();
        report.retained = retained.len();
        merged.extend(retained);

        merged.sort_by(display_order);
        (Self { messages: merged }, report)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("message store unavailable: {details}")]
    Unavailable { details: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedState {
    Loading,
    Active(FeedSnapshot),
    Error(FeedError),
    Closed,
}

impl FeedState {
    pub fn snapshot(&self) -> Option<&FeedSnapshot> {
        match self {
            Self::Active(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Closed)
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Loading => "FEED_LOADING",
            Self::Active(_) => "FEED_ACTIVE",
            Self::Error(_) => "FEED_ERROR",
            Self::Closed => "FEED_CLOSED",
        }
    }
}
