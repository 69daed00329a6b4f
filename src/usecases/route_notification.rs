//! Decides the single user-visible action for a push event.
//!
//! Push events and feed snapshots travel on independent paths with no
//! ordering between them. The router never reconciles the two: a user can
//! see an alert and the matching feed entry, in either order, for one
//! message.

use crate::domain::{
    feed::FeedState,
    message::MessageId,
    push::{NavigationTarget, PushEvent, PushKind, RouteAction},
};

/// How a push event relates to what the feed currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    /// The event carries no message id.
    Unkeyed,
    InFeed(MessageId),
    /// Keyed, but the feed has not shown that message yet.
    NotYetInFeed(MessageId),
}

pub fn correlate(event: &PushEvent, feed: &FeedState) -> Correlation {
    match &event.related_message_id {
        None => Correlation::Unkeyed,
        Some(id) => match feed.snapshot() {
            Some(snapshot) if snapshot.contains(id) => Correlation::InFeed(id.clone()),
            _ => Correlation::NotYetInFeed(id.clone()),
        },
    }
}

/// Foreground events with a non-blank body raise an alert, blank ones are
/// ignored. Opened events always navigate, to the related message when the
/// push names one and to the feed otherwise.
pub fn route(event: &PushEvent, feed: &FeedState) -> RouteAction {
    let correlation = correlate(event, feed);
    if let Correlation::NotYetInFeed(id) = &correlation {
        tracing::debug!(
            kind = event.kind.as_label(),
            message_id = %id,
            "push references a message the feed has not delivered yet"
        );
    }

    match event.kind {
        PushKind::Foreground => match non_blank(event.body.as_deref()) {
            Some(body) => {
                let title = non_blank(event.title.as_deref()).unwrap_or_default();
                RouteAction::show_alert(title, body)
            }
            None => RouteAction::Ignore,
        },
        PushKind::Opened => RouteAction::Navigate(match correlation {
            Correlation::Unkeyed => NavigationTarget::Feed,
            Correlation::InFeed(id) | Correlation::NotYetInFeed(id) => {
                NavigationTarget::Message(id)
            }
        }),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}
