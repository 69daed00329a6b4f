use super::push::PushEvent;

/// Explicit actions taken by the user on the chat screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// Replace the compose buffer contents.
    Edit(String),
    Send,
    AcknowledgeAlert,
    /// Resubscribe a feed that stopped on a backend error.
    Reconnect,
    Quit,
}

/// One item from any of the screen's independent sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenEvent {
    /// The feed subscription moved to a new state.
    FeedChanged,
    Push(PushEvent),
    User(UserAction),
}
