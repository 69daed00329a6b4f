use std::fmt;

use super::message::MessageId;

/// Which of the two push streams an event arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushKind {
    /// Arrived while the feed screen is in the foreground.
    Foreground,
    /// The user tapped a system notification outside the app.
    Opened,
}

impl PushKind {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Foreground => "PUSH_FOREGROUND",
            Self::Opened => "PUSH_OPENED",
        }
    }
}

/// Transient notification event; consumed once, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub kind: PushKind,
    pub title: Option<String>,
    pub body: Option<String>,
    /// Correlation key, when the backend supplies one.
    pub related_message_id: Option<MessageId>,
}

impl PushEvent {
    pub fn foreground(title: Option<&str>, body: Option<&str>) -> Self {
        Self {
            kind: PushKind::Foreground,
            title: title.map(str::to_owned),
            body: body.map(str::to_owned),
            related_message_id: None,
        }
    }

    pub fn opened(title: Option<&str>, body: Option<&str>) -> Self {
        Self {
            kind: PushKind::Opened,
            ..Self::foreground(title, body)
        }
    }

    pub fn with_related_message(mut self, id: MessageId) -> Self {
        self.related_message_id = Some(id);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Authorized,
    Provisional,
    Denied,
    NotDetermined,
}

impl PermissionStatus {
    pub fn allows_delivery(self) -> bool {
        matches!(self, Self::Authorized | Self::Provisional)
    }
}

/// Device registration token. `Debug` and `Display` never print the value.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceToken(String);

impl DeviceToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Debug for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceToken({})", crate::infra::secrets::redact_token(&self.0))
    }
}

impl fmt::Display for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::infra::secrets::redact_token(&self.0))
    }
}

/// Where an opened notification should take the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationTarget {
    Message(MessageId),
    Feed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub body: String,
}

/// The single user-visible action chosen for a push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    ShowAlert(Alert),
    Navigate(NavigationTarget),
    Ignore,
}

impl RouteAction {
    pub fn show_alert(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::ShowAlert(Alert {
            title: title.into(),
            body: body.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opened_constructor_keeps_payload() {
        let event = PushEvent::opened(Some("New message"), Some("hi"))
            .with_related_message(MessageId::new("m1"));

        assert_eq!(event.kind, PushKind::Opened);
        assert_eq!(event.title.as_deref(), Some("New message"));
        assert_eq!(event.related_message_id, Some(MessageId::new("m1")));
    }

    #[test]
    fn only_authorized_and_provisional_allow_delivery() {
        assert!(PermissionStatus::Authorized.allows_delivery());
        assert!(PermissionStatus::Provisional.allows_delivery());
        assert!(!PermissionStatus::Denied.allows_delivery());
        assert!(!PermissionStatus::NotDetermined.allows_delivery());
    }

    #[test]
    fn device_token_formatting_hides_value() {
        let token = DeviceToken::new("fcm-token-abcdef123456");

        assert!(!format!("{token:?}").contains("abcdef123456"));
        assert!(!token.to_string().contains("abcdef123456"));
        assert!(token.to_string().starts_with("fcm-"));
    }
}
