use std::collections::VecDeque;

use super::{
    compose_buffer::ComposeBuffer,
    feed::FeedState,
    push::{Alert, NavigationTarget},
};

/// Visible alert plus the ones queued behind it.
pub const MAX_ALERTS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenState {
    running: bool,
    feed: FeedState,
    compose: ComposeBuffer,
    alerts: VecDeque<Alert>,
    navigation: Option<NavigationTarget>,
    notice: Option<String>,
    push_enabled: bool,
}

impl Default for ScreenState {
    fn default() -> Self {
        Self {
            running: true,
            feed: FeedState::Loading,
            compose: ComposeBuffer::default(),
            alerts: VecDeque::new(),
            navigation: None,
            notice: None,
            push_enabled: false,
        }
    }
}

impl ScreenState {
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn feed(&self) -> &FeedState {
        &self.feed
    }

    pub fn set_feed(&mut self, feed: FeedState) {
        self.feed = feed;
    }

    pub fn compose(&self) -> &ComposeBuffer {
        &self.compose
    }

    pub fn compose_mut(&mut self) -> &mut ComposeBuffer {
        &mut self.compose
    }

    /// The alert currently shown, if any.
    pub fn visible_alert(&self) -> Option<&Alert> {
        self.alerts.front()
    }

    pub fn queued_alerts(&self) -> usize {
        self.alerts.len().saturating_sub(1)
    }

    /// Queues `alert` behind the visible one. A repeat of the last queued
    /// alert is collapsed, and the oldest hidden alert is dropped once the
    /// queue is full. The visible alert stays until acknowledged.
    pub fn push_alert(&mut self, alert: Alert) {
        if self.alerts.back() == Some(&alert) {
            return;
        }
        if self.alerts.len() >= MAX_ALERTS {
            self.alerts.remove(1);
        }
        self.alerts.push_back(alert);
    }

    /// Dismisses the visible alert and reveals the next queued one.
    pub fn acknowledge_alert(&mut self) -> Option<Alert> {
        self.alerts.pop_front()
    }

    pub fn navigation(&self) -> Option<&NavigationTarget> {
        self.navigation.as_ref()
    }

    pub fn navigate(&mut self, target: NavigationTarget) {
        self.navigation = Some(target);
    }

    /// Inline, non-fatal status text (send failures, degraded push).
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    pub fn push_enabled(&self) -> bool {
        self.push_enabled
    }

    pub fn set_push_enabled(&mut self, enabled: bool) {
        self.push_enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(body: &str) -> Alert {
        Alert {
            title: String::new(),
            body: body.to_owned(),
        }
    }

    #[test]
    fn default_state_is_running_and_loading() {
        let state = ScreenState::default();

        assert!(state.is_running());
        assert_eq!(state.feed(), &FeedState::Loading);
        assert!(state.visible_alert().is_none());
        assert!(!state.push_enabled());
    }

    #[test]
    fn alerts_are_shown_one_at_a_time_in_arrival_order() {
        let mut state = ScreenState::default();
        state.push_alert(alert("first"));
        state.push_alert(alert("second"));

        assert_eq!(state.visible_alert().map(|a| a.body.as_str()), Some("first"));
        assert_eq!(state.queued_alerts(), 1);

        state.acknowledge_alert();
        assert_eq!(state.visible_alert().map(|a| a.body.as_str()), Some("second"));
        assert_eq!(state.queued_alerts(), 0);

        state.acknowledge_alert();
        assert!(state.visible_alert().is_none());
        assert!(state.acknowledge_alert().is_none());
    }

    #[test]
    fn repeated_alert_is_collapsed() {
        let mut state = ScreenState::default();
        state.push_alert(alert("same"));
        state.push_alert(alert("same"));
        state.push_alert(alert("other"));
        state.push_alert(alert("same"));

        assert_eq!(state.queued_alerts(), 2);
    }

    #[test]
    fn full_queue_drops_oldest_hidden_alert_but_keeps_visible_one() {
        let mut state = ScreenState::default();
        for index in 0..MAX_ALERTS + 5 {
            state.push_alert(alert(&format!("alert {index}")));
        }

        assert_eq!(state.queued_alerts(), MAX_ALERTS - 1);
        assert_eq!(state.visible_alert().map(|a| a.body.as_str()), Some("alert 0"));

        let mut last = None;
        while let Some(alert) = state.acknowledge_alert() {
            last = Some(alert);
        }
        assert_eq!(
            last.map(|a| a.body),
            Some(format!("alert {}", MAX_ALERTS + 4))
        );
    }

    #[test]
    fn latest_navigation_wins() {
        let mut state = ScreenState::default();
        state.navigate(NavigationTarget::Feed);
        state.navigate(NavigationTarget::Message(
            crate::domain::message::MessageId::new("m1"),
        ));

        assert!(matches!(
            state.navigation(),
            Some(NavigationTarget::Message(_))
        ));
    }
}
