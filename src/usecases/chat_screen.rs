//! The single chat screen: one consumer context over three independent
//! sources (feed snapshots, push events, user actions).

use anyhow::Result;

use crate::{
    domain::{
        compose_buffer::MAX_COMPOSE_LENGTH,
        events::{ScreenEvent, UserAction},
        feed::FeedState,
        push::{PushEvent, RouteAction},
        screen_state::ScreenState,
    },
    usecases::{
        contracts::{DocumentBackend, PushBackend, UserActionSource},
        feed_subscription::FeedSubscription,
        message_store::{MessageStore, StoreError},
        push_channel::{PushChannel, PushSession},
        route_notification::route,
    },
};

const SCREEN_ACTIVATED: &str = "SCREEN_ACTIVATED";
const SCREEN_DEACTIVATED: &str = "SCREEN_DEACTIVATED";
const SCREEN_PUSH_UNAVAILABLE: &str = "SCREEN_PUSH_UNAVAILABLE";
const SCREEN_FEED_RESUBSCRIBED: &str = "SCREEN_FEED_RESUBSCRIBED";

/// Every listener the screen holds is acquired in `activate` and released
/// in `deactivate` or on drop.
pub struct ChatScreen<B: DocumentBackend> {
    store: MessageStore<B>,
    feed: FeedSubscription,
    push: Option<PushSession>,
    state: ScreenState,
}

impl<B: DocumentBackend> ChatScreen<B> {
    pub async fn activate<P: PushBackend>(
        store: MessageStore<B>,
        channel: &PushChannel<P>,
    ) -> Self {
        let feed = store.subscribe();
        let mut state = ScreenState::default();
        state.set_feed(feed.state().clone());

        let push = match channel.activate().await {
            Ok(session) => {
                let registration = session.registration();
                tracing::debug!(
                    permission = ?registration.permission,
                    topic_subscribed = registration.topic_subscribed,
                    has_token = registration.token.is_some(),
                    "push registration finished"
                );
                if let Some(first) = registration.degraded.first() {
                    state.set_notice(format!("Notifications limited: {first}"));
                }
                state.set_push_enabled(session.is_delivering());
                Some(session)
            }
            Err(error) => {
                tracing::warn!(
                    code = SCREEN_PUSH_UNAVAILABLE,
                    error = %error,
                    "screen continues feed-only"
                );
                state.set_notice(format!("Notifications unavailable: {error}"));
                None
            }
        };

        tracing::info!(
            code = SCREEN_ACTIVATED,
            feed = state.feed().as_label(),
            push_enabled = state.push_enabled(),
            "chat screen activated"
        );

        Self {
            store,
            feed,
            push,
            state,
        }
    }

    pub fn state(&self) -> &ScreenState {
        &self.state
    }

    /// Waits for whichever source produces first. An exhausted input source
    /// reads as a quit request.
    pub async fn next_event<I: UserActionSource>(&mut self, input: &mut I) -> Result<ScreenEvent> {
        tokio::select! {
            () = feed_changed(&mut self.feed) => Ok(ScreenEvent::FeedChanged),
            event = push_event(&mut self.push) => Ok(ScreenEvent::Push(event)),
            action = input.next_action() => {
                Ok(ScreenEvent::User(action?.unwrap_or(UserAction::Quit)))
            }
        }
    }

    pub async fn handle_event(&mut self, event: ScreenEvent) -> Result<()> {
        match event {
            ScreenEvent::FeedChanged => self.state.set_feed(self.feed.state().clone()),
            ScreenEvent::Push(event) => self.handle_push(&event),
            ScreenEvent::User(action) => self.handle_action(action).await,
        }

        Ok(())
    }

    /// Renders once, then after every handled event until the user quits.
    pub async fn run<I, R>(&mut self, input: &mut I, mut render: R) -> Result<()>
    where
        I: UserActionSource,
        R: FnMut(&ScreenState),
    {
        render(&self.state);
        while self.state.is_running() {
            let event = self.next_event(input).await?;
            self.handle_event(event).await?;
            render(&self.state);
        }

        self.deactivate();
        Ok(())
    }

    /// Releases the feed and push listeners. Idempotent.
    pub fn deactivate(&mut self) {
        let was_active = !self.feed.state().is_terminal() || self.push.is_some();

        self.feed.cancel();
        if let Some(mut session) = self.push.take() {
            session.deactivate();
        }
        self.state.set_feed(FeedState::Closed);
        self.state.set_push_enabled(false);

        if was_active {
            tracing::info!(code = SCREEN_DEACTIVATED, "chat screen deactivated");
        }
    }

    fn handle_push(&mut self, event: &PushEvent) {
        match route(event, self.state.feed()) {
            RouteAction::ShowAlert(alert) => self.state.push_alert(alert),
            RouteAction::Navigate(target) => self.state.navigate(target),
            RouteAction::Ignore => {
                tracing::debug!(kind = event.kind.as_label(), "push ignored");
            }
        }
    }

    async fn handle_action(&mut self, action: UserAction) {
        match action {
            UserAction::Edit(text) => {
                if !self.state.compose_mut().set_text(&text) {
                    self.state.set_notice(format!(
                        "Message truncated to {MAX_COMPOSE_LENGTH} characters"
                    ));
                }
            }
            UserAction::Send => match self.store.send_from(self.state.compose_mut()).await {
                Ok(_) => {
                    self.state.clear_notice();
                    self.reconnect_failed_feed();
                }
                Err(StoreError::Empty) => {}
                Err(error) => self.state.set_notice(format!("Send failed: {error}")),
            },
            UserAction::AcknowledgeAlert => {
                self.state.acknowledge_alert();
            }
            UserAction::Reconnect => {
                if !self.reconnect_failed_feed() {
                    tracing::debug!(feed = self.state.feed().as_label(), "reconnect skipped");
                }
            }
            UserAction::Quit => self.state.stop(),
        }
    }

    /// Replaces a feed that stopped on a backend error. A feed closed by
    /// deactivation stays closed.
    fn reconnect_failed_feed(&mut self) -> bool {
        if !matches!(self.feed.state(), FeedState::Error(_)) {
            return false;
        }

        self.feed = self.store.subscribe();
        self.state.set_feed(self.feed.state().clone());
        tracing::info!(
            code = SCREEN_FEED_RESUBSCRIBED,
            feed = self.state.feed().as_label(),
            "feed resubscribed"
        );
        true
    }
}

impl<B: DocumentBackend> Drop for ChatScreen<B> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

async fn feed_changed(feed: &mut FeedSubscription) {
    if feed.changed().await.is_none() {
        std::future::pending::<()>().await;
    }
}

async fn push_event(push: &mut Option<PushSession>) -> PushEvent {
    if let Some(session) = push {
        if let Some(event) = session.next_event().await {
            return event;
        }
    }
    std::future::pending().await
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::{
        backend::{
            document_store::InMemoryDocumentStore, push_service::InMemoryPushService,
            InMemoryPlatform,
        },
        domain::push::{NavigationTarget, PushKind},
        infra::config::{BackendConfig, PushConfig},
        test_support::global_lock,
        usecases::contracts::RawPush,
    };

    struct ScriptedInput {
        queue: VecDeque<UserAction>,
    }

    impl ScriptedInput {
        fn from(actions: Vec<UserAction>) -> Self {
            Self {
                queue: actions.into(),
            }
        }
    }

    impl UserActionSource for ScriptedInput {
        async fn next_action(&mut self) -> Result<Option<UserAction>> {
            Ok(self.queue.pop_front())
        }
    }

    /// Never yields, so only feed and push events drive the screen.
    struct IdleInput;

    impl UserActionSource for IdleInput {
        async fn next_action(&mut self) -> Result<Option<UserAction>> {
            std::future::pending().await
        }
    }

    fn platform(backend: BackendConfig) -> InMemoryPlatform {
        InMemoryPlatform::new(&backend, &PushConfig::default().topic)
    }

    async fn screen(
        platform: &InMemoryPlatform,
    ) -> (
        ChatScreen<InMemoryDocumentStore>,
        PushChannel<InMemoryPushService>,
    ) {
        let store = MessageStore::new(platform.documents());
        let channel = PushChannel::new(platform.push(), PushConfig::default());
        let mut screen = ChatScreen::activate(store, &channel).await;
        let event = screen.next_event(&mut IdleInput).await.expect("initial snapshot");
        screen.handle_event(event).await.expect("handled");
        (screen, channel)
    }

    async fn pump(screen: &mut ChatScreen<InMemoryDocumentStore>) {
        let event = screen.next_event(&mut IdleInput).await.expect("event");
        screen.handle_event(event).await.expect("handled");
    }

    fn feed_texts(state: &ScreenState) -> Vec<String> {
        state
            .feed()
            .snapshot()
            .map(|s| s.messages().iter().map(|m| m.text.clone()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn sequential_appends_render_in_append_order() {
        let platform = platform(BackendConfig {
            push_on_insert: false,
            ..BackendConfig::default()
        });
        let (mut screen, _channel) = screen(&platform).await;

        for text in ["hi", "there"] {
            screen
                .handle_event(ScreenEvent::User(UserAction::Edit(text.to_owned())))
                .await
                .expect("edit");
            screen
                .handle_event(ScreenEvent::User(UserAction::Send))
                .await
                .expect("send");
            pump(&mut screen).await;
        }

        assert_eq!(feed_texts(screen.state()), vec!["hi", "there"]);
        assert!(screen.state().compose().is_empty());
    }

    #[tokio::test]
    async fn blank_send_keeps_buffer_and_reaches_no_store() {
        let platform = platform(BackendConfig::default());
        let (mut screen, _channel) = screen(&platform).await;

        screen
            .handle_event(ScreenEvent::User(UserAction::Edit("   ".to_owned())))
            .await
            .expect("edit");
        screen
            .handle_event(ScreenEvent::User(UserAction::Send))
            .await
            .expect("send");

        assert_eq!(screen.state().compose().text(), "   ");
        assert_eq!(platform.documents().document_count(), 0);
        assert!(screen.state().notice().is_none());
    }

    #[tokio::test]
    async fn offline_send_keeps_buffer_and_shows_notice() {
        let platform = platform(BackendConfig::default());
        let (mut screen, _channel) = screen(&platform).await;
        platform.set_reachable(false);

        screen
            .handle_event(ScreenEvent::User(UserAction::Edit("hello".to_owned())))
            .await
            .expect("edit");
        screen
            .handle_event(ScreenEvent::User(UserAction::Send))
            .await
            .expect("send");

        assert_eq!(screen.state().compose().text(), "hello");
        assert!(screen
            .state()
            .notice()
            .is_some_and(|notice| notice.starts_with("Send failed")));
    }

    #[tokio::test]
    async fn own_message_yields_both_feed_update_and_alert() {
        let platform = platform(BackendConfig::default());
        let (mut screen, _channel) = screen(&platform).await;

        screen
            .handle_event(ScreenEvent::User(UserAction::Edit("hi".to_owned())))
            .await
            .expect("edit");
        screen
            .handle_event(ScreenEvent::User(UserAction::Send))
            .await
            .expect("send");
        pump(&mut screen).await;
        pump(&mut screen).await;

        assert_eq!(feed_texts(screen.state()), vec!["hi"]);
        let alert = screen.state().visible_alert().expect("alert shown");
        assert_eq!(alert.title, "New message");
        assert_eq!(alert.body, "hi");
    }

    #[tokio::test]
    async fn duplicate_push_deliveries_raise_a_single_alert() {
        let platform = platform(BackendConfig {
            duplicate_push_deliveries: 2,
            ..BackendConfig::default()
        });
        let (mut screen, _channel) = screen(&platform).await;

        screen
            .handle_event(ScreenEvent::User(UserAction::Edit("hi".to_owned())))
            .await
            .expect("edit");
        screen
            .handle_event(ScreenEvent::User(UserAction::Send))
            .await
            .expect("send");
        pump(&mut screen).await;
        pump(&mut screen).await;

        assert!(screen.state().visible_alert().is_some());
        assert_eq!(screen.state().queued_alerts(), 0);
    }

    #[tokio::test]
    async fn opened_notification_navigates_to_message() {
        let platform = platform(BackendConfig {
            push_on_insert: false,
            ..BackendConfig::default()
        });
        let (mut screen, _channel) = screen(&platform).await;
        let id = MessageStore::new(platform.documents())
            .append("hi")
            .await
            .expect("append");
        pump(&mut screen).await;

        platform.open_notification(Some(&id));
        pump(&mut screen).await;

        assert_eq!(
            screen.state().navigation(),
            Some(&NavigationTarget::Message(id))
        );
    }

    #[tokio::test]
    async fn blank_foreground_push_is_ignored_and_acknowledge_clears_alert() {
        let platform = platform(BackendConfig::default());
        let (mut screen, _channel) = screen(&platform).await;

        platform.push().publish("chat", RawPush::default());
        pump(&mut screen).await;
        assert!(screen.state().visible_alert().is_none());

        platform.push().publish(
            "chat",
            RawPush {
                body: Some("hello".to_owned()),
                ..RawPush::default()
            },
        );
        pump(&mut screen).await;
        assert_eq!(
            screen.state().visible_alert().map(|a| a.title.as_str()),
            Some("")
        );

        screen
            .handle_event(ScreenEvent::User(UserAction::AcknowledgeAlert))
            .await
            .expect("ack");
        assert!(screen.state().visible_alert().is_none());
    }

    #[tokio::test]
    async fn denied_permission_keeps_feed_working() {
        let platform = platform(BackendConfig {
            permission: "denied".to_owned(),
            ..BackendConfig::default()
        });
        let (mut screen, _channel) = screen(&platform).await;

        assert!(!screen.state().push_enabled());
        assert!(screen.state().notice().is_some());

        MessageStore::new(platform.documents())
            .append("hi")
            .await
            .expect("append");
        pump(&mut screen).await;

        assert_eq!(feed_texts(screen.state()), vec!["hi"]);
    }

    #[tokio::test]
    async fn deactivation_releases_every_listener_and_allows_reactivation() {
        let platform = platform(BackendConfig::default());
        let (mut screen, channel) = screen(&platform).await;
        assert_eq!(platform.documents().listener_count(), 1);
        assert_eq!(platform.push().listener_count(PushKind::Foreground), 1);
        assert_eq!(platform.push().listener_count(PushKind::Opened), 1);

        screen.deactivate();

        assert_eq!(screen.state().feed(), &FeedState::Closed);
        assert_eq!(platform.documents().listener_count(), 0);
        assert_eq!(platform.push().listener_count(PushKind::Foreground), 0);
        assert_eq!(platform.push().listener_count(PushKind::Opened), 0);

        let again = ChatScreen::activate(MessageStore::new(platform.documents()), &channel).await;
        assert!(again.state().push_enabled());
        assert_eq!(platform.push().listener_count(PushKind::Foreground), 1);
    }

    #[tokio::test]
    async fn run_loop_stops_on_quit_and_releases_listeners() {
        let platform = platform(BackendConfig::default());
        let store = MessageStore::new(platform.documents());
        let channel = PushChannel::new(platform.push(), PushConfig::default());
        let mut screen = ChatScreen::activate(store, &channel).await;
        let mut input = ScriptedInput::from(vec![
            UserAction::Edit("hi".to_owned()),
            UserAction::Send,
            UserAction::Quit,
        ]);
        let mut renders = 0;

        screen
            .run(&mut input, |_| renders += 1)
            .await
            .expect("run loop");

        assert!(renders >= 4);
        assert!(!screen.state().is_running());
        assert_eq!(platform.documents().document_count(), 1);
        assert_eq!(platform.documents().listener_count(), 0);
    }

    #[tokio::test]
    async fn store_update_after_deactivation_changes_nothing() {
        let _lock = global_lock();
        let platform = platform(BackendConfig::default());
        let (mut screen, _channel) = screen(&platform).await;
        screen.deactivate();

        MessageStore::new(platform.documents())
            .append("late")
            .await
            .expect("append");

        assert_eq!(screen.state().feed(), &FeedState::Closed);
        assert!(screen.feed.changed().await.is_none());
    }

    async fn offline_screen(
        platform: &InMemoryPlatform,
    ) -> (
        ChatScreen<InMemoryDocumentStore>,
        PushChannel<InMemoryPushService>,
    ) {
        let store = MessageStore::new(platform.documents());
        let channel = PushChannel::new(platform.push(), PushConfig::default());
        let screen = ChatScreen::activate(store, &channel).await;
        assert!(matches!(screen.state().feed(), FeedState::Error(_)));
        (screen, channel)
    }

    #[tokio::test]
    async fn reconnect_revives_a_failed_feed() {
        let platform = platform(BackendConfig {
            offline: true,
            ..BackendConfig::default()
        });
        let (mut screen, _channel) = offline_screen(&platform).await;
        platform.set_reachable(true);

        screen
            .handle_event(ScreenEvent::User(UserAction::Reconnect))
            .await
            .expect("reconnect");
        assert_eq!(screen.state().feed(), &FeedState::Loading);
        pump(&mut screen).await;

        assert!(matches!(screen.state().feed(), FeedState::Active(_)));
        assert_eq!(platform.documents().listener_count(), 1);
    }

    #[tokio::test]
    async fn successful_send_revives_a_failed_feed() {
        let platform = platform(BackendConfig {
            offline: true,
            ..BackendConfig::default()
        });
        let (mut screen, _channel) = offline_screen(&platform).await;
        platform.set_reachable(true);

        screen
            .handle_event(ScreenEvent::User(UserAction::Edit("hi".to_owned())))
            .await
            .expect("edit");
        screen
            .handle_event(ScreenEvent::User(UserAction::Send))
            .await
            .expect("send");
        pump(&mut screen).await;

        assert_eq!(feed_texts(screen.state()), vec!["hi"]);
    }

    #[tokio::test]
    async fn reconnect_leaves_live_and_closed_feeds_alone() {
        let platform = platform(BackendConfig::default());
        let (mut screen, _channel) = screen(&platform).await;

        screen
            .handle_event(ScreenEvent::User(UserAction::Reconnect))
            .await
            .expect("reconnect");
        assert_eq!(platform.documents().listener_count(), 1);

        screen.deactivate();
        screen
            .handle_event(ScreenEvent::User(UserAction::Reconnect))
            .await
            .expect("reconnect");
        assert_eq!(screen.state().feed(), &FeedState::Closed);
        assert_eq!(platform.documents().listener_count(), 0);
    }
}
