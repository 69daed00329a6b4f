//! Line-oriented rendering of the chat screen.
//!
//! Each frame is the whole screen: the feed oldest first, then the
//! visible alert, any notice, and the compose prompt.

use std::io::{self, Write};

use chrono::{DateTime, Local, Utc};

use crate::domain::{
    feed::FeedState,
    message::Message,
    push::{Alert, NavigationTarget},
    screen_state::ScreenState,
};

const PROMPT_SYMBOL: &str = "> ";
const PENDING_MARKER: &str = "sending…";
const FRAME_SEPARATOR: &str = "────────────────────────────────";

pub fn render(out: &mut impl Write, state: &ScreenState) -> io::Result<()> {
    for line in build_screen_lines(state) {
        writeln!(out, "{line}")?;
    }
    write!(out, "{PROMPT_SYMBOL}{}", state.compose().text())?;
    out.flush()
}

pub fn build_screen_lines(state: &ScreenState) -> Vec<String> {
    let mut lines = vec![FRAME_SEPARATOR.to_owned()];

    match state.feed() {
        FeedState::Loading => lines.push("Loading messages...".to_owned()),
        FeedState::Active(snapshot) if snapshot.is_empty() => {
            lines.push("No messages yet".to_owned());
        }
        FeedState::Active(snapshot) => {
            lines.extend(snapshot.messages().iter().map(message_line));
        }
        FeedState::Error(error) => {
            lines.push(format!("Feed stopped: {error}  [/reconnect to retry]"));
        }
        FeedState::Closed => lines.push("Feed closed".to_owned()),
    }

    if let Some(alert) = state.visible_alert() {
        lines.push(alert_line(alert, state.queued_alerts()));
    }

    match state.navigation() {
        Some(NavigationTarget::Message(id)) => {
            let target = state
                .feed()
                .snapshot()
                .and_then(|snapshot| snapshot.get(id))
                .map_or_else(|| id.to_string(), |message| format!("{:?}", message.text));
            lines.push(format!("Opened from notification: {target}"));
        }
        Some(NavigationTarget::Feed) => lines.push("Opened from notification".to_owned()),
        None => {}
    }

    if let Some(notice) = state.notice() {
        lines.push(format!("! {notice}"));
    }

    if !state.push_enabled() {
        lines.push("(notifications off)".to_owned());
    }

    lines
}

fn message_line(message: &Message) -> String {
    let time = message
        .created_at
        .map(format_time)
        .unwrap_or_else(|| PENDING_MARKER.to_owned());
    format!("[{time}] {}", message.text)
}

fn alert_line(alert: &Alert, queued: usize) -> String {
    let mut line = if alert.title.is_empty() {
        format!("* {}", alert.body)
    } else {
        format!("* {}: {}", alert.title, alert.body)
    };
    if queued > 0 {
        line.push_str(&format!(" (+{queued} more)"));
    }
    line.push_str("  [/ack to dismiss]");
    line
}

fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::domain::{
        feed::{FeedError, FeedSnapshot},
        message::MessageId,
    };

    fn message(id: &str, text: &str, at_ms: Option<i64>) -> Message {
        Message {
            id: MessageId::new(id),
            text: text.to_owned(),
            created_at: at_ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        }
    }

    #[test]
    fn loading_feed_shows_placeholder() {
        let lines = build_screen_lines(&ScreenState::default());

        assert!(lines.iter().any(|line| line == "Loading messages..."));
    }

    #[test]
    fn messages_render_oldest_first_with_pending_last() {
        let mut state = ScreenState::default();
        state.set_feed(FeedState::Active(FeedSnapshot::from_unordered(vec![
            message("p", "pending", None),
            message("b", "second", Some(2_000)),
            message("a", "first", Some(1_000)),
        ])));

        let lines = build_screen_lines(&state);
        let texts: Vec<&str> = lines
            .iter()
            .filter(|line| line.starts_with('['))
            .filter_map(|line| line.split("] ").nth(1))
            .collect();

        assert_eq!(texts, vec!["first", "second", "pending"]);
        let pending_prefix = format!("[{PENDING_MARKER}]");
        assert!(lines.iter().any(|line| line.starts_with(&pending_prefix)));
    }

    #[test]
    fn alert_line_omits_empty_title_and_counts_queue() {
        let alert = Alert {
            title: String::new(),
            body: "hello".to_owned(),
        };

        assert_eq!(alert_line(&alert, 0), "* hello  [/ack to dismiss]");
        assert_eq!(alert_line(&alert, 2), "* hello (+2 more)  [/ack to dismiss]");
    }

    #[test]
    fn render_writes_prompt_with_compose_text() {
        let mut state = ScreenState::default();
        state.compose_mut().set_text("draft");
        let mut out = Vec::new();

        render(&mut out, &state).expect("render to buffer");

        let text = String::from_utf8(out).expect("utf8");
        assert!(text.ends_with("> draft"));
        assert!(text.contains("(notifications off)"));
    }

    #[test]
    fn navigation_names_the_message_when_feed_has_it() {
        let mut state = ScreenState::default();
        state.set_feed(FeedState::Active(FeedSnapshot::from_unordered(vec![message(
            "m1",
            "hi",
            Some(1_000),
        )])));

        state.navigate(NavigationTarget::Message(MessageId::new("m1")));
        let lines = build_screen_lines(&state);
        assert!(lines.iter().any(|line| line == "Opened from notification: \"hi\""));

        state.navigate(NavigationTarget::Message(MessageId::new("m9")));
        let lines = build_screen_lines(&state);
        assert!(lines.iter().any(|line| line == "Opened from notification: m9"));
    }

    #[test]
    fn failed_feed_offers_reconnect() {
        let mut state = ScreenState::default();
        state.set_feed(FeedState::Error(FeedError::Unavailable {
            details: "offline".to_owned(),
        }));

        let lines = build_screen_lines(&state);
        assert!(lines.iter().any(|line| {
            line.starts_with("Feed stopped") && line.ends_with("[/reconnect to retry]")
        }));
    }
}
