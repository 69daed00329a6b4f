//! Text-entry buffer owned by the sending side of the screen.

/// Maximum accepted buffer length in characters.
pub const MAX_COMPOSE_LENGTH: usize = 4096;

/// Mutated only by explicit user edits or a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComposeBuffer {
    text: String,
}

impl ComposeBuffer {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Replaces the buffer, truncating at the length limit.
    /// Returns false if the input had to be truncated.
    pub fn set_text(&mut self, text: &str) -> bool {
        self.text = text.chars().take(MAX_COMPOSE_LENGTH).collect();
        self.text.len() == text.len()
    }

    pub(crate) fn clear(&mut self) {
        self.text.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_empty() {
        assert!(ComposeBuffer::default().is_empty());
    }

    #[test]
    fn whitespace_is_kept_verbatim() {
        let mut buffer = ComposeBuffer::default();

        assert!(buffer.set_text("  \t "));
        assert!(!buffer.is_empty());
        assert_eq!(buffer.text(), "  \t ");
    }

    #[test]
    fn set_text_replaces_previous_contents() {
        let mut buffer = ComposeBuffer::default();
        buffer.set_text("first");
        buffer.set_text("hé");

        assert_eq!(buffer.text(), "hé");
    }

    #[test]
    fn input_beyond_limit_is_truncated_on_char_boundary() {
        let mut buffer = ComposeBuffer::default();
        let long = "é".repeat(MAX_COMPOSE_LENGTH + 10);

        assert!(!buffer.set_text(&long));
        assert_eq!(buffer.text().chars().count(), MAX_COMPOSE_LENGTH);
    }
}
