//! Bounded transcript of conversation turns.
//!
//! Stores user/assistant turn pairs for the current session and renders
//! the most recent ones as context for the generative fallback. The
//! transcript is session-scoped and never persisted.

/// A single conversation turn (user input + assistant reply).
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub user_input: String,
    pub assistant_reply: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

/// A conversation with ordered turns, evicting the oldest at capacity.
#[derive(Debug)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
    max_turns: usize,
}

impl Conversation {
    /// Create a new empty conversation holding at most `max_turns`.
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns: max_turns.max(1),
        }
    }

    /// Add a turn, evicting the oldest if at capacity.
    pub fn add_turn(&mut self, user_input: String, assistant_reply: String) {
        let timestamp_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        self.turns.push(ConversationTurn {
            user_input,
            assistant_reply,
            timestamp_ms,
        });

        while self.turns.len() > self.max_turns {
            self.turns.remove(0);
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Render the last `n` turns as plain text for fallback context.
    pub fn recent_context(&self, n: usize) -> String {
        let start = self.turns.len().saturating_sub(n);
        let mut out = String::new();
        for turn in &self.turns[start..] {
            out.push_str(&format!(
                "user: {}\nassistant: {}\n",
                turn.user_input, turn.assistant_reply
            ));
        }
        out
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_retrieve() {
        let mut conv = Conversation::new(10);
        conv.add_turn("hello".into(), "hi there".into());
        conv.add_turn("menu?".into(), "here it is".into());

        assert_eq!(conv.len(), 2);
        assert_eq!(conv.turns()[0].user_input, "hello");
        assert_eq!(conv.turns()[1].assistant_reply, "here it is");
    }

    #[test]
    fn eviction_at_capacity() {
        let mut conv = Conversation::new(2);
        conv.add_turn("a".into(), "1".into());
        conv.add_turn("b".into(), "2".into());
        conv.add_turn("c".into(), "3".into());

        assert_eq!(conv.len(), 2);
        assert_eq!(conv.turns()[0].user_input, "b");
    }

    #[test]
    fn recent_context_takes_the_tail() {
        let mut conv = Conversation::new(10);
        conv.add_turn("one".into(), "1".into());
        conv.add_turn("two".into(), "2".into());
        conv.add_turn("three".into(), "3".into());

        let ctx = conv.recent_context(2);
        assert!(!ctx.contains("one"));
        assert!(ctx.contains("user: two"));
        assert!(ctx.contains("assistant: 3"));
    }

    #[test]
    fn empty_conversation() {
        let conv = Conversation::default();
        assert!(conv.is_empty());
        assert_eq!(conv.recent_context(5), "");
    }
}
