//! Text accumulation for the kana board
//!
//! Committed keys are appended to a text buffer. A few keys are controls
//! rather than characters. Every edit that changes the buffer can be
//! undone in reverse order.

use tracing::debug;

/// Key that removes the last character
pub const DELETE_KEY: &str = "消す";
/// Key that appends a space
pub const SPACE_KEY: &str = "空白";
/// Key that reads the buffer aloud
pub const SPEAK_KEY: &str = "読み上げ";

/// Items laid out on the default board
pub const DEFAULT_ITEMS: [&str; 10] = [
    "あ", "い", "う", "え", "お", "、", "。", DELETE_KEY, SPACE_KEY, SPEAK_KEY,
];

/// What committing a key did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The buffer changed
    Edited,
    /// The buffer should be spoken
    Speak,
    /// Nothing happened
    Unchanged,
}

/// Text buffer with undo history
#[derive(Debug, Default)]
pub struct Composer {
    text: String,
    history: Vec<String>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    #[cfg(test)]
    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    /// Apply a committed board key
    pub fn commit(&mut self, key: &str) -> CommitOutcome {
        if key.trim().is_empty() {
            return CommitOutcome::Unchanged;
        }

        if key == SPEAK_KEY {
            return CommitOutcome::Speak;
        }

        let previous = self.text.clone();
        match key {
            DELETE_KEY => {
                self.text.pop();
            }
            SPACE_KEY => self.text.push(' '),
            _ => self.text.push_str(key),
        }

        if self.text == previous {
            return CommitOutcome::Unchanged;
        }

        debug!(key, len = self.text.chars().count(), "board text edited");
        self.history.push(previous);
        CommitOutcome::Edited
    }

    /// Restore the text before the last edit. Returns false if there was
    /// nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some(previous) => {
                self.text = previous;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_controls() {
        let mut composer = Composer::new();
        assert_eq!(composer.commit("あ"), CommitOutcome::Edited);
        assert_eq!(composer.commit("い"), CommitOutcome::Edited);
        assert_eq!(composer.commit(SPACE_KEY), CommitOutcome::Edited);
        assert_eq!(composer.text(), "あい ");

        assert_eq!(composer.commit(DELETE_KEY), CommitOutcome::Edited);
        assert_eq!(composer.commit(DELETE_KEY), CommitOutcome::Edited);
        assert_eq!(composer.text(), "あ");
    }

    #[test]
    fn test_delete_on_empty_is_unchanged() {
        let mut composer = Composer::new();
        assert_eq!(composer.commit(DELETE_KEY), CommitOutcome::Unchanged);
        assert!(!composer.can_undo());
    }

    #[test]
    fn test_speak_key_leaves_text() {
        let mut composer = Composer::new();
        composer.commit("う");
        assert_eq!(composer.commit(SPEAK_KEY), CommitOutcome::Speak);
        assert_eq!(composer.text(), "う");
    }

    #[test]
    fn test_blank_key_ignored() {
        let mut composer = Composer::new();
        assert_eq!(composer.commit(" "), CommitOutcome::Unchanged);
        assert_eq!(composer.text(), "");
    }

    #[test]
    fn test_undo_restores_in_reverse() {
        let mut composer = Composer::new();
        composer.commit("え");
        composer.commit("お");
        composer.commit(DELETE_KEY);

        assert!(composer.undo());
        assert_eq!(composer.text(), "えお");
        assert!(composer.undo());
        assert_eq!(composer.text(), "え");
        assert!(composer.undo());
        assert_eq!(composer.text(), "");
        assert!(!composer.undo());
    }
}
