use crate::clock::elapsed_ms;
use serde::{Deserialize, Serialize};

/// What a recorded event represents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KeyAction {
    KeyDown,
    KeyUp,
    AutoScroll,
}

/// One entry of the session's event log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub timestamp: i64,
    pub key: String,
    pub action: KeyAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<char>,
    /// the character the key produced, for named keys such as "Space"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typed: Option<char>,
    /// set once a later backspace took this keystroke back
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub undone: bool,
}

/// Key names as delivered by hosts, normalised
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keystroke {
    Char(char),
    Backspace,
    /// Modifiers, arrows and anything else that does not type text
    Ignored,
}

impl Keystroke {
    pub fn parse(key: &str) -> Self {
        match key {
            "Backspace" => Keystroke::Backspace,
            "Space" | "Spacebar" => Keystroke::Char(' '),
            "Enter" => Keystroke::Char('\n'),
            "Tab" => Keystroke::Char('\t'),
            _ => {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Keystroke::Char(c),
                    _ => Keystroke::Ignored,
                }
            }
        }
    }
}

/// How the cursor reacts to a wrong key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchPolicy {
    /// after a miss, swallow further wrong keys at the same position
    pub block_on_error: bool,
    /// free typing: a miss still moves the cursor forward
    pub advance_on_error: bool,
    pub allow_backspace: bool,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            block_on_error: false,
            advance_on_error: false,
            allow_backspace: true,
        }
    }
}

/// Outcome of feeding one key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeystrokeResult {
    /// false when the key was ignored, swallowed by a block, or a disabled backspace
    pub accepted: bool,
    /// `None` for keys that were not compared against the target
    pub is_correct: Option<bool>,
    pub cursor_index: usize,
    pub completed: bool,
}

#[derive(Clone, Copy, Debug)]
struct Counted {
    correct: bool,
    advanced: bool,
    event: usize,
}

/// Compares keystrokes against a target text and keeps the counters
#[derive(Debug, Clone)]
pub struct InputMatcher {
    target: Vec<char>,
    policy: MatchPolicy,
    cursor_index: usize,
    correct_count: usize,
    error_count: usize,
    characters_typed: usize,
    locked: bool,
    last_key_at: i64,
    undo: Vec<Counted>,
    events: Vec<TypingEvent>,
}

impl InputMatcher {
    pub fn new(target_text: &str, policy: MatchPolicy, started_at: i64) -> Self {
        Self {
            target: target_text.chars().collect(),
            policy,
            cursor_index: 0,
            correct_count: 0,
            error_count: 0,
            characters_typed: 0,
            locked: false,
            last_key_at: started_at,
            undo: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn target_len(&self) -> usize {
        self.target.len()
    }

    pub fn expected_char(&self) -> Option<char> {
        self.target.get(self.cursor_index).copied()
    }

    pub fn cursor_index(&self) -> usize {
        self.cursor_index
    }

    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn characters_typed(&self) -> usize {
        self.characters_typed
    }

    pub fn events(&self) -> &[TypingEvent] {
        &self.events
    }

    pub fn is_completed(&self) -> bool {
        self.cursor_index == self.target.len()
    }

    pub fn feed(&mut self, key: &str, timestamp: i64) -> KeystrokeResult {
        if self.is_completed() {
            return self.rejected();
        }

        match Keystroke::parse(key) {
            Keystroke::Char(c) => self.type_char(key, c, timestamp),
            Keystroke::Backspace => self.backspace(key, timestamp),
            Keystroke::Ignored => self.rejected(),
        }
    }

    /// Log a key release; counters are untouched
    pub fn key_up(&mut self, key: &str, timestamp: i64) {
        self.events.push(TypingEvent {
            timestamp,
            key: key.to_string(),
            action: KeyAction::KeyUp,
            is_correct: None,
            latency_ms: None,
            cursor_index: Some(self.cursor_index),
            expected: None,
            typed: None,
            undone: false,
        });
    }

    /// Log a host-driven scroll of the text view
    pub fn autoscroll(&mut self, timestamp: i64) {
        self.events.push(TypingEvent {
            timestamp,
            key: String::new(),
            action: KeyAction::AutoScroll,
            is_correct: None,
            latency_ms: None,
            cursor_index: Some(self.cursor_index),
            expected: None,
            typed: None,
            undone: false,
        });
    }

    fn type_char(&mut self, key: &str, c: char, timestamp: i64) -> KeystrokeResult {
        let Some(expected) = self.expected_char() else {
            return self.rejected();
        };
        let is_correct = c == expected;

        if !is_correct && self.locked {
            return self.rejected();
        }

        let advanced = is_correct || self.policy.advance_on_error;
        if is_correct {
            self.correct_count += 1;
            self.locked = false;
        } else {
            self.error_count += 1;
            self.locked = self.policy.block_on_error && !advanced;
        }
        self.characters_typed += 1;
        if advanced {
            self.cursor_index += 1;
        }
        self.undo.push(Counted {
            correct: is_correct,
            advanced,
            event: self.events.len(),
        });

        let latency = self.take_latency(timestamp);
        self.events.push(TypingEvent {
            timestamp,
            key: key.to_string(),
            action: KeyAction::KeyDown,
            is_correct: Some(is_correct),
            latency_ms: Some(latency),
            cursor_index: Some(self.cursor_index),
            expected: Some(expected),
            typed: Some(c),
            undone: false,
        });

        KeystrokeResult {
            accepted: true,
            is_correct: Some(is_correct),
            cursor_index: self.cursor_index,
            completed: self.is_completed(),
        }
    }

    fn backspace(&mut self, key: &str, timestamp: i64) -> KeystrokeResult {
        if !self.policy.allow_backspace {
            return self.rejected();
        }
        let Some(last) = self.undo.pop() else {
            return self.rejected();
        };

        if last.correct {
            self.correct_count -= 1;
        } else {
            self.error_count -= 1;
        }
        self.characters_typed -= 1;
        if last.advanced {
            self.cursor_index -= 1;
        }
        self.locked = false;
        if let Some(event) = self.events.get_mut(last.event) {
            event.undone = true;
        }

        let latency = self.take_latency(timestamp);
        self.events.push(TypingEvent {
            timestamp,
            key: key.to_string(),
            action: KeyAction::KeyDown,
            is_correct: None,
            latency_ms: Some(latency),
            cursor_index: Some(self.cursor_index),
            expected: None,
            typed: None,
            undone: false,
        });

        KeystrokeResult {
            accepted: true,
            is_correct: None,
            cursor_index: self.cursor_index,
            completed: false,
        }
    }

    fn take_latency(&mut self, timestamp: i64) -> u64 {
        let latency = elapsed_ms(self.last_key_at, timestamp);
        self.last_key_at = self.last_key_at.max(timestamp);
        latency
    }

    fn rejected(&self) -> KeystrokeResult {
        KeystrokeResult {
            accepted: false,
            is_correct: None,
            cursor_index: self.cursor_index,
            completed: self.is_completed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(m: &mut InputMatcher, keys: &[&str]) {
        for (i, k) in keys.iter().enumerate() {
            m.feed(k, (i as i64 + 1) * 100);
            assert_eq!(
                m.correct_count() + m.error_count(),
                m.characters_typed(),
                "counter invariant broken after {k:?}"
            );
        }
    }

    #[test]
    fn test_keystroke_parse() {
        assert_eq!(Keystroke::parse("a"), Keystroke::Char('a'));
        assert_eq!(Keystroke::parse("é"), Keystroke::Char('é'));
        assert_eq!(Keystroke::parse("Space"), Keystroke::Char(' '));
        assert_eq!(Keystroke::parse("Backspace"), Keystroke::Backspace);
        assert_eq!(Keystroke::parse("Shift"), Keystroke::Ignored);
        assert_eq!(Keystroke::parse(""), Keystroke::Ignored);
    }

    #[test]
    fn test_correct_keys_advance() {
        let mut m = InputMatcher::new("cat", MatchPolicy::default(), 0);
        let r = m.feed("c", 100);
        assert_eq!(
            r,
            KeystrokeResult {
                accepted: true,
                is_correct: Some(true),
                cursor_index: 1,
                completed: false
            }
        );
        m.feed("a", 200);
        let r = m.feed("t", 300);
        assert!(r.completed);
        assert_eq!(m.correct_count(), 3);
        assert_eq!(m.error_count(), 0);
    }

    #[test]
    fn test_miss_stays_in_place_by_default() {
        let mut m = InputMatcher::new("cat", MatchPolicy::default(), 0);
        feed_all(&mut m, &["c", "x", "a", "t"]);
        assert!(m.is_completed());
        assert_eq!(m.correct_count(), 3);
        assert_eq!(m.error_count(), 1);
        assert_eq!(m.characters_typed(), 4);
    }

    #[test]
    fn test_advance_on_error() {
        let policy = MatchPolicy {
            advance_on_error: true,
            ..MatchPolicy::default()
        };
        let mut m = InputMatcher::new("cat", policy, 0);
        feed_all(&mut m, &["c", "x", "t"]);
        assert!(m.is_completed());
        assert_eq!(m.correct_count(), 2);
        assert_eq!(m.error_count(), 1);
    }

    #[test]
    fn test_block_on_error_swallows_repeated_misses() {
        let policy = MatchPolicy {
            block_on_error: true,
            ..MatchPolicy::default()
        };
        let mut m = InputMatcher::new("ab", policy, 0);
        m.feed("x", 10);
        let r = m.feed("y", 20);
        assert!(!r.accepted);
        assert_eq!(m.error_count(), 1);
        assert_eq!(m.cursor_index(), 0);

        let r = m.feed("a", 30);
        assert_eq!(r.is_correct, Some(true));
        assert_eq!(r.cursor_index, 1);

        // lock released once corrected
        m.feed("z", 40);
        assert_eq!(m.error_count(), 2);
    }

    #[test]
    fn test_backspace_releases_block() {
        let policy = MatchPolicy {
            block_on_error: true,
            ..MatchPolicy::default()
        };
        let mut m = InputMatcher::new("ab", policy, 0);
        m.feed("x", 10);
        let r = m.feed("Backspace", 20);
        assert!(r.accepted);
        assert_eq!(m.error_count(), 0);
        assert_eq!(m.characters_typed(), 0);
        let r = m.feed("y", 30);
        assert!(r.accepted);
        assert_eq!(m.error_count(), 1);
    }

    #[test]
    fn test_backspace_reverses_last_contribution() {
        let policy = MatchPolicy {
            advance_on_error: true,
            ..MatchPolicy::default()
        };
        let mut m = InputMatcher::new("test", policy, 0);
        feed_all(&mut m, &["t", "x", "Backspace", "e", "Backspace", "Backspace"]);
        assert_eq!(m.cursor_index(), 0);
        assert_eq!(m.correct_count(), 0);
        assert_eq!(m.error_count(), 0);
        assert_eq!(m.characters_typed(), 0);
    }

    #[test]
    fn test_backspace_at_start_is_noop() {
        let mut m = InputMatcher::new("test", MatchPolicy::default(), 0);
        let r = m.feed("Backspace", 10);
        assert!(!r.accepted);
        assert_eq!(m.cursor_index(), 0);
        assert!(m.events().is_empty());
    }

    #[test]
    fn test_backspace_disabled() {
        let policy = MatchPolicy {
            allow_backspace: false,
            ..MatchPolicy::default()
        };
        let mut m = InputMatcher::new("test", policy, 0);
        m.feed("t", 10);
        let r = m.feed("Backspace", 20);
        assert!(!r.accepted);
        assert_eq!(m.cursor_index(), 1);
        assert_eq!(m.correct_count(), 1);
    }

    #[test]
    fn test_ignored_keys_leave_no_trace() {
        let mut m = InputMatcher::new("hi", MatchPolicy::default(), 0);
        let r = m.feed("Shift", 10);
        assert!(!r.accepted);
        assert_eq!(m.characters_typed(), 0);
        assert!(m.events().is_empty());
    }

    #[test]
    fn test_events_carry_latency_and_expected() {
        let mut m = InputMatcher::new("hi", MatchPolicy::default(), 1_000);
        m.feed("h", 1_150);
        m.feed("o", 1_400);
        m.key_up("o", 1_450);
        m.feed("i", 1_500);

        let events = m.events();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].latency_ms, Some(150));
        assert_eq!(events[0].expected, Some('h'));
        assert_eq!(events[1].is_correct, Some(false));
        assert_eq!(events[1].expected, Some('i'));
        assert_eq!(events[2].action, KeyAction::KeyUp);
        assert_eq!(events[3].latency_ms, Some(100));
        assert_eq!(events[3].cursor_index, Some(2));
    }

    #[test]
    fn test_backspace_marks_the_undone_keystroke() {
        let mut m = InputMatcher::new("a b", MatchPolicy::default(), 0);
        feed_all(&mut m, &["a", "x", "Backspace", "Space"]);

        let events = m.events();
        assert_eq!(events.len(), 4);
        assert!(!events[0].undone);
        assert!(events[1].undone);
        assert_eq!(events[2].typed, None);
        assert_eq!(events[3].key, "Space");
        assert_eq!(events[3].typed, Some(' '));
        assert_eq!(events[3].is_correct, Some(true));
    }

    #[test]
    fn test_input_after_completion_is_rejected() {
        let mut m = InputMatcher::new("a", MatchPolicy::default(), 0);
        assert!(m.feed("a", 10).completed);
        let r = m.feed("b", 20);
        assert!(!r.accepted);
        assert_eq!(m.characters_typed(), 1);
    }

    #[test]
    fn test_key_action_display() {
        assert_eq!(KeyAction::KeyDown.to_string(), "keydown");
        assert_eq!(KeyAction::AutoScroll.to_string(), "autoscroll");
    }
}
