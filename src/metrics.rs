use crate::keyboard::{finger_for, FingerUsage};
use crate::matcher::{KeyAction, TypingEvent};
use crate::util::{mean, std_dev};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MS_PER_MINUTE: f64 = 60_000.0;
const CHARS_PER_WORD: f64 = 5.0;

/// Rate and accuracy figures for a finished run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub wpm: u32,
    pub cpm: u32,
    pub accuracy: u32,
    pub error_rate: f64,
}

pub fn calculate(correct_count: usize, error_count: usize, elapsed_ms: u64) -> Metrics {
    let minutes = elapsed_ms.max(1) as f64 / MS_PER_MINUTE;
    let correct = correct_count as f64;
    let attempts = (correct_count + error_count).max(1) as f64;

    let accuracy = (100.0 * correct / attempts).round() as u32;

    Metrics {
        wpm: ((correct / CHARS_PER_WORD) / minutes).round() as u32,
        cpm: (correct / minutes).round() as u32,
        accuracy,
        error_rate: 1.0 - f64::from(accuracy) / 100.0,
    }
}

/// Thresholds turning wpm and accuracy into a 0-5 star rating.
///
/// Every accuracy step and every speed step that is not reached costs one
/// star. Speed steps are fractions of `target_wpm`. Missing more steps than
/// there are stars bottoms out at zero, so the rating is non-decreasing in
/// both wpm and accuracy whatever the table holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StarBands {
    pub target_wpm: u32,
    pub accuracy_steps: Vec<u32>,
    pub speed_steps: Vec<f64>,
}

pub const MAX_STARS: u8 = 5;

impl Default for StarBands {
    fn default() -> Self {
        Self {
            target_wpm: 40,
            accuracy_steps: vec![98, 95, 90, 85, 80],
            speed_steps: vec![1.0, 0.8, 0.6, 0.4, 0.2],
        }
    }
}

impl StarBands {
    pub fn with_target(target_wpm: u32) -> Self {
        Self {
            target_wpm,
            ..Self::default()
        }
    }

    pub fn rate(&self, wpm: u32, accuracy: u32) -> u8 {
        let missed_accuracy = self
            .accuracy_steps
            .iter()
            .filter(|&&step| accuracy < step)
            .count();
        let target = f64::from(self.target_wpm);
        let missed_speed = self
            .speed_steps
            .iter()
            .filter(|&&step| f64::from(wpm) < step * target)
            .count();

        let missed = (missed_accuracy + missed_speed).min(MAX_STARS as usize) as u8;
        MAX_STARS - missed
    }
}

/// Latency profile of the keydown events in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HesitationStats {
    pub mean_latency_ms: f64,
    pub std_dev_latency_ms: f64,
    pub max_latency_ms: u64,
    /// latencies at or above the configured pause threshold
    pub pauses: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyHeat {
    pub hits: u32,
    pub misses: u32,
}

/// Compared keydowns that no backspace took back
fn compared(events: &[TypingEvent]) -> impl Iterator<Item = &TypingEvent> {
    events
        .iter()
        .filter(|e| e.action == KeyAction::KeyDown && e.is_correct.is_some() && !e.undone)
}

/// Longest run of consecutive correct keystrokes
pub fn longest_streak(events: &[TypingEvent]) -> u32 {
    let mut best = 0;
    let mut run = 0;
    for event in compared(events) {
        if event.is_correct == Some(true) {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

/// Fastest wpm over `window` consecutive correct keystrokes
pub fn burst_speed(events: &[TypingEvent], window: usize) -> Option<u32> {
    if window == 0 {
        return None;
    }

    let mut runs: Vec<Vec<u64>> = vec![Vec::new()];
    for event in compared(events) {
        if event.is_correct == Some(true) {
            if let Some(run) = runs.last_mut() {
                run.push(event.latency_ms.unwrap_or(0));
            }
        } else {
            runs.push(Vec::new());
        }
    }

    runs.iter()
        .flat_map(|run| run.windows(window))
        .map(|w| {
            let ms: u64 = w.iter().sum();
            let minutes = ms.max(1) as f64 / MS_PER_MINUTE;
            ((window as f64 / CHARS_PER_WORD) / minutes).round() as u32
        })
        .max()
}

pub fn hesitation(events: &[TypingEvent], pause_threshold_ms: u64) -> Option<HesitationStats> {
    let latencies: Vec<u64> = events
        .iter()
        .filter(|e| e.action == KeyAction::KeyDown)
        .filter_map(|e| e.latency_ms)
        .collect();
    let as_f64: Vec<f64> = latencies.iter().map(|&l| l as f64).collect();

    Some(HesitationStats {
        mean_latency_ms: mean(&as_f64)?,
        std_dev_latency_ms: std_dev(&as_f64)?,
        max_latency_ms: latencies.iter().copied().max()?,
        pauses: latencies
            .iter()
            .filter(|&&l| l >= pause_threshold_ms)
            .count() as u32,
    })
}

/// Hits and misses keyed by the character that was expected
pub fn heatmap(events: &[TypingEvent]) -> BTreeMap<String, KeyHeat> {
    let mut map: BTreeMap<String, KeyHeat> = BTreeMap::new();
    for event in compared(events) {
        let Some(expected) = event.expected else {
            continue;
        };
        let heat = map.entry(expected.to_string()).or_default();
        if event.is_correct == Some(true) {
            heat.hits += 1;
        } else {
            heat.misses += 1;
        }
    }
    map
}

pub fn finger_usage(events: &[TypingEvent]) -> FingerUsage {
    let mut usage = FingerUsage::default();
    for finger in compared(events).filter_map(|e| e.typed.and_then(finger_for)) {
        usage.record(finger);
    }
    usage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{InputMatcher, MatchPolicy};

    fn keydown(key: &str, correct: bool, latency: u64, expected: char) -> TypingEvent {
        TypingEvent {
            timestamp: 0,
            key: key.to_string(),
            action: KeyAction::KeyDown,
            is_correct: Some(correct),
            latency_ms: Some(latency),
            cursor_index: None,
            expected: Some(expected),
            typed: key.chars().next(),
            undone: false,
        }
    }

    #[test]
    fn test_three_correct_in_three_seconds() {
        let m = calculate(3, 0, 3_000);
        assert_eq!(m.wpm, 12);
        assert_eq!(m.cpm, 60);
        assert_eq!(m.accuracy, 100);
        assert_eq!(m.error_rate, 0.0);
    }

    #[test]
    fn test_one_miss_in_four() {
        let m = calculate(3, 1, 4_000);
        assert_eq!(m.accuracy, 75);
        assert!((m.error_rate - 0.25).abs() < 1e-9);
        assert_eq!(m.wpm, 9);
    }

    #[test]
    fn test_zero_elapsed_and_zero_input() {
        let m = calculate(0, 0, 0);
        assert_eq!(m.wpm, 0);
        assert_eq!(m.accuracy, 0);
        let m = calculate(5, 0, 0);
        assert_eq!(m.wpm, 60_000);
    }

    #[test]
    fn test_accuracy_bounds() {
        for correct in 0..20 {
            for errors in 0..20 {
                let m = calculate(correct, errors, 1_000);
                assert!(m.accuracy <= 100);
                assert!((0.0..=1.0).contains(&m.error_rate));
            }
        }
    }

    #[test]
    fn test_star_bands() {
        let bands = StarBands::with_target(40);
        assert_eq!(bands.rate(45, 99), 5);
        assert_eq!(bands.rate(40, 95), 4);
        assert_eq!(bands.rate(33, 95), 3);
        assert_eq!(bands.rate(31, 95), 2);
        assert_eq!(bands.rate(5, 70), 0);
        assert_eq!(bands.rate(0, 0), 0);
    }

    #[test]
    fn test_star_rating_is_monotonic() {
        let bands = StarBands::default();
        for wpm in (0..80).step_by(3) {
            for accuracy in (0..=100).step_by(4) {
                let stars = bands.rate(wpm, accuracy);
                assert!(stars <= MAX_STARS);
                assert!(bands.rate(wpm + 3, accuracy) >= stars);
                assert!(bands.rate(wpm, (accuracy + 4).min(100)) >= stars);
            }
        }
    }

    #[test]
    fn test_zero_target_only_grades_accuracy() {
        let bands = StarBands::with_target(0);
        assert_eq!(bands.rate(0, 100), 5);
        assert_eq!(bands.rate(0, 91), 3);
    }

    #[test]
    fn test_streak() {
        let events = vec![
            keydown("a", true, 100, 'a'),
            keydown("b", true, 100, 'b'),
            keydown("x", false, 100, 'c'),
            keydown("c", true, 100, 'c'),
            keydown("d", true, 100, 'd'),
            keydown("e", true, 100, 'e'),
        ];
        assert_eq!(longest_streak(&events), 3);
        assert_eq!(longest_streak(&[]), 0);
    }

    #[test]
    fn test_burst_speed() {
        let mut events: Vec<TypingEvent> = "aaaaa"
            .chars()
            .map(|c| keydown("a", true, 200, c))
            .collect();
        events.push(keydown("x", false, 50, 'b'));
        events.extend("bbbbb".chars().map(|c| keydown("b", true, 100, c)));

        // five chars in 500ms
        assert_eq!(burst_speed(&events, 5), Some(120));
        assert_eq!(burst_speed(&events, 6), None);
        assert_eq!(burst_speed(&events, 0), None);
    }

    #[test]
    fn test_hesitation() {
        let events = vec![
            keydown("a", true, 100, 'a'),
            keydown("b", true, 300, 'b'),
            keydown("c", true, 1_400, 'c'),
        ];
        let h = hesitation(&events, 1_000).unwrap();
        assert_eq!(h.mean_latency_ms, 600.0);
        assert_eq!(h.max_latency_ms, 1_400);
        assert_eq!(h.pauses, 1);
        assert!(hesitation(&[], 1_000).is_none());
    }

    #[test]
    fn test_heatmap_and_fingers() {
        let events = vec![
            keydown("a", true, 100, 'a'),
            keydown("s", false, 100, 'a'),
            keydown("a", true, 100, 'a'),
            keydown(" ", true, 100, ' '),
        ];
        let map = heatmap(&events);
        assert_eq!(map["a"], KeyHeat { hits: 2, misses: 1 });
        assert_eq!(map[" "], KeyHeat { hits: 1, misses: 0 });

        let usage = finger_usage(&events);
        assert_eq!(usage.left_pinky, 2);
        assert_eq!(usage.left_ring, 1);
        assert_eq!(usage.thumb, 1);
    }

    #[test]
    fn test_named_keys_count_towards_fingers() {
        let mut m = InputMatcher::new("a a", MatchPolicy::default(), 0);
        for (i, key) in ["a", "Space", "a"].iter().enumerate() {
            m.feed(key, (i as i64 + 1) * 100);
        }
        let usage = finger_usage(m.events());
        assert_eq!(usage.left_pinky, 2);
        assert_eq!(usage.thumb, 1);
        assert_eq!(usage.total(), 3);
    }

    #[test]
    fn test_undone_keystrokes_leave_the_summary_stats() {
        let mut m = InputMatcher::new("ab", MatchPolicy::default(), 0);
        let keys = [
            "a", "Backspace", "a", "Backspace", "a", "Backspace", "x", "Backspace", "a", "b",
        ];
        for (i, key) in keys.iter().enumerate() {
            m.feed(key, (i as i64 + 1) * 100);
        }
        assert_eq!(m.correct_count(), 2);
        assert_eq!(m.error_count(), 0);

        let events = m.events();
        assert_eq!(longest_streak(events), 2);
        let map = heatmap(events);
        assert_eq!(map["a"], KeyHeat { hits: 1, misses: 0 });
        assert_eq!(map["b"], KeyHeat { hits: 1, misses: 0 });
        assert_eq!(finger_usage(events).total(), 2);
    }
}
