use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Allocates identifiers for sessions and persisted records
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, prefix: &str) -> String;
}

/// Random 64-bit hex ids, e.g. `session-3f9c0a1b2c3d4e5f`
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        let value: u64 = rand::thread_rng().gen();
        format!("{prefix}-{value:016x}")
    }
}

/// Counter-based ids, e.g. `record-1`, `record-2`
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{prefix}-{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_are_deterministic() {
        let ids = SequentialIdGenerator::new();
        assert_eq!(ids.next_id("session"), "session-1");
        assert_eq!(ids.next_id("record"), "record-2");
    }

    #[test]
    fn random_ids_carry_prefix_and_differ() {
        let ids = RandomIdGenerator;
        let a = ids.next_id("record");
        let b = ids.next_id("record");
        assert!(a.starts_with("record-"));
        assert_eq!(a.len(), "record-".len() + 16);
        assert_ne!(a, b);
    }
}
