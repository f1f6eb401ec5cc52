use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// One-shot deadlines keyed by control.
///
/// Scheduling a key that is already pending replaces its deadline, so each
/// control has at most one pending revert. Nothing fires on its own: the
/// owner calls [`Timers::expire`] from its tick.
#[derive(Debug)]
pub struct Timers<K> {
    deadlines: HashMap<K, Instant>,
}

impl<K> Default for Timers<K> {
    fn default() -> Self {
        Self {
            deadlines: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> Timers<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, key: K, now: Instant, delay: Duration) {
        self.deadlines.insert(key, now + delay);
    }

    pub fn cancel(&mut self, key: &K) -> bool {
        self.deadlines.remove(key).is_some()
    }

    /// Removes and returns every key whose deadline is at or before `now`,
    /// earliest first.
    pub fn expire(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<(Instant, K)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, deadline)| (*deadline, key.clone()))
            .collect();
        due.sort_by_key(|(deadline, _)| *deadline);
        for (_, key) in &due {
            self.deadlines.remove(key);
        }
        due.into_iter().map(|(_, key)| key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_only_after_deadline() {
        let start = Instant::now();
        let mut timers = Timers::new();
        timers.schedule("copy", start, Duration::from_secs(2));
        assert!(timers.expire(start + Duration::from_millis(1999)).is_empty());
        assert_eq!(timers.expire(start + Duration::from_secs(2)), vec!["copy"]);
        assert!(timers.expire(start + Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn rescheduling_replaces_deadline() {
        let start = Instant::now();
        let mut timers = Timers::new();
        timers.schedule(1, start, Duration::from_secs(1));
        timers.schedule(1, start, Duration::from_secs(5));
        assert!(timers.expire(start + Duration::from_secs(2)).is_empty());
        assert_eq!(timers.expire(start + Duration::from_secs(5)), vec![1]);
    }

    #[test]
    fn cancelled_keys_never_fire() {
        let start = Instant::now();
        let mut timers = Timers::new();
        timers.schedule(7, start, Duration::from_secs(1));
        assert!(timers.cancel(&7));
        assert!(!timers.cancel(&7));
        assert!(timers.expire(start + Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn expired_keys_come_out_earliest_first() {
        let start = Instant::now();
        let mut timers = Timers::new();
        timers.schedule("late", start, Duration::from_secs(3));
        timers.schedule("early", start, Duration::from_secs(1));
        assert_eq!(
            timers.expire(start + Duration::from_secs(4)),
            vec!["early", "late"]
        );
    }
}
