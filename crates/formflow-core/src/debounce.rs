use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Millisecond time source driving debounced expression evaluation.
pub trait Clock: fmt::Debug {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Hand-driven clock. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self(Arc::new(AtomicU64::new(start_ms)))
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.0.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// One pending evaluation per key. Scheduling a key that is already pending
/// replaces its deadline.
#[derive(Debug)]
pub struct DebounceScheduler {
    clock: Box<dyn Clock + Send + Sync>,
    pending: BTreeMap<String, u64>,
}

impl Default for DebounceScheduler {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl DebounceScheduler {
    pub fn new(clock: impl Clock + Send + Sync + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            pending: BTreeMap::new(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Schedules `key` to fire `delay_ms` from now and returns the deadline.
    pub fn schedule(&mut self, key: impl Into<String>, delay_ms: u64) -> u64 {
        let due = self.clock.now_ms().saturating_add(delay_ms);
        self.pending.insert(key.into(), due);
        due
    }

    pub fn cancel(&mut self, key: &str) -> bool {
        self.pending.remove(key).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Removes and returns every key whose deadline has passed, earliest first.
    pub fn take_due(&mut self) -> Vec<String> {
        let now = self.clock.now_ms();
        let mut due: Vec<(u64, String)> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, deadline)| (*deadline, key.clone()))
            .collect();
        due.sort();
        for (_, key) in &due {
            self.pending.remove(key);
        }
        due.into_iter().map(|(_, key)| key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reschedule_pushes_deadline_back() {
        let clock = ManualClock::new(1_000);
        let mut scheduler = DebounceScheduler::new(clock.clone());
        scheduler.schedule("total", 300);
        clock.advance(200);
        scheduler.schedule("total", 300);
        clock.advance(200);
        assert!(scheduler.take_due().is_empty());
        clock.advance(100);
        assert_eq!(scheduler.take_due(), vec!["total".to_string()]);
        assert!(!scheduler.is_pending("total"));
    }

    #[test]
    fn cancel_drops_pending_task() {
        let clock = ManualClock::new(0);
        let mut scheduler = DebounceScheduler::new(clock.clone());
        scheduler.schedule("a", 10);
        scheduler.schedule("b", 5);
        assert!(scheduler.cancel("a"));
        clock.advance(50);
        assert_eq!(scheduler.take_due(), vec!["b".to_string()]);
    }
}
