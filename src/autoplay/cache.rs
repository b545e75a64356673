//! Time-gated deduplication caches.
//!
//! Both policies answer the same question: is this recognized value actually
//! new, and is a previously computed answer still safe to apply? A stored
//! value goes stale either when it changes or when the expiry elapses,
//! whichever comes first; expiry forces periodic re-acceptance so a silently
//! failed draw is eventually retried.

use std::time::{Duration, Instant};

/// Single-slot change-or-expire gate.
pub struct TimeGateCache<T: PartialEq> {
    value: Option<T>,
    created_at: Instant,
    expire: Duration,
}

impl<T: PartialEq> TimeGateCache<T> {
    pub fn new(expire: Duration) -> Self {
        Self {
            value: None,
            created_at: Instant::now(),
            expire,
        }
    }

    /// Accepts `value` when it differs from the stored one, nothing is
    /// stored yet, or the stored entry has expired. On acceptance the value
    /// and timestamp reset; otherwise the entry is left untouched.
    pub fn update(&mut self, value: T) -> bool {
        let changed = self.value.as_ref() != Some(&value);
        let expired = self.created_at.elapsed() >= self.expire;
        if changed || expired {
            self.value = Some(value);
            self.created_at = Instant::now();
            true
        } else {
            false
        }
    }
}

/// Two-slot this/next queue with an explicit pop.
///
/// `update` re-arms the queue only when the comparison key of the incoming
/// "this" differs from the stored key or the entry has expired; an unchanged
/// key leaves an already-popped slot empty so the same question is not
/// answered twice. `pop` never promotes "next" by itself.
pub struct LookaheadCache<T> {
    this: Option<T>,
    next: Option<T>,
    key: Option<String>,
    created_at: Instant,
    expire: Duration,
    extract_key: fn(&T) -> String,
}

impl<T> LookaheadCache<T> {
    pub fn new(expire: Duration, extract_key: fn(&T) -> String) -> Self {
        Self {
            this: None,
            next: None,
            key: None,
            created_at: Instant::now(),
            expire,
            extract_key,
        }
    }

    /// Stores the pair, returning whether the entry was re-armed.
    pub fn update(&mut self, this: T, next: Option<T>) -> bool {
        let key = (self.extract_key)(&this);
        if self.key.as_deref() == Some(key.as_str()) && !self.is_expired() {
            return false;
        }
        self.this = Some(this);
        self.next = next;
        self.key = Some(key);
        self.created_at = Instant::now();
        true
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.expire
    }

    /// Removes and returns the current "this" pair, once.
    pub fn pop(&mut self) -> Option<T> {
        self.this.take()
    }

    /// The stored look-ahead pair, for status display.
    pub fn peek_next(&self) -> Option<&T> {
        self.next.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    const LONG: Duration = Duration::from_secs(60);
    const SHORT: Duration = Duration::from_millis(20);

    #[test]
    fn test_single_slot_accepts_first_value() {
        let mut cache = TimeGateCache::new(LONG);
        assert!(cache.update("3A5E"));
    }

    #[test]
    fn test_single_slot_suppresses_unchanged_value() {
        let mut cache = TimeGateCache::new(LONG);
        assert!(cache.update("3A5E"));
        assert!(!cache.update("3A5E"));
        assert!(cache.update("7U3"));
        assert!(!cache.update("7U3"));
    }

    #[test]
    fn test_single_slot_reaccepts_after_expiry() {
        let mut cache = TimeGateCache::new(SHORT);
        assert!(cache.update("3A5E"));
        assert!(!cache.update("3A5E"));
        sleep(SHORT + Duration::from_millis(5));
        assert!(cache.update("3A5E"));
    }

    fn key_of(pair: &(String, String)) -> String {
        pair.0.clone()
    }

    fn pair(q: &str, a: &str) -> (String, String) {
        (q.to_string(), a.to_string())
    }

    #[test]
    fn test_queue_pop_returns_this_once() {
        let mut cache = LookaheadCache::new(LONG, key_of);
        assert!(cache.update(pair("3A5E", "8"), Some(pair("7U3", ">"))));
        assert_eq!(cache.pop(), Some(pair("3A5E", "8")));
        assert_eq!(cache.pop(), None);
        assert_eq!(cache.peek_next(), Some(&pair("7U3", ">")));
    }

    #[test]
    fn test_queue_unchanged_key_does_not_rearm() {
        let mut cache = LookaheadCache::new(LONG, key_of);
        cache.update(pair("3A5E", "8"), None);
        assert_eq!(cache.pop(), Some(pair("3A5E", "8")));
        // Same question still on screen: the popped slot stays empty.
        assert!(!cache.update(pair("3A5E", "8"), None));
        assert_eq!(cache.pop(), None);
    }

    #[test]
    fn test_queue_new_key_rearms() {
        let mut cache = LookaheadCache::new(LONG, key_of);
        cache.update(pair("3A5E", "8"), None);
        cache.pop();
        assert!(cache.update(pair("7U3", ">"), None));
        assert_eq!(cache.pop(), Some(pair("7U3", ">")));
    }

    #[test]
    fn test_queue_expiry_rearms_same_key() {
        let mut cache = LookaheadCache::new(SHORT, key_of);
        cache.update(pair("3A5E", "8"), None);
        cache.pop();
        sleep(SHORT + Duration::from_millis(5));
        assert!(cache.is_expired());
        assert!(cache.update(pair("3A5E", "8"), None));
        assert_eq!(cache.pop(), Some(pair("3A5E", "8")));
    }
}
