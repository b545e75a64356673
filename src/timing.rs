//! Running-time measurement for the hot paths of the polling loop.
//!
//! The registry is constructed once in `main` and handed to whoever wants to
//! record; a summary of per-name averages is logged at shutdown.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Named duration records, averaged per name.
pub struct TimingRegistry {
    records: Mutex<BTreeMap<&'static str, (Duration, u64)>>,
}

impl TimingRegistry {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Adds one measured span under `name`.
    pub fn record(&self, name: &'static str, span: Duration) {
        if let Ok(mut records) = self.records.lock() {
            let entry = records.entry(name).or_insert((Duration::ZERO, 0));
            entry.0 += span;
            entry.1 += 1;
        }
    }

    /// Starts a scope that records its elapsed time under `name` on drop.
    pub fn scope(&self, name: &'static str) -> TimingScope<'_> {
        TimingScope {
            registry: self,
            name,
            start: Instant::now(),
        }
    }

    /// Average duration recorded under `name`, if any.
    pub fn average(&self, name: &str) -> Option<Duration> {
        let records = self.records.lock().ok()?;
        let (total, count) = records.get(name)?;
        (*count > 0).then(|| *total / *count as u32)
    }

    /// One-line summary of all averages, for the shutdown log.
    pub fn summary(&self) -> String {
        let Ok(records) = self.records.lock() else {
            return "timing: <poisoned>".to_string();
        };
        if records.is_empty() {
            return "timing: no records".to_string();
        }
        let parts: Vec<String> = records
            .iter()
            .map(|(name, (total, count))| {
                let avg = if *count > 0 {
                    *total / *count as u32
                } else {
                    Duration::ZERO
                };
                format!("{} avg {:.1}ms x{}", name, avg.as_secs_f64() * 1000.0, count)
            })
            .collect();
        format!("timing: {}", parts.join(", "))
    }
}

/// RAII guard returned by [`TimingRegistry::scope`].
pub struct TimingScope<'a> {
    registry: &'a TimingRegistry,
    name: &'static str,
    start: Instant,
}

impl Drop for TimingScope<'_> {
    fn drop(&mut self) {
        self.registry.record(self.name, self.start.elapsed());
    }
}
