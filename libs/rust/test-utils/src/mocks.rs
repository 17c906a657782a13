//! Recording doubles for testing.
//!
//! Plain building blocks that a test wraps in the trait it needs: an ordered
//! event log and a shared failure switch.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Ordered, shareable log of completion events.
#[derive(Debug, Clone, Default)]
pub struct ShutdownLog {
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl ShutdownLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn record(&self, event: &'static str) {
        self.events.lock().push(event);
    }

    /// Events in the order they were recorded.
    #[must_use]
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().clone()
    }

    /// Position of `event`, if recorded.
    #[must_use]
    pub fn position(&self, event: &str) -> Option<usize> {
        self.events.lock().iter().position(|e| *e == event)
    }
}

/// Shared switch that makes a double fail on demand and counts its calls.
#[derive(Debug, Clone, Default)]
pub struct FailureSwitch {
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl FailureSwitch {
    /// Create a switch in the passing state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent calls fail.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Make subsequent calls pass.
    pub fn pass(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    /// Count one call and report whether it should fail.
    pub fn hit(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failing.load(Ordering::SeqCst)
    }

    /// Number of calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_log_order() {
        let log = ShutdownLog::new();
        let clone = log.clone();
        log.record("trace");
        clone.record("metrics");
        assert_eq!(log.events(), vec!["trace", "metrics"]);
        assert_eq!(log.position("metrics"), Some(1));
    }

    #[test]
    fn test_failure_switch() {
        let switch = FailureSwitch::new();
        assert!(!switch.hit());
        switch.fail();
        assert!(switch.hit());
        switch.pass();
        assert!(!switch.hit());
        assert_eq!(switch.calls(), 3);
    }
}
