//! Try-lock guard allowing at most one drain at a time.
//!
//! Contenders are turned away rather than queued: a trigger that arrives
//! while a drain runs is simply dropped.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the flight if nobody holds it. Never blocks.
    pub fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { busy: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Holds the flight; releases it on drop, including during unwinding.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_rejected_until_release() {
        let flight = SingleFlight::new();

        let guard = flight.try_acquire().expect("first acquire");
        assert!(flight.is_busy());
        assert!(flight.try_acquire().is_none());

        drop(guard);
        assert!(!flight.is_busy());
        assert!(flight.try_acquire().is_some());
    }

    #[test]
    fn released_when_holder_panics() {
        let flight = SingleFlight::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = flight.try_acquire().expect("acquire");
            panic!("drain blew up");
        }));
        assert!(result.is_err());
        assert!(!flight.is_busy());
    }
}
