//! Time-driven flush scheduling: `update` and `check` (SPEC_FULL §4.H).

const CLOCK_JUMP_THRESHOLD: i32 = 10_000;

#[derive(Debug, Default)]
pub struct FlushSchedule {
    ts_flush: u32,
    interval: u32,
    updated: bool,
}

impl FlushSchedule {
    pub fn new(interval: u32) -> Self {
        FlushSchedule { ts_flush: 0, interval, updated: false }
    }

    pub fn set_interval(&mut self, interval: u32) {
        self.interval = interval;
    }

    /// Returns `true` if a flush should run now.
    pub fn on_update(&mut self, current: u32) -> bool {
        if !self.updated {
            self.updated = true;
            self.ts_flush = current;
            return true;
        }

        let drift = crate::seq::diff(self.ts_flush, current);
        if !(-CLOCK_JUMP_THRESHOLD..=CLOCK_JUMP_THRESHOLD).contains(&drift) {
            // Clock jumped (system suspend, manual reset): resync instead of
            // flushing in a tight loop to catch up.
            self.ts_flush = current;
            return true;
        }

        if crate::seq::ge(current, self.ts_flush) {
            self.ts_flush += self.interval;
            true
        } else {
            false
        }
    }

    /// Earliest time the caller should call `update` again, given the
    /// earliest pending retransmission deadline among in-flight segments.
    pub fn check(&self, current: u32, earliest_resend: Option<u32>) -> u32 {
        if !self.updated {
            return current;
        }
        let mut next = self.ts_flush;
        if let Some(resend) = earliest_resend {
            if crate::seq::lt(resend, next) {
                next = resend;
            }
        }
        if crate::seq::le(next, current) {
            return current;
        }
        let cap = current + self.interval;
        if crate::seq::gt(next, cap) {
            cap
        } else {
            next
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_always_flushes() {
        let mut s = FlushSchedule::new(100);
        assert!(s.on_update(12345));
    }

    #[test]
    fn no_flush_before_interval_elapses() {
        let mut s = FlushSchedule::new(100);
        s.on_update(0);
        assert!(!s.on_update(50));
        assert!(s.on_update(100));
    }

    #[test]
    fn clock_jump_resyncs_instead_of_catching_up() {
        let mut s = FlushSchedule::new(100);
        s.on_update(0);
        assert!(s.on_update(50_000));
    }

    #[test]
    fn check_returns_current_when_already_due() {
        let mut s = FlushSchedule::new(100);
        s.on_update(0);
        assert_eq!(s.check(200, None), 200);
    }

    #[test]
    fn check_prefers_earlier_resend_deadline() {
        let mut s = FlushSchedule::new(100);
        s.on_update(0);
        s.on_update(0); // advances ts_flush to 100
        assert_eq!(s.check(10, Some(50)), 50);
    }

    #[test]
    fn check_before_update_returns_current() {
        let s = FlushSchedule::default();
        assert_eq!(s.check(42, None), 42);
    }
}
