//! Flow control: advertised windows and zero-window probing
//! (SPEC_FULL §4.F step 2, §4.G step 2).

const PROBE_INIT: u32 = 7_000;
const PROBE_LIMIT: u32 = 120_000;

bitflags::bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Ask: u8 {
        const SEND = 0b01;
        const TELL = 0b10;
    }
}

/// Zero-window probe scheduling state, the WASK/WINS analogue of TCP's
/// persist timer.
#[derive(Debug, Default)]
pub struct ProbeState {
    ts_probe: u32,
    probe_wait: u32,
    pub ask: Ask,
}

impl ProbeState {
    pub fn new() -> Self {
        ProbeState { ts_probe: 0, probe_wait: 0, ask: Ask::empty() }
    }

    /// Called once per flush with the peer's last-advertised window.
    pub fn on_flush(&mut self, current: u32, rmt_wnd: u16) {
        if rmt_wnd != 0 {
            self.ts_probe = 0;
            self.probe_wait = 0;
            return;
        }
        if self.probe_wait == 0 {
            self.probe_wait = PROBE_INIT;
            self.ts_probe = current + self.probe_wait;
        } else if crate::seq::ge(current, self.ts_probe) {
            self.probe_wait += self.probe_wait / 2;
            self.probe_wait = self.probe_wait.clamp(PROBE_INIT, PROBE_LIMIT);
            self.ts_probe = current + self.probe_wait;
            self.ask.insert(Ask::SEND);
        }
    }

    pub fn on_wask_received(&mut self) {
        self.ask.insert(Ask::TELL);
    }

    /// The window re-opened and the receive queue had been at/above
    /// capacity: tell the peer right away.
    pub fn on_window_reopened(&mut self) {
        self.ask.insert(Ask::TELL);
    }

    pub fn take_ask(&mut self) -> Ask {
        std::mem::replace(&mut self.ask, Ask::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonzero_remote_window_clears_probe_schedule() {
        let mut p = ProbeState::new();
        p.probe_wait = 9000;
        p.ts_probe = 500;
        p.on_flush(100, 10);
        assert_eq!(p.probe_wait, 0);
        assert_eq!(p.ts_probe, 0);
    }

    #[test]
    fn zero_window_schedules_first_probe_at_init_backoff() {
        let mut p = ProbeState::new();
        p.on_flush(1000, 0);
        assert_eq!(p.probe_wait, PROBE_INIT);
        assert_eq!(p.ts_probe, 1000 + PROBE_INIT);
    }

    #[test]
    fn probe_backoff_grows_and_is_capped() {
        let mut p = ProbeState::new();
        p.on_flush(0, 0);
        let mut current = p.ts_probe;
        for _ in 0..30 {
            p.on_flush(current, 0);
            current = p.ts_probe;
        }
        assert!(p.probe_wait <= PROBE_LIMIT);
    }

    #[test]
    fn due_probe_sets_ask_send() {
        let mut p = ProbeState::new();
        p.on_flush(0, 0);
        let due = p.ts_probe;
        p.on_flush(due, 0);
        assert!(p.take_ask().contains(Ask::SEND));
    }
}
