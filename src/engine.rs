//! The public surface: one `Engine` per peer (SPEC_FULL §4.I).

use tracing::debug;

use crate::ack::AckLedger;
use crate::config::Config;
use crate::congestion::CongestionControl;
use crate::error::{InputError, RecvError, SendError};
use crate::flush::{self, FlushContext};
use crate::input::{self, InputContext};
use crate::rtt::RttEstimator;
use crate::segment::{RecvBuffer, RecvQueue, Segment, SendBuffer, SendQueue};
use crate::timing::FlushSchedule;
use crate::window::ProbeState;

/// A single peer's reliable-transport state. No threads, no locks: every
/// method runs to completion and the output sink (if installed) is invoked
/// synchronously from inside [`Engine::flush`].
pub struct Engine {
    config: Config,

    snd_queue: SendQueue,
    snd_buf: SendBuffer,
    rcv_buf: RecvBuffer,
    rcv_queue: RecvQueue,

    snd_nxt: u32,
    snd_una: u32,
    rcv_nxt: u32,
    rmt_wnd: u16,

    rtt: RttEstimator,
    congestion: CongestionControl,
    probe: ProbeState,
    ack_ledger: AckLedger,
    schedule: FlushSchedule,

    dead: bool,
    output: Option<Box<dyn FnMut(&[u8])>>,
    last_current: u32,
}

impl Engine {
    pub fn create(config: Config) -> Self {
        let rtt = RttEstimator::new(config.nodelay, config.interval);
        let congestion = CongestionControl::new(config.nocwnd);
        let schedule = FlushSchedule::new(config.interval);
        Engine {
            snd_queue: SendQueue::default(),
            snd_buf: SendBuffer::default(),
            rcv_buf: RecvBuffer::default(),
            rcv_queue: RecvQueue::default(),
            snd_nxt: 0,
            snd_una: 0,
            rcv_nxt: 0,
            rmt_wnd: 0,
            rtt,
            congestion,
            probe: ProbeState::new(),
            ack_ledger: AckLedger::default(),
            schedule,
            dead: false,
            output: None,
            last_current: 0,
            config,
        }
    }

    /// Installs the output sink. Called synchronously from inside `flush`;
    /// must not re-enter this engine.
    pub fn set_output(&mut self, sink: impl FnMut(&[u8]) + 'static) {
        self.output = Some(Box::new(sink));
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Splits `data` into fragments and appends them to `snd_queue`.
    pub fn send(&mut self, data: &[u8]) -> Result<(), SendError> {
        if data.is_empty() {
            return Err(SendError::EmptyData);
        }
        let mss = self.config.mss() as usize;

        let mut offset = 0;
        if self.config.stream {
            if let Some(tail) = self.snd_queue.0.back_mut() {
                if tail.payload.len() < mss {
                    let room = mss - tail.payload.len();
                    let take = room.min(data.len());
                    tail.payload.extend_from_slice(&data[..take]);
                    offset = take;
                }
            }
        }

        let remaining = data.len() - offset;
        if remaining == 0 {
            return Ok(());
        }
        let count = remaining.div_ceil(mss).max(1);
        if count >= self.config.rcv_wnd as usize {
            return Err(SendError::FragmentTooLarge { mss, len: data.len() });
        }

        for i in 0..count {
            let start = offset + i * mss;
            let end = (start + mss).min(data.len());
            let frg = if self.config.stream { 0 } else { (count - 1 - i) as u8 };
            self.snd_queue.0.push_back(Segment::new_push(0, frg, data[start..end].to_vec()));
        }
        Ok(())
    }

    /// Copies the next complete message into `out`, returning its length.
    pub fn recv(&mut self, out: &mut [u8]) -> Result<usize, RecvError> {
        let needed = match self.peeksize() {
            Some(n) => n,
            None if self.rcv_queue.0.is_empty() => return Err(RecvError::NoData),
            None => return Err(RecvError::FragmentIncomplete),
        };
        if needed > out.len() {
            return Err(RecvError::BufferTooSmall { needed, available: out.len() });
        }

        let was_full = self.rcv_queue.0.len() + self.rcv_buf.0.len() >= self.config.rcv_wnd as usize;

        let mut written = 0;
        loop {
            let seg = self.rcv_queue.0.pop_front().expect("peeksize guaranteed a complete message");
            out[written..written + seg.payload.len()].copy_from_slice(&seg.payload);
            written += seg.payload.len();
            if seg.frg == 0 {
                break;
            }
        }

        input::promote_ready(&mut self.rcv_buf, &mut self.rcv_queue, &mut self.rcv_nxt, self.config.rcv_wnd);

        if was_full {
            self.probe.on_window_reopened();
        }
        Ok(written)
    }

    /// Size of the next complete message, or `None` if it hasn't fully
    /// arrived yet (an empty queue is also `None`; use `recv`'s `NoData`
    /// vs `FragmentIncomplete` distinction to tell those apart).
    pub fn peeksize(&self) -> Option<usize> {
        let front = self.rcv_queue.0.front()?;
        if front.frg == 0 {
            return Some(front.payload.len());
        }
        let need = front.frg as usize + 1;
        if self.rcv_queue.0.len() < need {
            return None;
        }
        let mut total = 0;
        for seg in self.rcv_queue.0.iter().take(need) {
            total += seg.payload.len();
            if seg.frg == 0 {
                break;
            }
        }
        Some(total)
    }

    pub fn input(&mut self, data: &[u8]) -> Result<(), InputError> {
        let mut ctx = InputContext {
            config: &self.config,
            current: self.schedule_current(),
            snd_buf: &mut self.snd_buf,
            rcv_buf: &mut self.rcv_buf,
            rcv_nxt: &mut self.rcv_nxt,
            rmt_wnd: &mut self.rmt_wnd,
            rtt: &mut self.rtt,
            congestion: &mut self.congestion,
            probe: &mut self.probe,
            ack_ledger: &mut self.ack_ledger,
        };
        let result = input::input(&mut ctx, data);
        self.snd_una = self.snd_buf.earliest_sn(self.snd_nxt);
        input::promote_ready(&mut self.rcv_buf, &mut self.rcv_queue, &mut self.rcv_nxt, self.config.rcv_wnd);
        result
    }

    fn schedule_current(&self) -> u32 {
        self.last_current
    }

    pub fn update(&mut self, current: u32) {
        self.last_current = current;
        if self.schedule.on_update(current) {
            self.flush(current);
        }
    }

    pub fn flush(&mut self, current: u32) {
        self.last_current = current;
        let Some(mut sink) = self.output.take() else {
            debug!("flush called with no output sink installed");
            return;
        };
        {
            let mut ctx = FlushContext {
                config: &self.config,
                current,
                snd_queue: &mut self.snd_queue,
                snd_buf: &mut self.snd_buf,
                snd_nxt: &mut self.snd_nxt,
                snd_una: &mut self.snd_una,
                rcv_nxt: self.rcv_nxt,
                rcv_queue_len: self.rcv_queue.0.len(),
                rmt_wnd: self.rmt_wnd,
                rtt: &self.rtt,
                congestion: &mut self.congestion,
                probe: &mut self.probe,
                ack_ledger: &mut self.ack_ledger,
                dead: &mut self.dead,
            };
            flush::flush(&mut ctx, |bytes| sink(bytes));
        }
        self.output = Some(sink);
    }

    pub fn check(&self, current: u32) -> u32 {
        let earliest_resend = self.snd_buf.0.iter().map(|s| s.resend_ts).min();
        self.schedule.check(current, earliest_resend)
    }

    pub fn set_mtu(&mut self, mtu: u16) -> Result<(), crate::error::ConfigError> {
        self.config = self.config.clone().with_mtu(mtu)?;
        Ok(())
    }

    /// Sets non-zero window sizes only; `rcv_wnd` is floored at 128.
    pub fn wndsize(&mut self, snd_wnd: u16, rcv_wnd: u16) {
        self.config = self.config.clone().with_window(snd_wnd, rcv_wnd);
    }

    pub fn set_nodelay(&mut self, nodelay: crate::config::Nodelay, interval: u32, fastresend: u32, nocwnd: bool) {
        self.config = self
            .config
            .clone()
            .with_nodelay(nodelay)
            .with_interval(interval)
            .with_fastresend(std::num::NonZeroU32::new(fastresend))
            .with_nocwnd(nocwnd);
        self.rtt.set_nodelay(nodelay);
        self.rtt.set_interval(self.config.interval);
        self.schedule.set_interval(self.config.interval);
    }

    /// Total segments not yet delivered to the peer's application layer.
    pub fn waitsnd(&self) -> usize {
        self.snd_buf.0.len() + self.snd_queue.0.len()
    }
}
