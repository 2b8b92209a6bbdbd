//! The segment record and the four queues it moves through.

use std::collections::VecDeque;

use crate::codec::Command;

/// A segment, with the wire fields plus the per-segment retransmission
/// bookkeeping that never goes on the wire.
#[derive(Debug, Clone)]
pub struct Segment {
    pub cmd: Command,
    pub frg: u8,
    pub wnd: u16,
    pub ts: u32,
    pub sn: u32,
    pub una: u32,
    pub payload: Vec<u8>,

    /// Scheduled retransmission time.
    pub resend_ts: u32,
    /// Current RTO for this segment.
    pub rto: u32,
    /// How many higher-`sn` segments have been acked past this one.
    pub fastack: u32,
    /// Total number of times this segment has been sent.
    pub xmit: u32,
}

impl Segment {
    pub fn new_push(sn: u32, frg: u8, payload: Vec<u8>) -> Self {
        Segment {
            cmd: Command::Push,
            frg,
            wnd: 0,
            ts: 0,
            sn,
            una: 0,
            payload,
            resend_ts: 0,
            rto: 0,
            fastack: 0,
            xmit: 0,
        }
    }

    pub fn encoded_len(&self) -> usize {
        crate::codec::HEADER_LEN + self.payload.len()
    }
}

/// The application-facing send queue: fragments waiting to be promoted into
/// the in-flight buffer by the flush scheduler.
#[derive(Debug, Default)]
pub struct SendQueue(pub VecDeque<Segment>);

/// In-flight segments awaiting acknowledgement, ordered by `sn`.
#[derive(Debug, Default)]
pub struct SendBuffer(pub VecDeque<Segment>);

impl SendBuffer {
    /// Removes the entry with the given `sn`, if present.
    pub fn remove_acked(&mut self, sn: u32) -> bool {
        if let Some(pos) = self.0.iter().position(|s| s.sn == sn) {
            self.0.remove(pos);
            true
        } else {
            false
        }
    }

    /// Removes every entry with `sn < una`.
    pub fn remove_below(&mut self, una: u32) {
        self.0.retain(|s| !crate::seq::lt(s.sn, una));
    }

    pub fn earliest_sn(&self, fallback: u32) -> u32 {
        self.0.front().map(|s| s.sn).unwrap_or(fallback)
    }
}

/// Out-of-order receive buffer, ordered by `sn`, bounded by `rcv_wnd`.
#[derive(Debug, Default)]
pub struct RecvBuffer(pub VecDeque<Segment>);

impl RecvBuffer {
    /// Inserts `seg` at its sorted position unless its `sn` is a duplicate.
    /// Returns `false` if dropped as a duplicate.
    pub fn insert_sorted(&mut self, seg: Segment) -> bool {
        let pos = self.0.iter().position(|s| !crate::seq::lt(s.sn, seg.sn));
        match pos {
            Some(i) if self.0[i].sn == seg.sn => false,
            Some(i) => {
                self.0.insert(i, seg);
                true
            }
            None => {
                self.0.push_back(seg);
                true
            }
        }
    }
}

/// In-order segments ready for the application to read via `recv`.
#[derive(Debug, Default)]
pub struct RecvQueue(pub VecDeque<Segment>);
