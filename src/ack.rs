//! Pending-ACK ledger and the fastack pass (SPEC_FULL §4.E).

use crate::segment::SendBuffer;

/// Acks the receiver owes the peer, queued up to be flushed in a batch.
#[derive(Debug, Default)]
pub struct AckLedger {
    pending: Vec<(u32, u32)>,
}

impl AckLedger {
    pub fn push(&mut self, sn: u32, ts: u32) {
        self.pending.push((sn, ts));
    }

    pub fn drain(&mut self) -> Vec<(u32, u32)> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Tracks the single highest-`sn`/latest-`ts` ack pair seen while processing
/// one incoming datagram, used to drive the fastack pass once the whole
/// datagram has been parsed.
#[derive(Debug, Default)]
pub struct AckWatermark {
    candidate: Option<(u32, u32)>,
}

impl AckWatermark {
    pub fn observe(&mut self, sn: u32, ts: u32) {
        match self.candidate {
            Some((candidate_sn, _)) if !crate::seq::gt(sn, candidate_sn) => {}
            _ => self.candidate = Some((sn, ts)),
        }
    }

    /// Increments `fastack` on every unacked segment whose `sn` is below the
    /// watermark's `sn` and whose `ts` doesn't postdate the watermark's `ts`
    /// — the double gate that keeps reordered acks from triggering spurious
    /// fast resends.
    pub fn apply_fastack(&self, snd_buf: &mut SendBuffer) {
        let Some((maxack, latest_ts)) = self.candidate else { return };
        for seg in snd_buf.0.iter_mut() {
            if crate::seq::lt(seg.sn, maxack) && !crate::seq::gt(seg.ts, latest_ts) {
                seg.fastack += 1;
            }
        }
    }
}
