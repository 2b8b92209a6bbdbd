//! Batches ACKs, probes, and data into MTU-bounded datagrams
//! (SPEC_FULL §4.G).

use tracing::{info, trace, warn};

use crate::ack::AckLedger;
use crate::codec::{Command, Header};
use crate::config::Config;
use crate::congestion::CongestionControl;
use crate::rtt::RttEstimator;
use crate::segment::{SendBuffer, SendQueue};
use crate::window::{Ask, ProbeState};

pub struct FlushContext<'a> {
    pub config: &'a Config,
    pub current: u32,
    pub snd_queue: &'a mut SendQueue,
    pub snd_buf: &'a mut SendBuffer,
    pub snd_nxt: &'a mut u32,
    pub snd_una: &'a mut u32,
    pub rcv_nxt: u32,
    pub rcv_queue_len: usize,
    pub rmt_wnd: u16,
    pub rtt: &'a RttEstimator,
    pub congestion: &'a mut CongestionControl,
    pub probe: &'a mut ProbeState,
    pub ack_ledger: &'a mut AckLedger,
    pub dead: &'a mut bool,
}

/// Runs one flush cycle, calling `output` with each MTU-bounded datagram
/// that has bytes in it. Does nothing if `updated` has never been set
/// (callers gate that in `timing::update`).
pub fn flush(ctx: &mut FlushContext, mut output: impl FnMut(&[u8])) {
    let mtu = ctx.config.mtu as usize;
    let mut buf: Vec<u8> = Vec::with_capacity(mtu);
    let rcv_wnd_free = (ctx.config.rcv_wnd as usize).saturating_sub(ctx.rcv_queue_len) as u16;

    let mut emit = |buf: &mut Vec<u8>, seg_bytes: usize, output: &mut dyn FnMut(&[u8])| {
        if buf.len() + seg_bytes > mtu && !buf.is_empty() {
            output(buf);
            buf.clear();
        }
    };

    // Step 1: ACKs.
    for (sn, ts) in ctx.ack_ledger.drain() {
        let header = Header {
            conv: ctx.config.conv,
            cmd: Command::Ack,
            frg: 0,
            wnd: rcv_wnd_free,
            ts,
            sn,
            una: ctx.rcv_nxt,
            len: 0,
        };
        emit(&mut buf, crate::codec::HEADER_LEN, &mut output);
        header.encode(&mut buf);
    }

    // Step 2: window probing.
    ctx.probe.on_flush(ctx.current, ctx.rmt_wnd);
    let ask = ctx.probe.take_ask();
    if ask.contains(Ask::SEND) {
        let header = Header {
            conv: ctx.config.conv,
            cmd: Command::Wask,
            frg: 0,
            wnd: rcv_wnd_free,
            ts: ctx.current,
            sn: 0,
            una: ctx.rcv_nxt,
            len: 0,
        };
        emit(&mut buf, crate::codec::HEADER_LEN, &mut output);
        header.encode(&mut buf);
    }
    if ask.contains(Ask::TELL) {
        let header = Header {
            conv: ctx.config.conv,
            cmd: Command::Wins,
            frg: 0,
            wnd: rcv_wnd_free,
            ts: ctx.current,
            sn: 0,
            una: ctx.rcv_nxt,
            len: 0,
        };
        emit(&mut buf, crate::codec::HEADER_LEN, &mut output);
        header.encode(&mut buf);
    }

    // Step 3: effective window.
    let cwnd_eff = ctx.congestion.effective_window(ctx.config.snd_wnd as u32, ctx.rmt_wnd as u32);

    // Step 4: promote snd_queue -> snd_buf.
    while (*ctx.snd_nxt).wrapping_sub(*ctx.snd_una) < cwnd_eff {
        let Some(mut seg) = ctx.snd_queue.0.pop_front() else { break };
        seg.wnd = rcv_wnd_free;
        seg.ts = ctx.current;
        seg.sn = *ctx.snd_nxt;
        seg.una = ctx.rcv_nxt;
        seg.resend_ts = ctx.current;
        seg.rto = ctx.rtt.rto();
        seg.fastack = 0;
        seg.xmit = 0;
        *ctx.snd_nxt = ctx.snd_nxt.wrapping_add(1);
        ctx.snd_buf.0.push_back(seg);
    }

    // Step 5: transmission policy.
    let rtomin = if ctx.config.nodelay == crate::config::Nodelay::Normal { ctx.rtt.rto() / 8 } else { 0 };
    let fastresend = ctx.config.fastresend.map(|n| n.get());
    let mut change = 0u32;
    let mut lost = false;

    for seg in ctx.snd_buf.0.iter_mut() {
        let mut send_now = false;
        if seg.xmit == 0 {
            send_now = true;
            seg.rto = ctx.rtt.rto();
            seg.resend_ts = ctx.current + seg.rto + rtomin;
        } else if crate::seq::ge(ctx.current, seg.resend_ts) {
            send_now = true;
            seg.rto = match ctx.config.nodelay {
                crate::config::Nodelay::Normal => seg.rto + seg.rto.max(ctx.rtt.rto()),
                crate::config::Nodelay::Fast => seg.rto + seg.rto / 2,
                crate::config::Nodelay::Aggressive => seg.rto + ctx.rtt.rto() / 2,
            };
            seg.resend_ts = ctx.current + seg.rto;
            lost = true;
            trace!(sn = seg.sn, xmit = seg.xmit, rto = seg.rto, "timeout retransmit");
        } else if let Some(resend) = fastresend {
            if seg.fastack >= resend && (seg.xmit <= ctx.config.fastlimit || ctx.config.fastlimit == 0) {
                send_now = true;
                seg.fastack = 0;
                seg.resend_ts = ctx.current + seg.rto;
                change += 1;
                trace!(sn = seg.sn, "fast retransmit");
            }
        }

        if send_now {
            seg.ts = ctx.current;
            seg.wnd = rcv_wnd_free;
            seg.una = ctx.rcv_nxt;
            seg.xmit += 1;
            let header = Header {
                conv: ctx.config.conv,
                cmd: seg.cmd,
                frg: seg.frg,
                wnd: seg.wnd,
                ts: seg.ts,
                sn: seg.sn,
                una: seg.una,
                len: seg.payload.len() as u32,
            };
            emit(&mut buf, crate::codec::HEADER_LEN + seg.payload.len(), &mut output);
            header.encode(&mut buf);
            buf.extend_from_slice(&seg.payload);

            if seg.xmit >= ctx.config.dead_link {
                warn!(sn = seg.sn, xmit = seg.xmit, "dead link detected");
                *ctx.dead = true;
            }
        }
    }

    // Step 6: emit tail.
    if !buf.is_empty() {
        output(&buf);
    }

    // Step 7: congestion update.
    if change > 0 {
        let inflight = (*ctx.snd_nxt).wrapping_sub(*ctx.snd_una);
        let extra = fastresend.unwrap_or(0);
        ctx.congestion.on_fast_resend(inflight, ctx.config.mss() as u32, extra);
        info!(cwnd = ctx.congestion.cwnd, ssthresh = ctx.congestion.ssthresh, "fast-retransmit congestion event");
    }
    if lost {
        ctx.congestion.on_timeout_loss(cwnd_eff, ctx.config.mss() as u32);
        info!(cwnd = ctx.congestion.cwnd, ssthresh = ctx.congestion.ssthresh, "timeout-loss congestion event");
    }
    ctx.congestion.clamp_floor();

    *ctx.snd_una = ctx.snd_buf.earliest_sn(*ctx.snd_nxt);
}
