//! Parses an incoming datagram of back-to-back segments (SPEC_FULL §4.F).

use bytes::Buf;
use tracing::trace;

use crate::ack::AckWatermark;
use crate::codec::{Command, Header};
use crate::config::Config;
use crate::congestion::CongestionControl;
use crate::error::InputError;
use crate::rtt::RttEstimator;
use crate::segment::{RecvBuffer, Segment, SendBuffer};
use crate::window::ProbeState;

/// Everything `input` needs to mutate, borrowed together so the parser can
/// stay a free function instead of a method with a dozen `&mut` params.
pub struct InputContext<'a> {
    pub config: &'a Config,
    pub current: u32,
    pub snd_buf: &'a mut SendBuffer,
    pub rcv_buf: &'a mut RecvBuffer,
    pub rcv_nxt: &'a mut u32,
    pub rmt_wnd: &'a mut u16,
    pub rtt: &'a mut RttEstimator,
    pub congestion: &'a mut CongestionControl,
    pub probe: &'a mut ProbeState,
    pub ack_ledger: &'a mut crate::ack::AckLedger,
}

/// Parses and applies every segment in `data`. Mirrors the original `-1`
/// (header/conv), `-2` (truncated/oversized payload), `-3` (unknown
/// command) contract through [`InputError::code`].
pub fn input(ctx: &mut InputContext, mut data: &[u8]) -> Result<(), InputError> {
    if data.len() < crate::codec::HEADER_LEN {
        return Err(InputError::HeaderTooShort);
    }

    let mut watermark = AckWatermark::default();
    let mut progressed = false;

    while data.remaining() >= crate::codec::HEADER_LEN {
        let mut cursor = data;
        let header = Header::decode(&mut cursor)?;
        if header.conv != ctx.config.conv {
            return Err(InputError::ConversationMismatch { expected: ctx.config.conv, got: header.conv });
        }
        if header.len > ctx.config.mtu as u32 {
            return Err(InputError::PayloadExceedsMtu { len: header.len, mtu: ctx.config.mtu as u32 });
        }
        if cursor.remaining() < header.len as usize {
            return Err(InputError::PayloadTruncated);
        }
        let payload = cursor[..header.len as usize].to_vec();
        cursor.advance(header.len as usize);
        data = cursor;

        *ctx.rmt_wnd = header.wnd;
        let before = ctx.snd_buf.0.len();
        ctx.snd_buf.remove_below(header.una);
        if ctx.snd_buf.0.len() != before {
            progressed = true;
        }

        match header.cmd {
            Command::Ack => {
                if crate::seq::ge(ctx.current, header.ts) {
                    let rtt = crate::seq::diff(header.ts, ctx.current);
                    ctx.rtt.update(rtt);
                }
                if ctx.snd_buf.remove_acked(header.sn) {
                    progressed = true;
                    watermark.observe(header.sn, header.ts);
                }
            }
            Command::Push => {
                if crate::seq::lt(header.sn, ctx.rcv_nxt.wrapping_add(ctx.config.rcv_wnd as u32)) {
                    ctx.ack_ledger.push(header.sn, header.ts);
                    if crate::seq::ge(header.sn, *ctx.rcv_nxt) {
                        let mut seg = Segment::new_push(header.sn, header.frg, payload);
                        seg.wnd = header.wnd;
                        seg.ts = header.ts;
                        seg.una = header.una;
                        ctx.rcv_buf.insert_sorted(seg);
                    }
                }
            }
            Command::Wask => {
                ctx.probe.on_wask_received();
            }
            Command::Wins => {
                trace!(wnd = header.wnd, "peer window advertisement");
            }
        }
    }

    watermark.apply_fastack(ctx.snd_buf);

    if progressed {
        ctx.congestion.on_progress(ctx.config.mss() as u32, *ctx.rmt_wnd as u32);
    }

    Ok(())
}

/// Migrates the longest contiguous run starting at `rcv_nxt` from `rcv_buf`
/// into `rcv_queue`, bounded by `rcv_wnd`. Returns how many were moved.
pub fn promote_ready(
    rcv_buf: &mut RecvBuffer,
    rcv_queue: &mut crate::segment::RecvQueue,
    rcv_nxt: &mut u32,
    rcv_wnd: u16,
) -> usize {
    let mut moved = 0;
    while rcv_queue.0.len() < rcv_wnd as usize {
        match rcv_buf.0.front() {
            Some(seg) if seg.sn == *rcv_nxt => {
                let seg = rcv_buf.0.pop_front().unwrap();
                *rcv_nxt = rcv_nxt.wrapping_add(1);
                rcv_queue.0.push_back(seg);
                moved += 1;
            }
            _ => break,
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack::AckLedger;
    use crate::codec::Command as Cmd;

    fn encode(header: Header, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        header.encode(&mut buf);
        buf.extend_from_slice(payload);
        buf
    }

    fn push(sn: u32, frg: u8, payload: &[u8]) -> Vec<u8> {
        encode(
            Header { conv: 1, cmd: Cmd::Push, frg, wnd: 128, ts: 0, sn, una: 0, len: payload.len() as u32 },
            payload,
        )
    }

    fn new_ctx_parts() -> (Config, SendBuffer, RecvBuffer, u32, u16, RttEstimator, CongestionControl, ProbeState, AckLedger) {
        (
            Config::new(1),
            SendBuffer::default(),
            RecvBuffer::default(),
            0,
            0,
            RttEstimator::new(crate::config::Nodelay::Normal, 100),
            CongestionControl::new(false),
            ProbeState::new(),
            AckLedger::default(),
        )
    }

    #[test]
    fn rejects_conv_mismatch() {
        let (config, mut snd_buf, mut rcv_buf, mut rcv_nxt, mut rmt_wnd, mut rtt, mut cc, mut probe, mut ledger) =
            new_ctx_parts();
        let mut ctx = InputContext {
            config: &config,
            current: 0,
            snd_buf: &mut snd_buf,
            rcv_buf: &mut rcv_buf,
            rcv_nxt: &mut rcv_nxt,
            rmt_wnd: &mut rmt_wnd,
            rtt: &mut rtt,
            congestion: &mut cc,
            probe: &mut probe,
            ack_ledger: &mut ledger,
        };
        let bad = encode(
            Header { conv: 99, cmd: Cmd::Ack, frg: 0, wnd: 1, ts: 0, sn: 0, una: 0, len: 0 },
            &[],
        );
        assert!(matches!(input(&mut ctx, &bad), Err(InputError::ConversationMismatch { .. })));
    }

    #[test]
    fn out_of_order_push_reassembles_in_order() {
        let (config, mut snd_buf, mut rcv_buf, mut rcv_nxt, mut rmt_wnd, mut rtt, mut cc, mut probe, mut ledger) =
            new_ctx_parts();
        let mut ctx = InputContext {
            config: &config,
            current: 0,
            snd_buf: &mut snd_buf,
            rcv_buf: &mut rcv_buf,
            rcv_nxt: &mut rcv_nxt,
            rmt_wnd: &mut rmt_wnd,
            rtt: &mut rtt,
            congestion: &mut cc,
            probe: &mut probe,
            ack_ledger: &mut ledger,
        };
        let mut data = push(2, 0, b"CCC");
        data.extend(push(0, 2, b"AAA"));
        data.extend(push(1, 1, b"BBB"));
        input(&mut ctx, &data).unwrap();

        assert_eq!(rcv_buf.0.len(), 3);
        let mut rcv_queue = crate::segment::RecvQueue::default();
        let moved = promote_ready(&mut rcv_buf, &mut rcv_queue, &mut rcv_nxt, 128);
        assert_eq!(moved, 3);
        assert_eq!(rcv_nxt, 3);
        let bytes: Vec<u8> = rcv_queue.0.iter().flat_map(|s| s.payload.clone()).collect();
        assert_eq!(bytes, b"AAABBBCCC");
    }

    #[test]
    fn duplicate_push_is_dropped() {
        let (config, mut snd_buf, mut rcv_buf, mut rcv_nxt, mut rmt_wnd, mut rtt, mut cc, mut probe, mut ledger) =
            new_ctx_parts();
        let mut ctx = InputContext {
            config: &config,
            current: 0,
            snd_buf: &mut snd_buf,
            rcv_buf: &mut rcv_buf,
            rcv_nxt: &mut rcv_nxt,
            rmt_wnd: &mut rmt_wnd,
            rtt: &mut rtt,
            congestion: &mut cc,
            probe: &mut probe,
            ack_ledger: &mut ledger,
        };
        let mut data = push(0, 0, b"A");
        data.extend(push(0, 0, b"A"));
        input(&mut ctx, &data).unwrap();
        assert_eq!(rcv_buf.0.len(), 1);
    }
}
