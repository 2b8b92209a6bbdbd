//! Little-endian wire codec for the 24-byte segment header.
//!
//! ```text
//! +0  u32 conv
//! +4  u8  cmd
//! +5  u8  frg
//! +6  u16 wnd
//! +8  u32 ts
//! +12 u32 sn
//! +16 u32 una
//! +20 u32 len
//! +24 payload[len]
//! ```

use bytes::{Buf, BufMut};

use crate::error::InputError;

pub const HEADER_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Push = 81,
    Ack = 82,
    Wask = 83,
    Wins = 84,
}

impl Command {
    pub fn from_u8(v: u8) -> Result<Self, InputError> {
        match v {
            81 => Ok(Command::Push),
            82 => Ok(Command::Ack),
            83 => Ok(Command::Wask),
            84 => Ok(Command::Wins),
            other => Err(InputError::UnknownCommand(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub conv: u32,
    pub cmd: Command,
    pub frg: u8,
    pub wnd: u16,
    pub ts: u32,
    pub sn: u32,
    pub una: u32,
    pub len: u32,
}

impl Header {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.conv);
        buf.put_u8(self.cmd as u8);
        buf.put_u8(self.frg);
        buf.put_u16_le(self.wnd);
        buf.put_u32_le(self.ts);
        buf.put_u32_le(self.sn);
        buf.put_u32_le(self.una);
        buf.put_u32_le(self.len);
    }

    /// Decodes a header from the front of `buf` without consuming the
    /// payload bytes. Returns an error without advancing `buf` if the
    /// remaining bytes don't hold a full header.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, InputError> {
        if buf.remaining() < HEADER_LEN {
            return Err(InputError::HeaderTooShort);
        }
        let conv = buf.get_u32_le();
        let cmd = Command::from_u8(buf.get_u8())?;
        let frg = buf.get_u8();
        let wnd = buf.get_u16_le();
        let ts = buf.get_u32_le();
        let sn = buf.get_u32_le();
        let una = buf.get_u32_le();
        let len = buf.get_u32_le();
        Ok(Header { conv, cmd, frg, wnd, ts, sn, una, len })
    }
}

/// Reads the `conv` field out of the first 4 bytes of a datagram, used to
/// demultiplex incoming datagrams onto the right instance.
pub fn peek_conv(buf: &[u8]) -> Option<u32> {
    if buf.len() < 4 {
        return None;
    }
    Some(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
}
