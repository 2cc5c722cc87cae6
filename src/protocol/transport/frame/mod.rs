//! SkyCooker link framing.
//!
//! ```text
//! ┌──────┬─────┬────────┬──────────────┬──────┐
//! │ 0x55 │ seq │ opcode │ payload ...  │ 0xAA │
//! └──────┴─────┴────────┴──────────────┴──────┘
//! ```
//!
//! `seq` is a wrapping per-session counter echoed back by the appliance. It
//! lets the engine tell the answer to the outstanding write from a late
//! answer to an earlier one.
use crate::core::{FrameBytes, FRAME_OVERHEAD, MAX_FRAME_LEN, MAX_PAYLOAD_LEN};
use crate::error::FrameError;

/// First byte of every frame.
pub const FRAME_HEAD: u8 = 0x55;
/// Last byte of every frame.
pub const FRAME_TAIL: u8 = 0xAA;

/// A frame split into its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame {
    pub seq: u8,
    pub opcode: u8,
    pub payload: FrameBytes,
}

/// Build an outgoing frame.
pub fn encode(seq: u8, opcode: u8, payload: &[u8]) -> Result<FrameBytes, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge { len: payload.len() });
    }

    let mut frame = FrameBytes::new();
    frame.data[0] = FRAME_HEAD;
    frame.data[1] = seq;
    frame.data[2] = opcode;
    frame.data[3..3 + payload.len()].copy_from_slice(payload);
    frame.data[3 + payload.len()] = FRAME_TAIL;
    frame.len = payload.len() + FRAME_OVERHEAD;
    Ok(frame)
}

/// Split a received frame into sequence, opcode and payload.
pub fn decode(bytes: &[u8]) -> Result<DecodedFrame, FrameError> {
    let len = bytes.len();
    if len < FRAME_OVERHEAD {
        return Err(FrameError::TooShort { len });
    }
    if len > MAX_FRAME_LEN {
        return Err(FrameError::Oversized { len });
    }

    let head = bytes[0];
    let tail = bytes[len - 1];
    if head != FRAME_HEAD || tail != FRAME_TAIL {
        return Err(FrameError::BadMagic { head, tail });
    }

    Ok(DecodedFrame {
        seq: bytes[1],
        opcode: bytes[2],
        payload: FrameBytes::from_slice(&bytes[3..len - 1]),
    })
}
