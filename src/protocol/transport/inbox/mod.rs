//! Response inbox: bounded FIFO between the GATT notify callback (producer)
//! and the response waiter (consumer).
//!
//! The integrator allocates the inbox statically and hands a reference to
//! both sides. Pushing never blocks, so it is safe to call from a BLE stack
//! callback.
use embassy_sync::{blocking_mutex::raw::RawMutex, channel::Channel};

use crate::core::{FrameBytes, MAX_FRAME_LEN};
use crate::protocol::transport::INBOX_CAPACITY;

/// One notification as queued by the inbox.
///
/// Only the first [`MAX_FRAME_LEN`] bytes are kept; `received_len` is the
/// length the link actually delivered, so an over-long notification stays
/// recognizable after truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub bytes: FrameBytes,
    pub received_len: usize,
}

impl Notification {
    pub fn from_slice(slice: &[u8]) -> Self {
        Self {
            bytes: FrameBytes::from_slice(slice),
            received_len: slice.len(),
        }
    }

    /// Whether bytes were cut off to fit the frame buffer.
    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.received_len > MAX_FRAME_LEN
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.received_len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.received_len == 0
    }

    /// Stored bytes; shorter than [`len`](Self::len) when truncated.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.bytes.as_slice()
    }
}

/// Bounded queue of raw response frames.
pub struct ResponseInbox<M: RawMutex, const N: usize = INBOX_CAPACITY> {
    channel: Channel<M, Notification, N>,
}

impl<M: RawMutex, const N: usize> Default for ResponseInbox<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, const N: usize> ResponseInbox<M, N> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Append a notified frame. Returns `false` when the inbox is full and
    /// the frame was dropped.
    pub fn push(&self, bytes: &[u8]) -> bool {
        #[cfg(feature = "defmt")]
        if bytes.len() > MAX_FRAME_LEN {
            defmt::warn!("Oversized notification ({} bytes)", bytes.len());
        }
        match self.channel.try_send(Notification::from_slice(bytes)) {
            Ok(()) => true,
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Response inbox full, dropping {} byte frame", bytes.len());
                false
            }
        }
    }

    /// Take the oldest buffered frame, if any.
    pub fn try_take(&self) -> Option<Notification> {
        self.channel.try_receive().ok()
    }

    /// Discard every buffered frame and return how many were dropped.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.channel.try_receive().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn frames_come_out_in_arrival_order() {
        let inbox: ResponseInbox<NoopRawMutex, 4> = ResponseInbox::new();
        assert!(inbox.push(&[1]));
        assert!(inbox.push(&[2, 2]));

        assert_eq!(inbox.try_take().unwrap().as_slice(), &[1]);
        assert_eq!(inbox.try_take().unwrap().as_slice(), &[2, 2]);
        assert!(inbox.try_take().is_none());
    }

    #[test]
    fn full_inbox_drops_newest() {
        let inbox: ResponseInbox<NoopRawMutex, 2> = ResponseInbox::new();
        assert!(inbox.push(&[1]));
        assert!(inbox.push(&[2]));
        assert!(!inbox.push(&[3]));

        assert_eq!(inbox.clear(), 2);
        assert!(inbox.try_take().is_none());
    }

    #[test]
    fn long_notification_keeps_its_length() {
        let inbox: ResponseInbox<NoopRawMutex, 2> = ResponseInbox::new();
        let mut long = [0x11u8; MAX_FRAME_LEN + 9];
        long[0] = 0x55;
        long[MAX_FRAME_LEN - 1] = 0xAA;
        assert!(inbox.push(&long));

        let taken = inbox.try_take().unwrap();
        assert!(taken.is_truncated());
        assert_eq!(taken.len(), MAX_FRAME_LEN + 9);
        assert_eq!(taken.as_slice().len(), MAX_FRAME_LEN);
    }
}
