//! Data model shared by the framing codec, the session engine and the
//! appliance layer: fixed-capacity byte buffers, command descriptors and the
//! per-call exchange record.

/// Largest frame accepted on the link (BLE notification payload + margin).
pub const MAX_FRAME_LEN: usize = 32;

/// Framing overhead: magic head, sequence, opcode, magic tail.
pub const FRAME_OVERHEAD: usize = 4;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - FRAME_OVERHEAD;

/// Fixed-capacity byte buffer used for raw frames and decoded payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBytes {
    pub len: usize,
    pub data: [u8; MAX_FRAME_LEN],
}

/// Response payload returned by the dispatcher (frame stripped of its framing).
pub type Payload = FrameBytes;

impl Default for FrameBytes {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBytes {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        Self {
            len: 0,
            data: [0; MAX_FRAME_LEN],
        }
    }

    /// Build a buffer from a slice, clamped to [`MAX_FRAME_LEN`].
    pub fn from_slice(slice: &[u8]) -> Self {
        let mut bytes = Self::new();
        bytes.copy_from_slice(slice);
        bytes
    }

    /// Number of valid bytes stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy bytes into the buffer and update `len`.
    #[inline]
    pub fn copy_from_slice(&mut self, slice: &[u8]) {
        let clamped = slice.len().min(MAX_FRAME_LEN);
        self.data[..clamped].copy_from_slice(&slice[..clamped]);
        self.len = clamped;
    }

    /// Append one byte; returns `false` when the buffer is full.
    #[inline]
    pub fn push(&mut self, byte: u8) -> bool {
        if self.len >= MAX_FRAME_LEN {
            return false;
        }
        self.data[self.len] = byte;
        self.len += 1;
        true
    }

    /// Immutable view over the populated bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// First populated byte, if any.
    #[inline]
    pub fn first(&self) -> Option<u8> {
        self.as_slice().first().copied()
    }
}

impl core::fmt::Display for FrameBytes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, byte) in self.as_slice().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Pairing credential sent with the authentication command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthKey(pub [u8; 8]);

impl AuthKey {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Immutable descriptor of one appliance command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// 1. Opcode; unique within a command family.
    pub opcode: u8,
    /// 2. Human-readable label (diagnostics, logs).
    pub label: &'static str,
    /// 3. Response timeout applied when the timeout table has no entry.
    pub default_timeout_ms: u32,
}

/// Bookkeeping for one `command()` call, retries included.
///
/// Lives on the dispatcher's call stack only.
#[derive(Debug, Clone, Copy)]
pub struct PendingExchange<'p> {
    pub opcode: u8,
    pub payload: &'p [u8],
    /// 1-based attempt number.
    pub attempt: u8,
    /// Absolute deadline of the current attempt, in timer milliseconds.
    pub deadline_ms: u64,
    /// Time spent since the first attempt started.
    pub elapsed_ms: u64,
    started_ms: u64,
}

impl<'p> PendingExchange<'p> {
    pub fn new(opcode: u8, payload: &'p [u8], now_ms: u64) -> Self {
        Self {
            opcode,
            payload,
            attempt: 0,
            deadline_ms: now_ms,
            elapsed_ms: 0,
            started_ms: now_ms,
        }
    }

    /// Move to the next attempt with a fresh deadline.
    pub fn begin_attempt(&mut self, now_ms: u64, budget_ms: u32) {
        self.attempt = self.attempt.saturating_add(1);
        self.deadline_ms = now_ms + budget_ms as u64;
        self.touch(now_ms);
    }

    /// Refresh the accumulated elapsed time.
    pub fn touch(&mut self, now_ms: u64) {
        self.elapsed_ms = now_ms.saturating_sub(self.started_ms);
    }
}
