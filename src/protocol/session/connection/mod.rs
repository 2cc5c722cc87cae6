//! Connection lifecycle for one appliance: GATT connect, pairing-key
//! authentication, link health tracking and teardown.
//!
//! ```text
//!  Disconnected ──► Connecting ──► Authenticating ──► Ready ◄──► Degraded
//!       ▲               │                │              │           │
//!       └───────────────┴────────────────┘              └─► Closing ◄┘
//!       ▲                                                     │
//!       └─────────────────────────────────────────────────────┘
//! ```
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::core::{AuthKey, FrameBytes};
use crate::error::{CommandError, FrameError, ProtocolError};
use crate::protocol::appliance::commands::OP_AUTH;
use crate::protocol::session::waiter::{wait_for_response, Verdict, WaitError};
use crate::protocol::transport::frame::{decode, encode};
use crate::protocol::transport::inbox::{Notification, ResponseInbox};
use crate::protocol::transport::traits::{
    ble_link::{BleLink, LinkFault},
    cooker_timer::CookerTimer,
};

/// Consecutive write/notify faults after which a ready link counts as degraded.
pub const DEGRADE_AFTER_FAULTS: u8 = 2;

/// Lifecycle state of the appliance session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
    Degraded,
    Closing,
}

impl ConnectionState {
    /// Whether commands can be written without re-establishing the session.
    pub fn is_usable(&self) -> bool {
        matches!(self, ConnectionState::Ready | ConnectionState::Degraded)
    }
}

/// Owner of the link handle and the pairing material.
pub struct Connection<L: BleLink> {
    /// BLE link used for every write.
    link: L,
    /// Current lifecycle state.
    state: ConnectionState,
    /// Pairing key sent during authentication.
    auth_key: AuthKey,
    /// Wrapping frame sequence counter.
    sequence: u8,
    /// Consecutive faults since the last successful exchange.
    faults: u8,
    /// Timer timestamp of the last successful exchange.
    last_activity_ms: u64,
    /// Stage the last failed `ensure_ready` stopped in.
    failed_stage: ConnectionState,
}

impl<L: BleLink> Connection<L> {
    pub fn new(link: L, auth_key: AuthKey) -> Self {
        Self {
            link,
            state: ConnectionState::Disconnected,
            auth_key,
            sequence: 0,
            faults: 0,
            last_activity_ms: 0,
            failed_stage: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_activity_ms(&self) -> u64 {
        self.last_activity_ms
    }

    /// `Connecting` or `Authenticating` after a failed [`ensure_ready`](Self::ensure_ready).
    pub fn failed_stage(&self) -> ConnectionState {
        self.failed_stage
    }

    /// Underlying link, for inspection.
    pub fn link(&self) -> &L {
        &self.link
    }

    fn set_state(&mut self, next: ConnectionState) {
        #[cfg(feature = "defmt")]
        if self.state != next {
            defmt::debug!("Connection: {} -> {}", self.state, next);
        }
        self.state = next;
    }

    /// Bring the session to `Ready`, connecting and authenticating if needed.
    ///
    /// No-op while the session is usable and the link still up. On any
    /// failure the link is closed and the state is `Disconnected`.
    pub async fn ensure_ready<M, T, const N: usize>(
        &mut self,
        timer: &mut T,
        inbox: &ResponseInbox<M, N>,
        auth_timeout_ms: u32,
    ) -> Result<(), CommandError<L::Error>>
    where
        M: RawMutex,
        T: CookerTimer,
    {
        if self.state.is_usable() {
            if self.link.is_connected() {
                return Ok(());
            }
            #[cfg(feature = "defmt")]
            defmt::warn!("Connection lost while idle, reconnecting");
            self.set_state(ConnectionState::Disconnected);
        }

        self.set_state(ConnectionState::Connecting);
        if let Err(err) = self.link.connect().await {
            #[cfg(feature = "defmt")]
            defmt::error!("Connect failed");
            self.failed_stage = ConnectionState::Connecting;
            self.drop_link().await;
            return Err(CommandError::Connection(err));
        }

        self.set_state(ConnectionState::Authenticating);
        match self.authenticate(timer, inbox, auth_timeout_ms).await {
            Ok(()) => {
                self.faults = 0;
                self.last_activity_ms = timer.now_ms();
                self.set_state(ConnectionState::Ready);
                #[cfg(feature = "defmt")]
                defmt::info!("Connection ready");
                Ok(())
            }
            Err(err) => {
                self.failed_stage = ConnectionState::Authenticating;
                self.drop_link().await;
                Err(err)
            }
        }
    }

    /// Send the pairing key and wait for the appliance's verdict.
    async fn authenticate<M, T, const N: usize>(
        &mut self,
        timer: &mut T,
        inbox: &ResponseInbox<M, N>,
        auth_timeout_ms: u32,
    ) -> Result<(), CommandError<L::Error>>
    where
        M: RawMutex,
        T: CookerTimer,
    {
        inbox.clear();
        let key = self.auth_key;
        let started = timer.now_ms();
        let seq = self
            .write_frame(OP_AUTH, key.as_bytes())
            .await
            .map_err(|err| match err {
                WriteError::Frame(err) => CommandError::Protocol(err.into()),
                WriteError::Link(err) => CommandError::Connection(err),
            })?;

        let accepted = wait_for_response(inbox, timer, auth_timeout_ms, |frame| {
            match_response(frame, seq, OP_AUTH)
        })
        .await;

        match accepted {
            Ok(payload) if payload.first().unwrap_or(0) != 0 => Ok(()),
            Ok(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Auth rejected, enable pairing mode on the cooker");
                Err(CommandError::Auth)
            }
            Err(WaitError::Rejected(err)) => Err(CommandError::Protocol(err)),
            Err(WaitError::Elapsed) => Err(CommandError::Timeout {
                opcode: OP_AUTH,
                attempts: 1,
                elapsed_ms: timer.now_ms().saturating_sub(started),
            }),
        }
    }

    /// Encode and write one frame, returning the sequence number it carries.
    pub async fn write_frame(&mut self, opcode: u8, payload: &[u8]) -> Result<u8, WriteError<L::Error>> {
        self.sequence = self.sequence.wrapping_add(1);
        let seq = self.sequence;
        let frame = encode(seq, opcode, payload).map_err(WriteError::Frame)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("Write opcode 0x{:02X} seq {} ({} bytes)", opcode, seq, frame.len());

        self.link
            .write(frame.as_slice())
            .await
            .map_err(WriteError::Link)?;
        Ok(seq)
    }

    /// Whether the link still reports a live connection.
    pub fn link_up(&self) -> bool {
        self.link.is_connected()
    }

    /// Record a successful exchange; a degraded link recovers.
    pub fn record_success(&mut self, now_ms: u64) {
        self.faults = 0;
        self.last_activity_ms = now_ms;
        if self.state == ConnectionState::Degraded {
            #[cfg(feature = "defmt")]
            defmt::info!("Link recovered");
            self.set_state(ConnectionState::Ready);
        }
    }

    /// Record a write/notify fault; repeated faults degrade a ready link.
    pub fn record_fault(&mut self) {
        self.faults = self.faults.saturating_add(1);
        if self.state == ConnectionState::Ready && self.faults >= DEGRADE_AFTER_FAULTS {
            #[cfg(feature = "defmt")]
            defmt::warn!("Link degraded after {} faults", self.faults);
            self.set_state(ConnectionState::Degraded);
        }
    }

    /// The link dropped under an exchange: close it so the next
    /// `ensure_ready` starts from scratch.
    pub async fn mark_lost(&mut self) {
        self.drop_link().await;
    }

    /// Orderly shutdown through `Closing`.
    pub async fn teardown(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.set_state(ConnectionState::Closing);
        self.link.disconnect().await;
        self.faults = 0;
        self.set_state(ConnectionState::Disconnected);
        #[cfg(feature = "defmt")]
        defmt::info!("Connection closed");
    }

    /// Close the session when idle for at least `idle_ms`. Returns whether it closed.
    pub async fn close_if_idle(&mut self, now_ms: u64, idle_ms: u64) -> bool {
        if self.state.is_usable() && now_ms.saturating_sub(self.last_activity_ms) >= idle_ms {
            self.teardown().await;
            return true;
        }
        false
    }

    async fn drop_link(&mut self) {
        self.link.disconnect().await;
        self.faults = 0;
        self.set_state(ConnectionState::Disconnected);
    }

    /// Retry class of a link error.
    pub fn classify(error: &L::Error) -> LinkFault {
        L::classify(error)
    }
}

/// Failure of [`Connection::write_frame`].
#[derive(Debug)]
pub enum WriteError<E> {
    Frame(FrameError),
    Link(E),
}

/// Judge a raw frame against the outstanding exchange `(seq, opcode)`.
///
/// A notification cut down by the inbox is rejected as oversized even if
/// the kept bytes happen to look like a frame.
pub fn match_response(
    frame: &Notification,
    seq: u8,
    opcode: u8,
) -> Verdict<FrameBytes, ProtocolError> {
    if frame.is_truncated() {
        return Verdict::Reject(ProtocolError::Malformed(FrameError::Oversized {
            len: frame.len(),
        }));
    }
    match decode(frame.as_slice()) {
        Err(err) => Verdict::Reject(ProtocolError::Malformed(err)),
        Ok(decoded) if decoded.seq != seq => Verdict::Stale,
        Ok(decoded) if decoded.opcode != opcode => Verdict::Reject(ProtocolError::UnexpectedOpcode {
            expected: opcode,
            got: decoded.opcode,
        }),
        Ok(decoded) => Verdict::Accept(decoded.payload),
    }
}
