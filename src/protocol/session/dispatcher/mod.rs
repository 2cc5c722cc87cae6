//! Command dispatcher: the one entry point turning the single-slot BLE link
//! into a serialized, timeout-bounded, retrying request/response API.
//!
//! Per call:
//! 1. Resolve the effective timeout and retry budget.
//! 2. Queue for the exchange slot (callers are served in arrival order) and
//!    `ensure_ready`.
//!    Connection and authentication failures are returned as is.
//! 3. For each attempt: drop leftover frames, write, wait. A timeout or a
//!    recoverable write fault backs off and retries; a dropped link
//!    reconnects on the next attempt; a protocol violation stops at once.
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::{
    blocking_mutex::raw::RawMutex,
    mutex::Mutex,
    semaphore::{FairSemaphore, Semaphore},
};

use crate::core::{Payload, PendingExchange};
use crate::error::CommandError;
use crate::protocol::appliance::commands::OP_AUTH;
use crate::protocol::session::{
    connection::{match_response, Connection, ConnectionState, WriteError},
    policy::{resolve_retries, resolve_timeout, CommandOptions, EngineConfig},
    waiter::{wait_for_response, WaitError},
};
use crate::protocol::transport::{
    inbox::ResponseInbox,
    traits::{
        ble_link::{BleLink, LinkFault},
        cooker_timer::CookerTimer,
    },
    INBOX_CAPACITY,
};

/// Callers that may wait for the exchange slot at once.
pub const QUEUE_DEPTH: usize = 8;

/// State guarded by the exchange slot.
struct Slot<L: BleLink, T: CookerTimer> {
    connection: Connection<L>,
    timer: T,
}

/// How one attempt ended, when it did not produce a response.
enum AttemptFailure<E: core::fmt::Debug> {
    /// Missed response or recoverable write fault.
    Retryable,
    /// The link dropped.
    LinkLost,
    /// Stop now with this error.
    Terminal(CommandError<E>),
}

/// Serialized command front-end for one appliance session.
pub struct Dispatcher<'a, M, L, T, const N: usize = INBOX_CAPACITY>
where
    M: RawMutex,
    L: BleLink,
    T: CookerTimer,
{
    /// Single permit handed out in arrival order; taken before `slot`.
    turns: FairSemaphore<M, QUEUE_DEPTH>,
    slot: Mutex<M, Slot<L, T>>,
    inbox: &'a ResponseInbox<M, N>,
    config: EngineConfig,
    /// Bumped by `disconnect`; calls that started earlier fail with `ConnectionLost`.
    generation: AtomicU32,
    disposed: AtomicBool,
}

impl<'a, M, L, T, const N: usize> Dispatcher<'a, M, L, T, N>
where
    M: RawMutex,
    L: BleLink,
    T: CookerTimer,
{
    /// Build a dispatcher in the `Disconnected` state. Nothing touches the
    /// link until the first command.
    pub fn new(link: L, timer: T, inbox: &'a ResponseInbox<M, N>, config: EngineConfig) -> Self {
        Self {
            turns: FairSemaphore::new(1),
            slot: Mutex::new(Slot {
                connection: Connection::new(link, config.auth_key),
                timer,
            }),
            inbox,
            config,
            generation: AtomicU32::new(0),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Send `opcode` with the configured timeout and retry budget.
    pub async fn command(&self, opcode: u8, payload: &[u8]) -> Result<Payload, CommandError<L::Error>> {
        self.command_with(opcode, payload, CommandOptions::new()).await
    }

    /// Send `opcode`, overriding timeout and/or retries for this call only.
    pub async fn command_with(
        &self,
        opcode: u8,
        payload: &[u8],
        options: CommandOptions,
    ) -> Result<Payload, CommandError<L::Error>> {
        let timeout_ms = resolve_timeout(&self.config.timeouts, opcode, options.timeout_ms);
        let retries = resolve_retries(self.config.retries, options.retries);
        let generation = self.generation.load(Ordering::Acquire);

        self.check_alive(generation)?;
        let _turn = self
            .turns
            .acquire(1)
            .await
            .map_err(|_| CommandError::QueueFull)?;
        let mut slot = self.slot.lock().await;
        self.check_alive(generation)?;

        let Slot { connection, timer } = &mut *slot;
        connection
            .ensure_ready(timer, self.inbox, self.config.timeouts.resolve(OP_AUTH))
            .await?;

        let mut exchange = PendingExchange::new(opcode, payload, timer.now_ms());
        let attempts = retries.saturating_add(1);

        loop {
            if exchange.attempt > 0 {
                self.check_alive(generation)?;
                if !connection.state().is_usable() {
                    connection
                        .ensure_ready(timer, self.inbox, self.config.timeouts.resolve(OP_AUTH))
                        .await?;
                }
            }
            exchange.begin_attempt(timer.now_ms(), timeout_ms);

            let failure = match self.attempt(connection, timer, &exchange, timeout_ms).await {
                Ok(response) => {
                    connection.record_success(timer.now_ms());
                    #[cfg(feature = "defmt")]
                    defmt::debug!(
                        "Opcode 0x{:02X} answered on attempt {}",
                        opcode,
                        exchange.attempt
                    );
                    return Ok(response);
                }
                Err(failure) => failure,
            };

            exchange.touch(timer.now_ms());
            let last_attempt = exchange.attempt >= attempts;

            match failure {
                AttemptFailure::Terminal(err) => {
                    #[cfg(feature = "defmt")]
                    defmt::error!("Opcode 0x{:02X} failed: {}", opcode, err.kind());
                    return Err(err);
                }
                AttemptFailure::LinkLost if last_attempt => {
                    #[cfg(feature = "defmt")]
                    defmt::error!("Link lost, opcode 0x{:02X} abandoned", opcode);
                    return Err(CommandError::ConnectionLost);
                }
                AttemptFailure::Retryable if last_attempt => {
                    #[cfg(feature = "defmt")]
                    defmt::error!(
                        "Opcode 0x{:02X}: no response after {} attempts, {} ms",
                        opcode,
                        exchange.attempt,
                        exchange.elapsed_ms
                    );
                    return Err(CommandError::Timeout {
                        opcode,
                        attempts: exchange.attempt,
                        elapsed_ms: exchange.elapsed_ms,
                    });
                }
                AttemptFailure::LinkLost | AttemptFailure::Retryable => {
                    let delay = self.config.backoff.delay_after(exchange.attempt);
                    #[cfg(feature = "defmt")]
                    defmt::warn!(
                        "Opcode 0x{:02X} attempt {} failed, retrying in {} ms",
                        opcode,
                        exchange.attempt,
                        delay
                    );
                    if delay > 0 {
                        timer.delay_ms(delay).await;
                    }
                }
            }
        }
    }

    /// One write-then-wait exchange.
    async fn attempt(
        &self,
        connection: &mut Connection<L>,
        timer: &mut T,
        exchange: &PendingExchange<'_>,
        timeout_ms: u32,
    ) -> Result<Payload, AttemptFailure<L::Error>> {
        let _stale = self.inbox.clear();
        #[cfg(feature = "defmt")]
        if _stale > 0 {
            defmt::debug!("Dropped {} stale frame(s) before attempt", _stale);
        }

        let seq = match connection.write_frame(exchange.opcode, exchange.payload).await {
            Ok(seq) => seq,
            Err(WriteError::Frame(err)) => {
                return Err(AttemptFailure::Terminal(CommandError::Protocol(err.into())))
            }
            Err(WriteError::Link(err)) => {
                return Err(match Connection::<L>::classify(&err) {
                    LinkFault::Busy | LinkFault::Rejected => {
                        connection.record_fault();
                        AttemptFailure::Retryable
                    }
                    LinkFault::Disconnected => {
                        connection.mark_lost().await;
                        AttemptFailure::LinkLost
                    }
                    LinkFault::Fatal => {
                        connection.mark_lost().await;
                        AttemptFailure::Terminal(CommandError::Connection(err))
                    }
                });
            }
        };

        let opcode = exchange.opcode;
        match wait_for_response(self.inbox, timer, timeout_ms, |frame| {
            match_response(frame, seq, opcode)
        })
        .await
        {
            Ok(payload) => Ok(payload),
            Err(WaitError::Rejected(err)) => Err(AttemptFailure::Terminal(err.into())),
            Err(WaitError::Elapsed) if !connection.link_up() => {
                connection.mark_lost().await;
                Err(AttemptFailure::LinkLost)
            }
            Err(WaitError::Elapsed) => {
                connection.record_fault();
                Err(AttemptFailure::Retryable)
            }
        }
    }

    fn check_alive(&self, generation: u32) -> Result<(), CommandError<L::Error>> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(CommandError::Disposed);
        }
        if self.generation.load(Ordering::Acquire) != generation {
            return Err(CommandError::ConnectionLost);
        }
        Ok(())
    }

    /// Connect and authenticate without sending a command.
    pub async fn ensure_ready(&self) -> Result<(), CommandError<L::Error>> {
        self.open_session().await.map_err(|(_, err)| err)
    }

    /// Like [`ensure_ready`](Self::ensure_ready), also reporting the stage
    /// a failure happened in: `Connecting`, `Authenticating`, or
    /// `Disconnected` when the dispatcher is disposed.
    pub async fn open_session(&self) -> Result<(), (ConnectionState, CommandError<L::Error>)> {
        if self.disposed.load(Ordering::Acquire) {
            return Err((ConnectionState::Disconnected, CommandError::Disposed));
        }
        let mut slot = self.slot.lock().await;
        let Slot { connection, timer } = &mut *slot;
        connection
            .ensure_ready(timer, self.inbox, self.config.timeouts.resolve(OP_AUTH))
            .await
            .map_err(|err| (connection.failed_stage(), err))
    }

    /// Current lifecycle state (waits for an in-flight exchange to finish).
    pub async fn connection_state(&self) -> ConnectionState {
        self.slot.lock().await.connection.state()
    }

    /// Tear the session down. Calls issued before this one that have not
    /// finished fail with [`CommandError::ConnectionLost`]; later calls
    /// reconnect.
    pub async fn disconnect(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.slot.lock().await.connection.teardown().await;
    }

    /// Close the session if no exchange succeeded during the last `idle_ms`.
    pub async fn close_if_idle(&self, idle_ms: u64) -> bool {
        let mut slot = self.slot.lock().await;
        let now = slot.timer.now_ms();
        slot.connection.close_if_idle(now, idle_ms).await
    }

    /// Disconnect for good; every later call fails with [`CommandError::Disposed`].
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.disconnect().await;
        #[cfg(feature = "defmt")]
        defmt::info!("Dispatcher disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
