//! Error definitions shared across library modules.
//! Each type models one layer: wire framing, the command dispatcher and the
//! appliance vocabulary built on top of it.
use thiserror_no_std::Error;

//==================================================================================FRAME_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Failures while encoding or decoding a link frame.
pub enum FrameError {
    /// Fewer bytes than the framing overhead.
    #[error("Frame too short: {len} bytes")]
    TooShort { len: usize },
    /// More bytes than a frame buffer can hold.
    #[error("Frame too long: {len} bytes")]
    Oversized { len: usize },
    /// Head or tail marker is not 0x55/0xAA.
    #[error("Invalid frame magic: head 0x{head:02X}, tail 0x{tail:02X}")]
    BadMagic { head: u8, tail: u8 },
    /// Outgoing payload does not fit into a single frame.
    #[error("Payload too large: {len} bytes")]
    PayloadTooLarge { len: usize },
}

//==================================================================================PROTOCOL_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// A response reached the engine but cannot be trusted.
pub enum ProtocolError {
    /// The frame itself is malformed.
    #[error("Malformed response: {0}")]
    Malformed(FrameError),
    /// The response carries another opcode than the outstanding exchange.
    #[error("Unexpected response opcode: expected 0x{expected:02X}, got 0x{got:02X}")]
    UnexpectedOpcode { expected: u8, got: u8 },
}

impl From<FrameError> for ProtocolError {
    fn from(err: FrameError) -> Self {
        ProtocolError::Malformed(err)
    }
}

//==================================================================================COMMAND_ERROR
#[derive(Error, Debug)]
/// Errors surfaced by the command dispatcher.
pub enum CommandError<E: core::fmt::Debug> {
    /// Transport connect or write failure outside the retryable set.
    #[error("Connection error: {0:?}")]
    Connection(E),

    /// The appliance rejected the pairing key.
    #[error("Authentication rejected by appliance")]
    Auth,

    /// No matching response within the effective timeout across all attempts.
    #[error(
        "No response to opcode 0x{opcode:02X} after {attempts} attempt(s), {elapsed_ms} ms total wait"
    )]
    Timeout {
        opcode: u8,
        attempts: u8,
        elapsed_ms: u64,
    },

    /// A response was received but is malformed or out of protocol.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The link dropped while an exchange was pending.
    #[error("Connection lost during exchange")]
    ConnectionLost,

    /// Too many callers already queued for the exchange slot.
    #[error("Command queue full")]
    QueueFull,

    /// The dispatcher was disposed and accepts no more commands.
    #[error("Connection disposed")]
    Disposed,
}

/// Payload-free classification of a [`CommandError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    Connection,
    Auth,
    Timeout,
    Protocol,
    ConnectionLost,
    QueueFull,
    Disposed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection error",
            ErrorKind::Auth => "authentication error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Protocol => "protocol error",
            ErrorKind::ConnectionLost => "connection lost",
            ErrorKind::QueueFull => "queue full",
            ErrorKind::Disposed => "disposed",
        }
    }
}

impl<E: core::fmt::Debug> CommandError<E> {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::Connection(_) => ErrorKind::Connection,
            CommandError::Auth => ErrorKind::Auth,
            CommandError::Timeout { .. } => ErrorKind::Timeout,
            CommandError::Protocol(_) => ErrorKind::Protocol,
            CommandError::ConnectionLost => ErrorKind::ConnectionLost,
            CommandError::QueueFull => ErrorKind::QueueFull,
            CommandError::Disposed => ErrorKind::Disposed,
        }
    }
}

//==================================================================================COOKER_ERROR
#[derive(Error, Debug)]
/// Errors raised by the appliance-level helpers.
pub enum CookerError<E: core::fmt::Debug> {
    /// The exchange itself failed.
    #[error("{0}")]
    Command(CommandError<E>),
    /// The appliance answered but reported a failure flag.
    #[error("Appliance refused opcode 0x{opcode:02X}")]
    Refused { opcode: u8 },
    /// Status reply shorter than the documented layout.
    #[error("Status reply too short: {len} bytes")]
    StatusTooShort { len: usize },
    /// Version reply is not two bytes long.
    #[error("Version reply has unexpected length: {len} bytes")]
    BadVersion { len: usize },
    /// Cooking or delay duration outside what the appliance accepts.
    #[error("Duration out of range: {minutes} min")]
    TimeOutOfRange { minutes: u16 },
    /// Model string not covered by any known protocol family.
    #[error("Unknown cooker model")]
    UnknownModel,
}

impl<E: core::fmt::Debug> From<CommandError<E>> for CookerError<E> {
    fn from(err: CommandError<E>) -> Self {
        CookerError::Command(err)
    }
}

//==================================================================================CONFIG_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors raised while assembling the engine configuration.
pub enum ConfigError {
    /// No free slot left in the timeout table.
    #[error("Timeout table full ({capacity} entries)")]
    TableFull { capacity: usize },
}
