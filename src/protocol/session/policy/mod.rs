//! Timeout and retry policy, kept free of any transport so each rule can be
//! checked on its own.
//!
//! Resolution order for one call:
//! 1. per-call override ([`CommandOptions`]),
//! 2. the opcode's [`TimeoutTable`] entry,
//! 3. the table's default.
use crate::core::AuthKey;
use crate::error::ConfigError;
use crate::protocol::appliance::commands::{OP_AUTH, OP_GET_VERSION};

//==================================================================================Constants

/// Maximum number of per-opcode timeout overrides.
pub const TIMEOUT_TABLE_CAPACITY: usize = 16;

/// Response timeout used for opcodes absent from the table (ms).
pub const DEFAULT_TIMEOUT_MS: u32 = 1_500;

/// Firmware version queries are slow on some models (ms).
pub const VERSION_TIMEOUT_MS: u32 = 5_000;

/// Authentication waits for the user to confirm pairing on some models (ms).
pub const AUTH_TIMEOUT_MS: u32 = 3_000;

/// Retries after the first attempt when the caller does not override it.
pub const DEFAULT_RETRIES: u8 = 2;

/// Delay inserted after the failure of attempt `n` is `BACKOFF_SCHEDULE_MS[n - 1]`.
pub const BACKOFF_SCHEDULE_MS: [u32; 5] = [200, 400, 600, 800, 1_000];

//==================================================================================TimeoutTable

/// Opcode → response timeout map with a mandatory default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutTable {
    default_ms: u32,
    entries: [(u8, u32); TIMEOUT_TABLE_CAPACITY],
    len: usize,
}

impl TimeoutTable {
    /// Empty table answering `default_ms` for every opcode.
    pub const fn new(default_ms: u32) -> Self {
        Self {
            default_ms,
            entries: [(0, 0); TIMEOUT_TABLE_CAPACITY],
            len: 0,
        }
    }

    /// Table tuned for SkyCooker appliances.
    pub fn cooker_defaults() -> Self {
        let mut table = Self::new(DEFAULT_TIMEOUT_MS);
        table.entries[0] = (OP_GET_VERSION, VERSION_TIMEOUT_MS);
        table.entries[1] = (OP_AUTH, AUTH_TIMEOUT_MS);
        table.len = 2;
        table
    }

    /// Set the timeout for `opcode`, replacing any previous entry.
    pub fn with_entry(mut self, opcode: u8, timeout_ms: u32) -> Result<Self, ConfigError> {
        self.insert(opcode, timeout_ms)?;
        Ok(self)
    }

    /// In-place variant of [`Self::with_entry`].
    pub fn insert(&mut self, opcode: u8, timeout_ms: u32) -> Result<(), ConfigError> {
        if let Some(entry) = self.entries[..self.len]
            .iter_mut()
            .find(|(op, _)| *op == opcode)
        {
            entry.1 = timeout_ms;
            return Ok(());
        }
        if self.len == TIMEOUT_TABLE_CAPACITY {
            return Err(ConfigError::TableFull {
                capacity: TIMEOUT_TABLE_CAPACITY,
            });
        }
        self.entries[self.len] = (opcode, timeout_ms);
        self.len += 1;
        Ok(())
    }

    /// Timeout for `opcode`; never fails.
    pub fn resolve(&self, opcode: u8) -> u32 {
        self.entries[..self.len]
            .iter()
            .find(|(op, _)| *op == opcode)
            .map(|(_, ms)| *ms)
            .unwrap_or(self.default_ms)
    }

    pub fn default_ms(&self) -> u32 {
        self.default_ms
    }
}

impl Default for TimeoutTable {
    fn default() -> Self {
        Self::cooker_defaults()
    }
}

//==================================================================================Resolution

/// Per-call overrides. Never touch the shared configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandOptions {
    pub timeout_ms: Option<u32>,
    pub retries: Option<u8>,
}

impl CommandOptions {
    pub const fn new() -> Self {
        Self {
            timeout_ms: None,
            retries: None,
        }
    }

    pub const fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub const fn with_retries(mut self, retries: u8) -> Self {
        self.retries = Some(retries);
        self
    }
}

/// Effective response timeout for one call.
pub fn resolve_timeout(table: &TimeoutTable, opcode: u8, override_ms: Option<u32>) -> u32 {
    override_ms.unwrap_or_else(|| table.resolve(opcode))
}

/// Effective retry budget for one call (attempts = retries + 1).
pub fn resolve_retries(default_retries: u8, override_retries: Option<u8>) -> u8 {
    override_retries.unwrap_or(default_retries)
}

//==================================================================================Backoff

/// Fixed ascending backoff between attempts; the last step repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSchedule {
    steps: &'static [u32],
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            steps: &BACKOFF_SCHEDULE_MS,
        }
    }
}

impl BackoffSchedule {
    /// Custom schedule. An empty slice means no delay between attempts.
    pub const fn new(steps: &'static [u32]) -> Self {
        Self { steps }
    }

    /// Delay to wait after the failure of 1-based `attempt`.
    pub fn delay_after(&self, attempt: u8) -> u32 {
        let index = (attempt.max(1) - 1) as usize;
        match self.steps.get(index) {
            Some(delay) => *delay,
            None => self.steps.last().copied().unwrap_or(0),
        }
    }
}

//==================================================================================EngineConfig

/// Construction-time configuration of a dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// 1. Per-opcode response timeouts.
    pub timeouts: TimeoutTable,
    /// 2. Retries applied when a call does not override them.
    pub retries: u8,
    /// 3. Delays inserted between attempts.
    pub backoff: BackoffSchedule,
    /// 4. Pairing key sent during authentication.
    pub auth_key: AuthKey,
}

impl EngineConfig {
    pub fn new(auth_key: AuthKey) -> Self {
        Self {
            timeouts: TimeoutTable::cooker_defaults(),
            retries: DEFAULT_RETRIES,
            backoff: BackoffSchedule::default(),
            auth_key,
        }
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutTable) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffSchedule) -> Self {
        self.backoff = backoff;
        self
    }
}
