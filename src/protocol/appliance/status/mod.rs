//! Decoding of the `get_status` and `get_version` replies.
//!
//! Status reply layout (payload offsets):
//!
//! | byte | meaning                               |
//! |------|---------------------------------------|
//! | 3    | cooking mode                          |
//! | 4    | submode                               |
//! | 5    | temperature (°C)                      |
//! | 6, 7 | cooking time hours, minutes           |
//! | 8, 9 | total time hours, minutes (incl. wait)|
//! | 10   | post-heat flag                        |
//! | 11   | program stage                         |
use crate::protocol::appliance::commands::{CookerStatusCode, CookingMode};

/// Minimum payload length of a status reply.
pub const STATUS_REPLY_LEN: usize = 12;

/// Snapshot of the appliance state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookerStatus {
    /// Raw program stage (see [`CookerStatusCode`]).
    pub status: u8,
    /// Raw cooking mode (see [`CookingMode`]).
    pub mode: u8,
    pub submode: u8,
    pub temperature: u8,
    pub target_temperature: u8,
    pub hours: u8,
    pub minutes: u8,
    pub wait_hours: u8,
    pub wait_minutes: u8,
    pub heat: u8,
    pub power: bool,
    pub postheat: bool,
}

impl CookerStatus {
    /// Decode a status payload; `None` when it is shorter than the layout.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < STATUS_REPLY_LEN {
            return None;
        }
        let status = payload[11];
        let heat = payload[10];
        Some(Self {
            status,
            mode: payload[3],
            submode: payload[4],
            temperature: payload[5],
            // The appliance reports a single temperature byte.
            target_temperature: payload[5],
            hours: payload[6],
            minutes: payload[7],
            wait_hours: payload[8].saturating_sub(payload[6]),
            wait_minutes: payload[9].saturating_sub(payload[7]),
            heat,
            power: status > 0,
            postheat: heat == 1,
        })
    }

    pub fn stage(&self) -> Option<CookerStatusCode> {
        CookerStatusCode::from_code(self.status)
    }

    /// Active program, `None` while powered down.
    pub fn cooking_mode(&self) -> Option<CookingMode> {
        if !self.power {
            return None;
        }
        CookingMode::from_code(self.mode)
    }
}

/// Firmware version from the two-byte `get_version` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl FirmwareVersion {
    pub fn parse(payload: &[u8]) -> Option<Self> {
        match payload {
            [major, minor] => Some(Self {
                major: *major,
                minor: *minor,
            }),
            _ => None,
        }
    }
}

impl core::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
