//! Connection self-test: a fixed script of dispatcher calls producing one
//! pass/fail/skip record per step.
//!
//! The runner is an ordinary dispatcher client. It is the only component
//! that turns errors into records instead of propagating them.
use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::Vec;

use crate::core::{FrameBytes, Payload};
use crate::error::{CommandError, ErrorKind};
use crate::protocol::appliance::commands::{
    CookingMode, OP_GET_STATUS, OP_GET_VERSION, OP_SET_MAIN_MODE, OP_SET_TEMPERATURE,
};
use crate::protocol::session::{connection::ConnectionState, dispatcher::Dispatcher};
use crate::protocol::transport::traits::{ble_link::BleLink, cooker_timer::CookerTimer};

/// Number of steps in the script.
pub const STEP_COUNT: usize = 6;

//==================================================================================Steps

/// Script steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiagnosticStep {
    Connect,
    Authenticate,
    GetStatus,
    GetVersion,
    SetTemperature,
    SetMode,
}

impl DiagnosticStep {
    pub const ALL: [DiagnosticStep; STEP_COUNT] = [
        DiagnosticStep::Connect,
        DiagnosticStep::Authenticate,
        DiagnosticStep::GetStatus,
        DiagnosticStep::GetVersion,
        DiagnosticStep::SetTemperature,
        DiagnosticStep::SetMode,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DiagnosticStep::Connect => "connect",
            DiagnosticStep::Authenticate => "authenticate",
            DiagnosticStep::GetStatus => "get_status",
            DiagnosticStep::GetVersion => "get_version",
            DiagnosticStep::SetTemperature => "set_temperature",
            DiagnosticStep::SetMode => "set_mode",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiagnosticStatus {
    Pass,
    Fail,
    /// Not attempted because an earlier step it depends on failed.
    Skipped,
}

impl DiagnosticStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticStatus::Pass => "PASS",
            DiagnosticStatus::Fail => "FAIL",
            DiagnosticStatus::Skipped => "SKIPPED",
        }
    }
}

/// Human-readable outcome of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticDetail {
    Connected,
    Authenticated,
    /// Raw reply payload.
    Response(Payload),
    /// The appliance answered a write with a failure flag.
    Refused(Payload),
    TimedOut { attempts: u8, elapsed_ms: u64 },
    Failed(ErrorKind),
    Skipped { depends_on: DiagnosticStep },
}

impl core::fmt::Display for DiagnosticDetail {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DiagnosticDetail::Connected => f.write_str("link established"),
            DiagnosticDetail::Authenticated => f.write_str("pairing key accepted"),
            DiagnosticDetail::Response(payload) => write!(f, "response: [{}]", payload),
            DiagnosticDetail::Refused(payload) => {
                write!(f, "appliance refused, response: [{}]", payload)
            }
            DiagnosticDetail::TimedOut {
                attempts,
                elapsed_ms,
            } => write!(
                f,
                "timeout: no response after {} attempt(s), {} ms",
                attempts, elapsed_ms
            ),
            DiagnosticDetail::Failed(kind) => f.write_str(kind.as_str()),
            DiagnosticDetail::Skipped { depends_on } => {
                write!(f, "not attempted: requires '{}' to pass", depends_on.name())
            }
        }
    }
}

/// One record of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticResult {
    pub step: DiagnosticStep,
    pub status: DiagnosticStatus,
    pub detail: DiagnosticDetail,
}

impl core::fmt::Display for DiagnosticResult {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}: {} - {}",
            self.step.name(),
            self.status.as_str(),
            self.detail
        )
    }
}

//==================================================================================Report

/// Ordered, append-only sequence of step results.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticReport {
    results: Vec<DiagnosticResult, STEP_COUNT>,
}

impl DiagnosticReport {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, step: DiagnosticStep, status: DiagnosticStatus, detail: DiagnosticDetail) {
        #[cfg(feature = "defmt")]
        defmt::info!("Diagnostic {}: {}", step, status);
        // One record per step, capacity matches the script.
        let _ = self.results.push(DiagnosticResult {
            step,
            status,
            detail,
        });
    }

    fn skip_remaining(&mut self, depends_on: DiagnosticStep) {
        for step in DiagnosticStep::ALL {
            if self.get(step).is_none() {
                self.record(
                    step,
                    DiagnosticStatus::Skipped,
                    DiagnosticDetail::Skipped { depends_on },
                );
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticResult> {
        self.results.iter()
    }

    pub fn as_slice(&self) -> &[DiagnosticResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, step: DiagnosticStep) -> Option<&DiagnosticResult> {
        self.results.iter().find(|result| result.step == step)
    }

    pub fn all_passed(&self) -> bool {
        !self.results.is_empty()
            && self
                .results
                .iter()
                .all(|result| result.status == DiagnosticStatus::Pass)
    }
}

//==================================================================================Plan

/// Parameters of the write steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticPlan {
    /// Target used by the `set_temperature` step (°C).
    pub temperature: u8,
    /// Program selected by the `set_mode` step.
    pub mode: CookingMode,
}

impl Default for DiagnosticPlan {
    fn default() -> Self {
        Self {
            temperature: 40,
            mode: CookingMode::KeepWarm,
        }
    }
}

impl DiagnosticPlan {
    /// `(step, opcode, payload, expects acknowledgement)` for every command step.
    fn command_steps(&self) -> [(DiagnosticStep, u8, FrameBytes, bool); 4] {
        [
            (DiagnosticStep::GetStatus, OP_GET_STATUS, FrameBytes::new(), false),
            (DiagnosticStep::GetVersion, OP_GET_VERSION, FrameBytes::new(), false),
            (
                DiagnosticStep::SetTemperature,
                OP_SET_TEMPERATURE,
                FrameBytes::from_slice(&[self.temperature]),
                true,
            ),
            (
                DiagnosticStep::SetMode,
                OP_SET_MAIN_MODE,
                FrameBytes::from_slice(&[self.mode.code(), 0, self.temperature, 0, 0, 0]),
                true,
            ),
        ]
    }
}

//==================================================================================Runner

/// Run the self-test script against `dispatcher`.
///
/// A failed connect or authentication skips every later step; command steps
/// are independent of each other and always attempted.
pub async fn run_diagnostics<M, L, T, const N: usize>(
    dispatcher: &Dispatcher<'_, M, L, T, N>,
    plan: &DiagnosticPlan,
) -> DiagnosticReport
where
    M: RawMutex,
    L: BleLink,
    T: CookerTimer,
{
    let mut report = DiagnosticReport::new();

    match dispatcher.open_session().await {
        Ok(()) => {
            report.record(
                DiagnosticStep::Connect,
                DiagnosticStatus::Pass,
                DiagnosticDetail::Connected,
            );
            report.record(
                DiagnosticStep::Authenticate,
                DiagnosticStatus::Pass,
                DiagnosticDetail::Authenticated,
            );
        }
        Err((ConnectionState::Authenticating, err)) => {
            report.record(
                DiagnosticStep::Connect,
                DiagnosticStatus::Pass,
                DiagnosticDetail::Connected,
            );
            report.record(
                DiagnosticStep::Authenticate,
                DiagnosticStatus::Fail,
                detail_for(&err),
            );
            report.skip_remaining(DiagnosticStep::Authenticate);
            return report;
        }
        Err((_, err)) => {
            report.record(DiagnosticStep::Connect, DiagnosticStatus::Fail, detail_for(&err));
            report.skip_remaining(DiagnosticStep::Connect);
            return report;
        }
    }

    for (step, opcode, payload, expects_ack) in plan.command_steps() {
        match dispatcher.command(opcode, payload.as_slice()).await {
            Ok(response) if expects_ack && response.first() != Some(1) => {
                report.record(step, DiagnosticStatus::Fail, DiagnosticDetail::Refused(response))
            }
            Ok(response) => {
                report.record(step, DiagnosticStatus::Pass, DiagnosticDetail::Response(response))
            }
            Err(err) => report.record(step, DiagnosticStatus::Fail, detail_for(&err)),
        }
    }

    report
}

fn detail_for<E: core::fmt::Debug>(err: &CommandError<E>) -> DiagnosticDetail {
    match err {
        CommandError::Timeout {
            attempts,
            elapsed_ms,
            ..
        } => DiagnosticDetail::TimedOut {
            attempts: *attempts,
            elapsed_ms: *elapsed_ms,
        },
        other => DiagnosticDetail::Failed(other.kind()),
    }
}
