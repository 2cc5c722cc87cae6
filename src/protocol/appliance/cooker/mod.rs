//! High-level SkyCooker client: typed helpers over the raw dispatcher, a
//! cached status snapshot and link-quality statistics.
use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::HistoryBuffer;

use crate::core::Payload;
use crate::error::{CommandError, CookerError};
use crate::protocol::{
    appliance::{
        commands::{
            limit_temperature, CookingMode, ModelFamily, COOKING_TIME_RANGE, DELAY_TIME_RANGE,
            OP_GET_STATUS, OP_GET_VERSION,
            OP_SET_COOKING_TIME, OP_SET_DELAY_TIME, OP_SET_MAIN_MODE, OP_SET_POST_HEAT,
            OP_SET_TEMPERATURE, OP_TURN_OFF, OP_TURN_ON,
        },
        status::{CookerStatus, FirmwareVersion},
    },
    diagnostics::{run_diagnostics, DiagnosticPlan, DiagnosticReport},
    session::dispatcher::Dispatcher,
    transport::{
        traits::{ble_link::BleLink, cooker_timer::CookerTimer},
        INBOX_CAPACITY,
    },
};

/// Number of update outcomes kept for [`Cooker::success_rate`].
pub const STATS_WINDOW: usize = 100;

/// Reply flag acknowledging a write command.
const ACK: u8 = 1;

/// SkyCooker multicooker bound to one dispatcher session.
pub struct Cooker<'a, M, L, T, const N: usize = INBOX_CAPACITY>
where
    M: RawMutex,
    L: BleLink,
    T: CookerTimer,
{
    dispatcher: Dispatcher<'a, M, L, T, N>,
    family: ModelFamily,
    /// Keep the link up between updates.
    persistent: bool,
    /// Last successfully decoded status.
    status: Option<CookerStatus>,
    /// Firmware version, fetched once per instance.
    version: Option<FirmwareVersion>,
    available: bool,
    /// `true` per successful update, `false` per failed one.
    successes: HistoryBuffer<bool, STATS_WINDOW>,
}

impl<'a, M, L, T, const N: usize> Cooker<'a, M, L, T, N>
where
    M: RawMutex,
    L: BleLink,
    T: CookerTimer,
{
    /// Bind `dispatcher` to a cooker of the given retail `model`.
    ///
    /// Fails with [`CookerError::UnknownModel`] when no protocol family
    /// covers the model.
    pub fn new(
        dispatcher: Dispatcher<'a, M, L, T, N>,
        model: &str,
        persistent: bool,
    ) -> Result<Self, CookerError<L::Error>> {
        let family = ModelFamily::from_model(model).ok_or(CookerError::UnknownModel)?;
        Ok(Self {
            dispatcher,
            family,
            persistent,
            status: None,
            version: None,
            available: false,
            successes: HistoryBuffer::new(),
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher<'a, M, L, T, N> {
        &self.dispatcher
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn persistent(&self) -> bool {
        self.persistent
    }

    pub fn set_persistent(&mut self, persistent: bool) {
        self.persistent = persistent;
    }

    //==============================================================================Commands

    pub async fn get_status(&self) -> Result<CookerStatus, CookerError<L::Error>> {
        let reply = self.dispatcher.command(OP_GET_STATUS, &[]).await?;
        CookerStatus::parse(reply.as_slice())
            .ok_or(CookerError::StatusTooShort { len: reply.len() })
    }

    pub async fn get_version(&self) -> Result<FirmwareVersion, CookerError<L::Error>> {
        let reply = self.dispatcher.command(OP_GET_VERSION, &[]).await?;
        FirmwareVersion::parse(reply.as_slice()).ok_or(CookerError::BadVersion { len: reply.len() })
    }

    pub async fn turn_on(&self) -> Result<(), CookerError<L::Error>> {
        self.write(OP_TURN_ON, &[]).await
    }

    pub async fn turn_off(&self) -> Result<(), CookerError<L::Error>> {
        self.write(OP_TURN_OFF, &[]).await
    }

    /// Start `mode` at `temperature` °C for `hours:minutes`.
    /// [`CookingMode::Off`] powers the cooker down instead.
    pub async fn set_main_mode(
        &self,
        mode: CookingMode,
        temperature: u8,
        hours: u8,
        minutes: u8,
    ) -> Result<(), CookerError<L::Error>> {
        if mode == CookingMode::Off {
            return self.turn_off().await;
        }
        self.write(
            OP_SET_MAIN_MODE,
            &[mode.code(), 0, temperature, hours, minutes, 0],
        )
        .await
    }

    /// Set the target temperature, clamped to the supported range.
    pub async fn set_temperature(&self, celsius: u8) -> Result<(), CookerError<L::Error>> {
        self.write(OP_SET_TEMPERATURE, &[limit_temperature(celsius)])
            .await
    }

    /// Set the cooking duration; 1 min to 24 h.
    pub async fn set_cooking_time(&self, hours: u8, minutes: u8) -> Result<(), CookerError<L::Error>> {
        check_duration(hours, minutes, &COOKING_TIME_RANGE)?;
        self.write(OP_SET_COOKING_TIME, &[hours, minutes]).await
    }

    /// Program a delayed start: the appliance expects the total of the wait
    /// and the cooking time. The wait and the cooking time must each be
    /// between 1 min and 24 h.
    pub async fn set_delay_time(
        &self,
        wait_hours: u8,
        wait_minutes: u8,
        hours: u8,
        minutes: u8,
    ) -> Result<(), CookerError<L::Error>> {
        check_duration(wait_hours, wait_minutes, &DELAY_TIME_RANGE)?;
        check_duration(hours, minutes, &COOKING_TIME_RANGE)?;
        let (total_hours, total_minutes) = delay_total(wait_hours, wait_minutes, hours, minutes);
        self.write(OP_SET_DELAY_TIME, &[total_hours, total_minutes])
            .await
    }

    pub async fn set_post_heat(&self, enabled: bool) -> Result<(), CookerError<L::Error>> {
        self.write(OP_SET_POST_HEAT, &[enabled as u8]).await
    }

    /// Send a write command and check the acknowledgement flag.
    async fn write(&self, opcode: u8, payload: &[u8]) -> Result<(), CookerError<L::Error>> {
        let reply: Payload = self.dispatcher.command(opcode, payload).await?;
        if reply.first() != Some(ACK) {
            #[cfg(feature = "defmt")]
            defmt::error!("Opcode 0x{:02X} refused by cooker", opcode);
            return Err(CookerError::Refused { opcode });
        }
        Ok(())
    }

    //==============================================================================Targets

    /// Temperature reported by the last update.
    pub fn target_temperature(&self) -> Option<u8> {
        self.status.map(|status| status.target_temperature)
    }

    /// Program reported by the last update, `None` while powered down.
    pub fn target_mode(&self) -> Option<CookingMode> {
        self.status
            .and_then(|status| status.cooking_mode())
            .filter(|mode| *mode != CookingMode::Off)
    }

    /// Cook at `celsius` (clamped) in `mode`, or in the running program when
    /// `mode` is `None`; an idle cooker starts multicook. Nothing is written
    /// when the last update already reported `celsius`. Refreshes the status
    /// afterwards.
    pub async fn set_target_temperature(
        &mut self,
        celsius: u8,
        mode: Option<CookingMode>,
    ) -> Result<(), CookerError<L::Error>> {
        if self.target_temperature() == Some(celsius) {
            return Ok(());
        }
        let mode = mode
            .or_else(|| self.target_mode())
            .unwrap_or(CookingMode::Multicook);
        #[cfg(feature = "defmt")]
        defmt::info!("Target temperature {} in mode 0x{:02X}", celsius, mode.code());
        self.apply_target(mode, limit_temperature(celsius)).await
    }

    /// Switch to `mode` with the program's own defaults, then refresh the
    /// status. Nothing is written when the cooker already runs `mode`.
    pub async fn set_target_mode(&mut self, mode: CookingMode) -> Result<(), CookerError<L::Error>> {
        let current = self
            .status
            .map(|status| status.cooking_mode().unwrap_or(CookingMode::Off));
        if current == Some(mode) {
            return Ok(());
        }
        self.apply_target(mode, 0).await
    }

    async fn apply_target(&mut self, mode: CookingMode, celsius: u8) -> Result<(), CookerError<L::Error>> {
        self.set_main_mode(mode, celsius, 0, 0).await?;
        self.update().await.map(|_| ())
    }

    //==============================================================================Polling

    /// Refresh the cached status.
    ///
    /// The firmware version is fetched on the first successful update; a
    /// failure there is logged and does not fail the update. Every outcome
    /// except a rejected pairing key is recorded in the success window.
    pub async fn update(&mut self) -> Result<CookerStatus, CookerError<L::Error>> {
        match self.poll().await {
            Ok(status) => {
                self.status = Some(status);
                self.available = true;
                self.successes.write(true);
                if !self.persistent {
                    self.dispatcher.disconnect().await;
                }
                Ok(status)
            }
            Err(err) => {
                self.available = false;
                if !matches!(err, CookerError::Command(CommandError::Auth)) {
                    self.successes.write(false);
                }
                #[cfg(feature = "defmt")]
                defmt::warn!("Cooker update failed, dropping link");
                self.dispatcher.disconnect().await;
                Err(err)
            }
        }
    }

    async fn poll(&mut self) -> Result<CookerStatus, CookerError<L::Error>> {
        self.dispatcher.ensure_ready().await?;
        if self.version.is_none() {
            match self.get_version().await {
                Ok(version) => self.version = Some(version),
                Err(_err) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Firmware version unavailable");
                }
            }
        }
        self.get_status().await
    }

    /// Status cached by the last successful [`update`](Self::update).
    pub fn status(&self) -> Option<&CookerStatus> {
        self.status.as_ref()
    }

    pub fn version(&self) -> Option<FirmwareVersion> {
        self.version
    }

    /// Whether the last update succeeded.
    pub fn available(&self) -> bool {
        self.available
    }

    /// Percentage of successful updates over the last [`STATS_WINDOW`] ones,
    /// `0` before the first update.
    pub fn success_rate(&self) -> u8 {
        let total = self.successes.len();
        if total == 0 {
            return 0;
        }
        let ok = self.successes.as_slice().iter().filter(|ok| **ok).count();
        (ok * 100 / total) as u8
    }

    /// Run the default self-test script on this session.
    pub async fn test_connection(&self) -> DiagnosticReport {
        run_diagnostics(&self.dispatcher, &DiagnosticPlan::default()).await
    }

    /// Disconnect for good.
    pub async fn dispose(&self) {
        self.dispatcher.dispose().await;
    }
}

fn check_duration<E: core::fmt::Debug>(
    hours: u8,
    minutes: u8,
    range: &core::ops::RangeInclusive<u16>,
) -> Result<(), CookerError<E>> {
    let total = hours as u16 * 60 + minutes as u16;
    if range.contains(&total) {
        Ok(())
    } else {
        Err(CookerError::TimeOutOfRange { minutes: total })
    }
}

/// Sum of wait and cooking time, minutes carried into hours.
fn delay_total(wait_hours: u8, wait_minutes: u8, hours: u8, minutes: u8) -> (u8, u8) {
    let mut total_hours = wait_hours.saturating_add(hours);
    let mut total_minutes = wait_minutes.saturating_add(minutes);
    if total_minutes >= 60 {
        total_hours = total_hours.saturating_add(total_minutes / 60);
        total_minutes %= 60;
    }
    (total_hours, total_minutes)
}
