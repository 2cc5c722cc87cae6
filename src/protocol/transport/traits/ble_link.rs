//! Minimal abstraction for the BLE GATT link to the appliance. Allows the
//! engine to plug into any central stack (host Bluetooth daemon, embedded
//! softdevice, test double).
use futures_util::Future;

/// How a transport error affects the exchange that hit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkFault {
    /// Link momentarily busy; the write can be retried as is.
    Busy,
    /// The peer rejected the write; retried like a missed response.
    Rejected,
    /// The link dropped; the next attempt reconnects first.
    Disconnected,
    /// Unrecoverable driver failure; surfaced without retry.
    Fatal,
}

/// Contract for the write/notify characteristic pair of one appliance.
///
/// Notifications are not part of the trait: the integrator's notify callback
/// pushes them into the [`ResponseInbox`](crate::protocol::transport::inbox::ResponseInbox).
pub trait BleLink {
    type Error: core::fmt::Debug;

    /// Open the GATT connection and subscribe to notifications.
    fn connect<'a>(&'a mut self) -> impl Future<Output = Result<(), Self::Error>> + 'a;

    /// Close the connection. Best effort and idempotent.
    fn disconnect<'a>(&'a mut self) -> impl Future<Output = ()> + 'a;

    /// Write one frame to the TX characteristic.
    fn write<'a>(
        &'a mut self,
        frame: &'a [u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;

    /// Whether the underlying connection is still up.
    fn is_connected(&self) -> bool;

    /// Map a driver error onto the engine's retry classes.
    fn classify(error: &Self::Error) -> LinkFault;
}
