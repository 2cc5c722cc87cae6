//! BLE transport layer: wire framing, the response inbox fed by GATT
//! notifications, and the link/timer abstraction traits.
//!
//! ## SkyCooker GATT layout
//!
//! The appliance exposes a Nordic UART-style service. Frames are written to
//! the TX characteristic and answered through notifications on the RX
//! characteristic.

pub mod frame;
pub mod inbox;
pub mod traits;

/// GATT service exposed by the appliance.
pub const UUID_SERVICE: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";

/// Characteristic the host writes command frames to.
pub const UUID_TX: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

/// Characteristic the appliance notifies responses on.
pub const UUID_RX: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";

/// Default number of frames buffered between the notify callback and the waiter.
///
/// The channel is single-slot, so more than one frame in flight only happens
/// with late or duplicated notifications. Four leaves room for those without
/// holding stale data for long.
pub const INBOX_CAPACITY: usize = 4;
