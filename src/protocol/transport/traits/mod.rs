//! Abstraction traits used by the transport layer (BLE link and timer).
pub mod ble_link;
pub mod cooker_timer;
