//! `skycooker-link` library: a `no_std` command/response engine driving
//! Redmond SkyCooker multicookers over a BLE write/notify characteristic
//! pair. The link driver and the clock are supplied through traits; the
//! crate provides framing, the connection state machine, adaptive response
//! polling, the retrying dispatcher, diagnostics and the appliance client.
#![no_std]
//==================================================================================
/// Shared data model: frame buffers, command descriptors, exchange records.
pub mod core;
/// Errors per layer (framing, dispatcher, appliance, configuration).
pub mod error;
/// Transport, session engine, diagnostics and appliance vocabulary.
pub mod protocol;
//==================================================================================
