//! Session engine: connection lifecycle, timeout/retry policy, adaptive
//! response polling and the command dispatcher tying them together.
pub mod connection;
pub mod dispatcher;
pub mod policy;
pub mod waiter;
