//! Protocol stack: link framing and transport abstractions, the session
//! engine, the diagnostic runner and the SkyCooker appliance layer.
pub mod appliance;
pub mod diagnostics;
pub mod session;
pub mod transport;
