//! Redmond SkyCooker vocabulary and client built on the session engine.
pub mod commands;
pub mod cooker;
pub mod status;
