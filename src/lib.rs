//! Firmware Registry - versioned firmware storage with webhook notifications

pub mod engine;
