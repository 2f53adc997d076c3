// Firmware Registry Engine - Core module structure
pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod firmware;
pub mod logging;
pub mod migrations;
pub mod server;
pub mod version;
pub mod webhook;

pub use config::Config;
pub use database::Database;
