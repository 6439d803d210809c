//! TLS integration module.
//!
//! This module turns keystore contents into rustls key managers and client
//! and server configurations.

pub mod config;
pub mod key_manager;
