//! Key storage module.
//!
//! This module provides keystore entries, the alias-addressed container that
//! holds them, and the backend that persists the container to disk.

pub mod backend;
pub mod container;
pub mod entry;
