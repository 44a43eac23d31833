//! Core domain + dispatch logic for the pibot remote-control agent.
//!
//! This crate is intentionally framework-agnostic. Telegram and the host OS
//! live behind ports (traits) implemented in adapter crates.

pub mod access;
pub mod agent;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod system;

pub use errors::{Error, Result};
