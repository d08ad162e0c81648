//! Core domain + application logic for the Raindrop stream bot.
//!
//! This crate is intentionally framework-agnostic. The chat platform lives
//! behind ports (`RequestContext`, `NotificationSink`) implemented in adapter
//! crates; persisted state lives behind `DataStore`.

pub mod access;
pub mod command;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod security;
pub mod service;
pub mod store;
pub mod streams;
pub mod utils;

pub use errors::{Error, Result};
