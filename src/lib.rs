//! Streak Reminder - Messenger webhook relay
//!
//! Users opt in by messaging "remind streak"; once a day every opted-in
//! recipient gets a reminder pushed through the platform send API.

pub mod command;
pub mod config;
pub mod error;
pub mod fanout;
pub mod notifier;
pub mod registry;
pub mod schedule;
pub mod webhook;

pub use error::{Error, Result};
