//! Error types for streak-reminder

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Send rejected ({status}): {body}")]
    SendRejected { status: u16, body: String },

    #[error("Invalid recipient: {0:?}")]
    InvalidRecipient(String),

    #[error("Schedule error: {0}")]
    Schedule(#[from] cron::error::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Registry lock poisoned")]
    LockPoisoned,

    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
