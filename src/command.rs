//! Command interpreter - opt-in via the trigger phrase

use crate::config::{ACTIVATED_REPLY, ALREADY_SIGNED_UP_REPLY, TRIGGER_PHRASE};
use crate::notifier::Notifier;
use crate::registry::SharedRegistry;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info, warn};

static TRIGGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("(?i){}", regex::escape(TRIGGER_PHRASE))).expect("Invalid trigger regex")
});

/// Commands recognized in inbound messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    OptIn,
}

/// What happened to an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Activated,
    AlreadySignedUp,
    Ignored,
    Failed,
}

/// Detect a command anywhere in the message text
pub fn parse_command(text: &str) -> Option<Command> {
    if TRIGGER.is_match(text) {
        Some(Command::OptIn)
    } else {
        None
    }
}

/// Act on one inbound message: register the sender and acknowledge.
///
/// The acknowledgment is best-effort; a failed reply does not change the outcome.
pub async fn handle_message(
    registry: &SharedRegistry,
    notifier: &dyn Notifier,
    sender: &str,
    text: &str,
) -> Outcome {
    let Some(Command::OptIn) = parse_command(text) else {
        debug!("No command in message from {}", sender);
        return Outcome::Ignored;
    };

    if sender.is_empty() {
        warn!("Opt-in request without sender id, ignoring");
        return Outcome::Ignored;
    }

    let (outcome, reply) = match registry.add(sender).await {
        Ok(true) => {
            info!("Streak reminder activated for {}", sender);
            (Outcome::Activated, ACTIVATED_REPLY)
        }
        Ok(false) => {
            info!("{} is already signed up", sender);
            (Outcome::AlreadySignedUp, ALREADY_SIGNED_UP_REPLY)
        }
        Err(e) => {
            error!("Failed to register {}: {}", sender, e);
            return Outcome::Failed;
        }
    };

    // Errors are already logged by the notifier
    let _ = notifier.send(sender, reply).await;

    outcome
}
