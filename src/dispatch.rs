use futures_util::FutureExt;
use serde_json::Value;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info};

use crate::commands::{self, Request};
use crate::event::{parse_group_message, Rejection};
use crate::helpers::truncate;
use crate::permissions::Decision;
use crate::state::{Metrics, State};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IgnoreReason {
    NotGroupMessage,
    Unmonitored,
    EmptyText,
}

/// Terminal state of one inbound event.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    Ignored(IgnoreReason),
    NoMatch,
    Denied { command: &'static str },
    Handled { command: &'static str },
    Failed { command: &'static str, error: String },
}

impl Outcome {
    /// Plain-text body acknowledging the webhook. Every outcome is a 200.
    pub(crate) fn ack(&self) -> &'static str {
        match self {
            Self::Ignored(IgnoreReason::NotGroupMessage) => "Not a group message event",
            Self::Ignored(IgnoreReason::Unmonitored) => "Group not monitored",
            Self::Ignored(IgnoreReason::EmptyText) => "Empty message",
            Self::Denied { .. } => "Command not permitted for this group",
            Self::NoMatch | Self::Handled { .. } | Self::Failed { .. } => "OK",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignored(reason) => write!(f, "ignored ({reason:?})"),
            Self::NoMatch => write!(f, "no match"),
            Self::Denied { command } => write!(f, "denied {command}"),
            Self::Handled { command } => write!(f, "handled {command}"),
            Self::Failed { command, error } => write!(f, "failed {command}: {error}"),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn ignore(state: &State, reason: IgnoreReason) -> Outcome {
    Metrics::bump(&state.metrics.events_ignored);
    Outcome::Ignored(reason)
}

/// Run one webhook payload through the pipeline. At most one handler is
/// invoked; its errors and panics are contained here.
pub(crate) async fn dispatch(state: &State, payload: &Value) -> Outcome {
    Metrics::bump(&state.metrics.events_received);

    let msg = match parse_group_message(payload) {
        Ok(msg) => msg,
        Err(Rejection::NotGroupMessage) => {
            debug!("Ignoring non-group event");
            return ignore(state, IgnoreReason::NotGroupMessage);
        }
        Err(Rejection::Malformed(e)) => {
            info!("Ignoring undecodable event: {e}");
            return ignore(state, IgnoreReason::NotGroupMessage);
        }
    };

    if !state.groups.monitored.contains(&msg.group_id) {
        debug!(group_id = msg.group_id, "Group not monitored");
        return ignore(state, IgnoreReason::Unmonitored);
    }

    let text = msg.text();
    if text.is_empty() {
        debug!(group_id = msg.group_id, "No text in message");
        return ignore(state, IgnoreReason::EmptyText);
    }

    let Some(entry) = state.table.match_command(&text) else {
        debug!(group_id = msg.group_id, text = %truncate(&text, 40), "No command matched");
        return Outcome::NoMatch;
    };
    let command = entry.prefix;

    if let Decision::Deny(reason) = state.groups.policy.authorize(msg.group_id, entry) {
        info!(group_id = msg.group_id, command = %command, "Command denied: {reason}");
        Metrics::bump(&state.metrics.commands_denied);
        crate::audit::log_action(
            &state.config.db_path,
            "denied",
            &msg.group_id.to_string(),
            &format!("{command}: {reason}"),
        );
        return Outcome::Denied { command };
    }

    info!(
        group_id = msg.group_id,
        user_id = msg.user_id,
        command = %command,
        text = %truncate(&text, 80),
        "Dispatching command"
    );
    let req = Request {
        group_id: msg.group_id,
        user_id: msg.user_id,
        images: msg.image_urls(),
        text,
    };

    let result = AssertUnwindSafe(commands::invoke(state, entry, &req))
        .catch_unwind()
        .await;
    let error = match result {
        Ok(Ok(())) => {
            Metrics::bump(&state.metrics.commands_handled);
            return Outcome::Handled { command };
        }
        Ok(Err(e)) => e.to_string(),
        Err(panic) => format!("handler panicked: {}", panic_message(panic.as_ref())),
    };
    error!(group_id = req.group_id, command = %command, "Handler failed: {error}");
    Metrics::bump(&state.metrics.handler_failures);
    crate::audit::log_action(
        &state.config.db_path,
        "handler_failed",
        &req.group_id.to_string(),
        &format!("{command}: {error}"),
    );
    Outcome::Failed { command, error }
}
