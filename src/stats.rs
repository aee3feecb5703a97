use crate::helpers::format_duration_human;
use crate::state::State;
use std::sync::atomic::Ordering;
use tracing::warn;

const RECENT_AUDIT_LIMIT: usize = 20;

pub(crate) fn build_health_json(state: &State) -> serde_json::Value {
    let uptime = state.metrics.start_time.elapsed().as_secs();
    serde_json::json!({
        "status": "ok",
        "uptime_secs": uptime,
        "uptime": format_duration_human(uptime),
        "started_at": state.metrics.started_at.to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    })
}

pub(crate) fn build_stats_json(state: &State) -> serde_json::Value {
    let m = &state.metrics;
    let recent = crate::audit::recent_actions(&state.config.db_path, RECENT_AUDIT_LIMIT)
        .unwrap_or_else(|e| {
            warn!("Failed to read audit log: {e}");
            Vec::new()
        });
    serde_json::json!({
        "uptime_secs": m.start_time.elapsed().as_secs(),
        "events_received": m.events_received.load(Ordering::Relaxed),
        "events_ignored": m.events_ignored.load(Ordering::Relaxed),
        "commands_handled": m.commands_handled.load(Ordering::Relaxed),
        "commands_denied": m.commands_denied.load(Ordering::Relaxed),
        "handler_failures": m.handler_failures.load(Ordering::Relaxed),
        "reply_failures": m.reply_failures.load(Ordering::Relaxed),
        "monitored_groups": state.groups.monitored.len(),
        "api_url": state.config.api_url,
        "data_dir": state.config.data_dir.display().to_string(),
        "commands": state.table.entries().len(),
        "recent_audit": recent,
        "version": env!("CARGO_PKG_VERSION"),
    })
}

pub(crate) fn build_prometheus_metrics(state: &State) -> String {
    let m = &state.metrics;
    let uptime = m.start_time.elapsed().as_secs();
    let received = m.events_received.load(Ordering::Relaxed);
    let ignored = m.events_ignored.load(Ordering::Relaxed);
    let handled = m.commands_handled.load(Ordering::Relaxed);
    let denied = m.commands_denied.load(Ordering::Relaxed);
    let failed = m.handler_failures.load(Ordering::Relaxed);
    let reply_failed = m.reply_failures.load(Ordering::Relaxed);
    format!(
        "# HELP qqbot_uptime_seconds Bot uptime in seconds\n\
         # TYPE qqbot_uptime_seconds gauge\n\
         qqbot_uptime_seconds {uptime}\n\
         # HELP qqbot_events_total Webhook events received\n\
         # TYPE qqbot_events_total counter\n\
         qqbot_events_total {received}\n\
         # HELP qqbot_events_ignored_total Events dropped before command matching\n\
         # TYPE qqbot_events_ignored_total counter\n\
         qqbot_events_ignored_total {ignored}\n\
         # HELP qqbot_commands_handled_total Commands whose handler completed\n\
         # TYPE qqbot_commands_handled_total counter\n\
         qqbot_commands_handled_total {handled}\n\
         # HELP qqbot_commands_denied_total Commands refused by group permissions\n\
         # TYPE qqbot_commands_denied_total counter\n\
         qqbot_commands_denied_total {denied}\n\
         # HELP qqbot_handler_failures_total Handlers that returned an error or panicked\n\
         # TYPE qqbot_handler_failures_total counter\n\
         qqbot_handler_failures_total {failed}\n\
         # HELP qqbot_reply_failures_total Replies the chat API did not accept\n\
         # TYPE qqbot_reply_failures_total counter\n\
         qqbot_reply_failures_total {reply_failed}\n"
    )
}
