use tracing::{info, warn};

use super::{at_code, Request};
use crate::error::AppError;
use crate::state::State;

/// `.aql <account>`: dynamic-code groups ask the code provider using the
/// account's stored token; every other group reads the static code table.
pub(super) async fn cmd_query(state: &State, req: &Request, account: &str) -> String {
    let mention = at_code(req.user_id);
    if account.is_empty() {
        return format!("{mention} Usage: .aql <account>");
    }

    if !state.groups.dynamic_code_groups.contains(&req.group_id) {
        return match state.stores.codes.load().get(account) {
            Some(code) => format!("{mention} {code}"),
            None => format!("{mention} Unknown account"),
        };
    }

    let Some(token) = state.stores.tokens.load().get(account).cloned() else {
        return format!("{mention} Unknown account");
    };
    let Some(codes) = state.code_api.as_deref() else {
        warn!(group_id = req.group_id, "Dynamic code requested but no provider is configured");
        return format!("{mention} Failed to fetch dynamic code");
    };
    match codes.dynamic_code(&token).await {
        Ok(Some(code)) => format!("{mention} {code}"),
        Ok(None) => format!("{mention} Failed to fetch dynamic code"),
        Err(e) => {
            warn!(account = %account, "Dynamic code lookup failed: {e}");
            format!("{mention} Failed to fetch dynamic code")
        }
    }
}

/// `.aqladd <account> <secret>`: store a provider token. Only dynamic-code
/// groups keep tokens.
pub(super) fn cmd_add(state: &State, req: &Request, args: &str) -> Result<String, AppError> {
    let mut parts = args.split_whitespace();
    let (Some(account), Some(secret)) = (parts.next(), parts.next()) else {
        return Ok("Usage: .aqladd <account> <secret>".to_string());
    };
    if !state.groups.dynamic_code_groups.contains(&req.group_id) {
        return Ok("Adding accounts is not supported in this group.".to_string());
    }
    state.stores.tokens.update(|tokens| {
        tokens.insert(account.to_string(), secret.to_string());
        (true, ())
    })?;
    info!(group_id = req.group_id, account = %account, "Stored account token");
    crate::audit::log_action(&state.config.db_path, "aqladd", account, &req.user_id.to_string());
    Ok(format!("Saved token for {account}"))
}
