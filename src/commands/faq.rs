use tracing::info;

use super::Request;
use crate::error::AppError;
use crate::event::image_marker;
use crate::state::State;

const PREFIX: &str = "#faq";

fn help() -> String {
    "FAQ usage:\n\
     #faq <key> - Show an entry\n\
     #faq edit <key> <contents> - Create or replace an entry; attached images are saved locally\n\
     #faq delete <key> - Remove an entry\n\
     #faq list - List entry keys\n\
     #faq help - Show this message"
        .to_string()
}

/// Split at the first run of whitespace.
fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim_start()),
        None => (s, ""),
    }
}

pub(super) async fn handle(state: &State, req: &Request) -> Result<String, AppError> {
    let rest = req.text.strip_prefix(PREFIX).unwrap_or("");
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Ok(help());
    }
    let (sub, args) = split_word(rest.trim());
    match sub {
        "" | "help" => Ok(help()),
        "list" => cmd_list(state),
        "edit" => cmd_edit(state, req, args).await,
        "delete" => cmd_delete(state, req, args),
        _ => cmd_query(state, rest.trim()),
    }
}

fn cmd_query(state: &State, key: &str) -> Result<String, AppError> {
    let key = key.to_lowercase();
    Ok(match state.stores.faq.get(&key)? {
        Some(entry) => format!("FAQ [{}]:\n\n{}", entry.key, entry.contents),
        None => format!("No FAQ entry: {key}"),
    })
}

fn cmd_list(state: &State) -> Result<String, AppError> {
    let keys = state.stores.faq.keys()?;
    if keys.is_empty() {
        return Ok("No FAQ entries yet.".to_string());
    }
    Ok(format!("FAQ entries:\n{}", keys.join("\n")))
}

async fn cmd_edit(state: &State, req: &Request, args: &str) -> Result<String, AppError> {
    let (key, contents) = split_word(args);
    if key.is_empty() || (contents.is_empty() && req.images.is_empty()) {
        return Ok("Usage: #faq edit <key> <contents>".to_string());
    }
    let key = key.to_lowercase();

    let mut body = contents.to_string();
    for url in &req.images {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(&image_marker(url));
    }

    let localized = state.localizer.localize(&state.media, &body).await;
    state.stores.faq.set(&key, &localized.text)?;
    info!(
        key = %key,
        fetched = localized.fetched,
        failed = localized.failed,
        "FAQ entry saved"
    );
    crate::audit::log_action(&state.config.db_path, "faq_edit", &key, &req.user_id.to_string());

    let mut reply = format!("FAQ [{key}] updated.");
    if localized.fetched > 0 {
        reply.push_str(&format!(" Saved {} image(s).", localized.fetched));
    }
    if localized.failed > 0 {
        reply.push_str(&format!(
            " {} image(s) could not be saved and were kept as links.",
            localized.failed
        ));
    }
    Ok(reply)
}

fn cmd_delete(state: &State, req: &Request, args: &str) -> Result<String, AppError> {
    let key = args.trim().to_lowercase();
    if key.is_empty() {
        return Ok("Usage: #faq delete <key>".to_string());
    }
    if !state.stores.faq.delete(&key)? {
        return Ok(format!("No FAQ entry: {key}"));
    }
    info!(key = %key, "FAQ entry deleted");
    crate::audit::log_action(&state.config.db_path, "faq_delete", &key, &req.user_id.to_string());
    Ok(format!("FAQ [{key}] deleted."))
}
