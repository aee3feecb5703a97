use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

use super::{at_code, Request, Scalar};
use crate::error::AppError;
use crate::state::State;

/// Mention directory: `QQ` maps a person's name to their number, `nickname`
/// maps a group nickname to names, numbers or other nicknames.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub(crate) struct AtBook {
    #[serde(rename = "QQ", default)]
    pub(crate) qq: BTreeMap<String, Scalar>,
    #[serde(default)]
    pub(crate) nickname: BTreeMap<String, Vec<Scalar>>,
}

impl AtBook {
    /// Resolve names to QQ numbers in first-seen order. Nicknames expand
    /// recursively, each at most once; bare numbers stand for themselves.
    pub(crate) fn resolve(&self, names: &[&str]) -> Vec<String> {
        let mut queue: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let mut expanded = HashSet::new();
        let mut out: Vec<String> = Vec::new();
        let mut i = 0;
        while i < queue.len() {
            let name = queue[i].clone();
            i += 1;
            let qq = if let Some(qq) = self.qq.get(&name) {
                Some(qq.to_string())
            } else if let Some(members) = self.nickname.get(&name) {
                if expanded.insert(name) {
                    queue.extend(members.iter().map(Scalar::to_string));
                }
                None
            } else if !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) {
                Some(name)
            } else {
                None
            };
            if let Some(qq) = qq {
                if !out.contains(&qq) {
                    out.push(qq);
                }
            }
        }
        out
    }
}

/// `#at` is registered ahead of `#atadd`, `#atls` and `#atdel`, so it also
/// receives their traffic and routes it here.
pub(super) fn handle(state: &State, req: &Request) -> Result<Option<String>, AppError> {
    let text = req.text.as_str();
    if text.starts_with("#atadd") {
        return cmd_add(state, req.args("#atadd")).map(Some);
    }
    if text.starts_with("#atls") {
        return Ok(Some(cmd_list(state)));
    }
    if text.starts_with("#atdel") {
        return cmd_delete(state, req.args("#atdel")).map(Some);
    }
    let Some(rest) = text.strip_prefix("#at") else {
        return Ok(None);
    };
    if !rest.starts_with(char::is_whitespace) || rest.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(cmd_mention(state, req.user_id, rest)))
}

fn cmd_mention(state: &State, sender: i64, names: &str) -> String {
    let names: Vec<&str> = names.split_whitespace().collect();
    let sender = sender.to_string();
    let codes: String = state
        .stores
        .at
        .load()
        .resolve(&names)
        .into_iter()
        .filter(|qq| *qq != sender)
        .map(at_code)
        .collect();
    if codes.is_empty() {
        "Nobody to mention.".to_string()
    } else {
        codes
    }
}

pub(super) fn cmd_add(state: &State, args: &str) -> Result<String, AppError> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let [nick, members @ ..] = parts.as_slice() else {
        return Ok("Usage: #atadd <nickname> <member> [member...]".to_string());
    };
    if members.is_empty() {
        return Ok("Usage: #atadd <nickname> <member> [member...]".to_string());
    }
    state.stores.at.update(|book| {
        let entry = book.nickname.entry(nick.to_string()).or_default();
        for m in members {
            let m = Scalar::Text(m.to_string());
            if !entry.iter().any(|e| e.to_string() == m.to_string()) {
                entry.push(m);
            }
        }
        info!(nickname = %nick, members = entry.len(), "Nickname updated");
        (true, format!("Nickname {nick} now includes {}", members.join(", ")))
    })
}

pub(super) fn cmd_list(state: &State) -> String {
    let book = state.stores.at.load();
    if book.nickname.is_empty() {
        return "No nicknames configured.".to_string();
    }
    book.nickname
        .iter()
        .map(|(nick, members)| {
            let members: Vec<String> = members.iter().map(Scalar::to_string).collect();
            format!("{nick}: {}", members.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(super) fn cmd_delete(state: &State, args: &str) -> Result<String, AppError> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let [nick, members @ ..] = parts.as_slice() else {
        return Ok("Usage: #atdel <nickname> [member...]".to_string());
    };
    state.stores.at.update(|book| {
        if members.is_empty() {
            return match book.nickname.remove(*nick) {
                Some(_) => (true, format!("Deleted nickname {nick}")),
                None => (false, format!("No nickname {nick}")),
            };
        }
        let Some(entry) = book.nickname.get_mut(*nick) else {
            return (false, format!("No nickname {nick}"));
        };
        let mut missing = Vec::new();
        for m in members {
            match entry.iter().position(|e| e.to_string() == *m) {
                Some(pos) => {
                    entry.remove(pos);
                }
                None => missing.push(*m),
            }
        }
        let removed = members.len() - missing.len();
        let mut reply = format!("Removed {removed} member(s) from {nick}");
        if !missing.is_empty() {
            reply.push_str(&format!("; not found: {}", missing.join(", ")));
        }
        (removed > 0, reply)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> AtBook {
        serde_json::from_value(serde_json::json!({
            "QQ": {"alice": 111, "bob": "222", "carol": 333},
            "nickname": {
                "team": ["alice", "bob"],
                "all": ["team", "carol", "all"],
                "raw": ["444", 555]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_resolve_names_and_numbers() {
        let b = book();
        assert_eq!(b.resolve(&["alice", "999"]), vec!["111", "999"]);
    }

    #[test]
    fn test_resolve_nested_nicknames_dedup() {
        let b = book();
        let mut got = b.resolve(&["all", "bob"]);
        got.sort();
        assert_eq!(got, vec!["111", "222", "333"]);
    }

    #[test]
    fn test_resolve_self_referencing_nickname_terminates() {
        let b = book();
        assert_eq!(b.resolve(&["all"]).len(), 3);
    }

    #[test]
    fn test_resolve_numeric_members() {
        let b = book();
        assert_eq!(b.resolve(&["raw"]), vec!["444", "555"]);
    }

    #[test]
    fn test_resolve_unknown_is_skipped() {
        let b = book();
        assert!(b.resolve(&["nobody", "12ab"]).is_empty());
    }

    #[test]
    fn test_book_round_trips_file_shape() {
        let b = book();
        let json = serde_json::to_value(&b).unwrap();
        assert!(json.get("QQ").is_some());
        assert_eq!(json["QQ"]["alice"], 111);
        assert_eq!(json["QQ"]["bob"], "222");
    }
}
