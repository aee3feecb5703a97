mod aql;
mod at;
mod faq;
mod games;

pub(crate) use at::AtBook;
pub(crate) use games::{GameAction, GameList};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;
use crate::router::CommandEntry;
use crate::state::State;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handler {
    Faq,
    Games(GameList, GameAction),
    At,
    AtAdd,
    AtList,
    AtDelete,
    Aql,
    AqlAdd,
    Help,
}

/// One matched command invocation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Request {
    pub(crate) group_id: i64,
    pub(crate) user_id: i64,
    /// Trimmed text of the message, prefix included.
    pub(crate) text: String,
    /// Images attached to the message as separate segments.
    pub(crate) images: Vec<String>,
}

impl Request {
    /// Text after `prefix`, trimmed. Empty when the text does not start with it.
    pub(crate) fn args(&self, prefix: &str) -> &str {
        self.text.strip_prefix(prefix).unwrap_or("").trim()
    }
}

/// A JSON scalar as found in hand-edited data files: numbers and strings
/// are both accepted and rendered without quotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum Scalar {
    Int(i64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Mention code for a QQ number.
pub(crate) fn at_code(qq: impl fmt::Display) -> String {
    format!("[CQ:at,qq={qq}]")
}

/// Run the handler bound to `entry` and deliver its reply.
pub(crate) async fn invoke(
    state: &State,
    entry: &CommandEntry,
    req: &Request,
) -> Result<(), AppError> {
    let reply = match entry.handler {
        Handler::Faq => Some(faq::handle(state, req).await?),
        Handler::Games(list, action) => Some(games::handle(state, list, action, req.args(entry.prefix))?),
        Handler::At => at::handle(state, req)?,
        Handler::AtAdd => Some(at::cmd_add(state, req.args(entry.prefix))?),
        Handler::AtList => Some(at::cmd_list(state)),
        Handler::AtDelete => Some(at::cmd_delete(state, req.args(entry.prefix))?),
        Handler::Aql => Some(aql::cmd_query(state, req, req.args(entry.prefix)).await),
        Handler::AqlAdd => Some(aql::cmd_add(state, req, req.args(entry.prefix))?),
        Handler::Help => Some(cmd_help()),
    };
    if let Some(reply) = reply {
        state.reply(req.group_id, &reply).await;
    }
    Ok(())
}

fn cmd_help() -> String {
    "qqbot commands:\n\
     \n\
     Account codes (code groups only)\n\
     .aql / #aql <account> - Look up the account's current code\n\
     .aqladd / #aqladd <account> <secret> - Register an account token\n\
     \n\
     Game lists\n\
     #玩什么 / #游戏列表 / #添加游戏 <name> / #删除游戏 <name>\n\
     #wdhow / #wdlst / #wdadd <name> / #wddel <name>\n\
     #mchow / #mclst / #mcadd <name> / #mcdel <name>\n\
     (pick at random / list / add / remove)\n\
     \n\
     FAQ\n\
     #faq <key> - Show an entry\n\
     #faq edit <key> <contents> - Create or replace an entry (text and images)\n\
     #faq delete <key> - Remove an entry\n\
     #faq list - List entry keys\n\
     \n\
     Mentions\n\
     #at <names...> - Mention people by nickname or QQ number\n\
     #atadd <nickname> <members...> - Add members to a nickname\n\
     #atls - List nicknames\n\
     #atdel <nickname> [members...] - Remove members, or the whole nickname\n\
     \n\
     #help - Show this help message"
        .to_string()
}
