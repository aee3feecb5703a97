use rand::seq::SliceRandom;
use tracing::info;

use crate::error::AppError;
use crate::state::State;

/// The three independent name lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GameList {
    Games,
    Wd,
    Mc,
}

impl GameList {
    pub(crate) fn file_name(self) -> &'static str {
        match self {
            Self::Games => "gameList.json",
            Self::Wd => "wd.json",
            Self::Mc => "mc.json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GameAction {
    List,
    Add,
    Delete,
    Pick,
}

pub(super) fn handle(
    state: &State,
    list: GameList,
    action: GameAction,
    arg: &str,
) -> Result<String, AppError> {
    let store = state.stores.game_list(list);
    match action {
        GameAction::List => {
            let names = store.load();
            if names.is_empty() {
                return Ok("The list is empty.".to_string());
            }
            Ok(names.join("\n"))
        }
        GameAction::Pick => {
            let names = store.load();
            Ok(names
                .choose(&mut rand::thread_rng())
                .cloned()
                .unwrap_or_else(|| "The list is empty, no idea what to play.".to_string()))
        }
        GameAction::Add | GameAction::Delete if arg.is_empty() => {
            Ok("Please give a name.".to_string())
        }
        GameAction::Add => store.update(|names| {
            if names.iter().any(|n| n == arg) {
                return (false, "Already in the list.".to_string());
            }
            names.push(arg.to_string());
            info!(list = ?list, name = %arg, "Added to list");
            (true, "Added.".to_string())
        }),
        GameAction::Delete => store.update(|names| {
            let before = names.len();
            names.retain(|n| n != arg);
            if names.len() == before {
                return (false, "Not in the list.".to_string());
            }
            info!(list = ?list, name = %arg, "Removed from list");
            (true, "Removed.".to_string())
        }),
    }
}
