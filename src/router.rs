//! Command table: ordered literal-prefix routing.
//!
//! Matching is first-match-wins in registration order. A shorter prefix
//! registered before a longer one that extends it (`#at` before `#atadd`)
//! captures all of the longer command's traffic; the handler bound to the
//! short prefix is expected to re-parse the remainder.

use crate::commands::{GameAction, GameList, Handler};
use crate::error::AppError;
use crate::permissions::PermissionClass;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandEntry {
    pub(crate) prefix: &'static str,
    pub(crate) handler: Handler,
    pub(crate) class: Option<PermissionClass>,
}

#[derive(Debug, Clone)]
pub(crate) struct CommandTable {
    entries: Vec<CommandEntry>,
}

impl CommandTable {
    pub(crate) fn new(entries: Vec<CommandEntry>) -> Result<Self, AppError> {
        if let Some(pos) = entries.iter().position(|e| e.prefix.is_empty()) {
            return Err(AppError::Config(format!(
                "command entry #{pos} has an empty prefix"
            )));
        }
        Ok(Self { entries })
    }

    /// First entry whose prefix is a literal, case-sensitive prefix of `text`.
    pub(crate) fn match_command(&self, text: &str) -> Option<&CommandEntry> {
        self.entries.iter().find(|e| text.starts_with(e.prefix))
    }

    pub(crate) fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    /// The production command set, in its fixed registration order.
    pub(crate) fn standard() -> Self {
        use GameAction::{Add, Delete, List, Pick};
        use PermissionClass::{Aql, Main};

        let aql = |prefix, handler| entry(prefix, handler, Aql);
        let main = |prefix, handler| entry(prefix, handler, Main);
        let games = |prefix, list, action| entry(prefix, Handler::Games(list, action), Main);

        let entries = vec![
            aql(".aqladd", Handler::AqlAdd),
            aql("#aqladd", Handler::AqlAdd),
            aql(".aql", Handler::Aql),
            aql("#aql", Handler::Aql),
            games("#游戏列表", GameList::Games, List),
            games("#添加游戏", GameList::Games, Add),
            games("#删除游戏", GameList::Games, Delete),
            games("#玩什么", GameList::Games, Pick),
            games("#wdlst", GameList::Wd, List),
            games("#wdadd", GameList::Wd, Add),
            games("#wddel", GameList::Wd, Delete),
            games("#wdhow", GameList::Wd, Pick),
            games("#mclst", GameList::Mc, List),
            games("#mcadd", GameList::Mc, Add),
            games("#mcdel", GameList::Mc, Delete),
            games("#mchow", GameList::Mc, Pick),
            main("#faq", Handler::Faq),
            main("#at", Handler::At),
            main("#atadd", Handler::AtAdd),
            main("#atls", Handler::AtList),
            main("#atdel", Handler::AtDelete),
            main("#help", Handler::Help),
        ];
        Self { entries }
    }
}

fn entry(prefix: &'static str, handler: Handler, class: PermissionClass) -> CommandEntry {
    CommandEntry {
        prefix,
        handler,
        class: Some(class),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(prefixes: &[(&'static str, Handler)]) -> CommandTable {
        CommandTable::new(
            prefixes
                .iter()
                .map(|(p, h)| entry(p, *h, PermissionClass::Main))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_match_returns_first_registered_prefix() {
        let t = table(&[("#faq", Handler::Faq), ("#faq edit", Handler::Help)]);
        let hit = t.match_command("#faq edit rules hello").unwrap();
        assert_eq!(hit.prefix, "#faq");
        assert_eq!(hit.handler, Handler::Faq);
    }

    #[test]
    fn test_longer_prefix_wins_only_when_registered_first() {
        let t = table(&[("#faq edit", Handler::Help), ("#faq", Handler::Faq)]);
        assert_eq!(t.match_command("#faq edit k v").unwrap().prefix, "#faq edit");
        assert_eq!(t.match_command("#faq k").unwrap().prefix, "#faq");
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let t = table(&[("#help", Handler::Help)]);
        assert!(t.match_command("#HELP").is_none());
        assert!(t.match_command("#help").is_some());
    }

    #[test]
    fn test_prefix_must_be_at_start() {
        let t = table(&[("#help", Handler::Help)]);
        assert!(t.match_command("please #help").is_none());
        assert!(t.match_command(" #help").is_none());
    }

    #[test]
    fn test_match_without_separator() {
        let t = table(&[("#help", Handler::Help)]);
        assert!(t.match_command("#helpme").is_some());
    }

    #[test]
    fn test_no_match() {
        let t = table(&[("#help", Handler::Help)]);
        assert!(t.match_command("hello everyone").is_none());
        assert!(t.match_command("").is_none());
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let result = CommandTable::new(vec![entry("", Handler::Help, PermissionClass::Main)]);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_standard_table_overlap_hazard_preserved() {
        let t = CommandTable::standard();
        for input in ["#atadd bob 123", "#atls", "#atdel bob"] {
            assert_eq!(t.match_command(input).unwrap().handler, Handler::At, "{input}");
        }
        assert_eq!(t.match_command(".aqladd acct key").unwrap().handler, Handler::AqlAdd);
        assert_eq!(t.match_command(".aql acct").unwrap().handler, Handler::Aql);
    }

    #[test]
    fn test_standard_table_earlier_prefix_always_shadows_extension() {
        let t = CommandTable::standard();
        let entries = t.entries();
        for (i, short) in entries.iter().enumerate() {
            for long in &entries[i + 1..] {
                if long.prefix.starts_with(short.prefix) {
                    let input = format!("{} tail", long.prefix);
                    assert_eq!(t.match_command(&input).unwrap().prefix, short.prefix);
                }
            }
        }
    }

    #[test]
    fn test_standard_table_classes() {
        let t = CommandTable::standard();
        for e in t.entries() {
            let expected = if e.prefix.contains("aql") {
                PermissionClass::Aql
            } else {
                PermissionClass::Main
            };
            assert_eq!(e.class, Some(expected), "{}", e.prefix);
        }
    }

    #[test]
    fn test_standard_table_games_routing() {
        let t = CommandTable::standard();
        assert_eq!(
            t.match_command("#添加游戏 Celeste").unwrap().handler,
            Handler::Games(GameList::Games, GameAction::Add)
        );
        assert_eq!(
            t.match_command("#mchow").unwrap().handler,
            Handler::Games(GameList::Mc, GameAction::Pick)
        );
    }
}
