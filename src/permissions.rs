use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::router::CommandEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum PermissionClass {
    /// General features: FAQ, game lists, mentions, help.
    Main,
    /// Account-code lookups, limited to dedicated groups.
    Aql,
}

impl fmt::Display for PermissionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Aql => write!(f, "aql"),
        }
    }
}

impl FromStr for PermissionClass {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" => Ok(Self::Main),
            "aql" => Ok(Self::Aql),
            other => Err(AppError::Config(format!("unknown permission class: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Decision {
    Allow,
    Deny(DenyReason),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DenyReason {
    /// The command was registered without a permission class.
    Unclassified,
    /// The class has no authorized groups configured.
    NoGroups(PermissionClass),
    /// The group is not in the class's authorized set.
    GroupNotAuthorized(PermissionClass),
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclassified => write!(f, "command has no permission class"),
            Self::NoGroups(c) => write!(f, "no groups configured for class {c}"),
            Self::GroupNotAuthorized(c) => write!(f, "group not authorized for class {c}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PermissionPolicy {
    groups: HashMap<PermissionClass, HashSet<i64>>,
}

impl PermissionPolicy {
    pub(crate) fn new(groups: HashMap<PermissionClass, HashSet<i64>>) -> Self {
        Self { groups }
    }

    /// Fails closed: no class, an empty group set, or a group outside the
    /// set is a denial.
    pub(crate) fn authorize(&self, group_id: i64, entry: &CommandEntry) -> Decision {
        let Some(class) = entry.class else {
            return Decision::Deny(DenyReason::Unclassified);
        };
        match self.groups.get(&class) {
            None => Decision::Deny(DenyReason::NoGroups(class)),
            Some(set) if set.is_empty() => Decision::Deny(DenyReason::NoGroups(class)),
            Some(set) if set.contains(&group_id) => Decision::Allow,
            Some(_) => Decision::Deny(DenyReason::GroupNotAuthorized(class)),
        }
    }

    /// Every group named by any class.
    pub(crate) fn monitored_groups(&self) -> HashSet<i64> {
        self.groups.values().flatten().copied().collect()
    }

    pub(crate) fn class_count(&self) -> usize {
        self.groups.len()
    }
}
