use clap::Parser;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::AppError;
use crate::permissions::{PermissionClass, PermissionPolicy};

#[derive(Parser, Debug)]
#[command(name = "qqbot", about = "Group chat command bot for OneBot bridges")]
pub(crate) struct Args {
    /// Address the webhook receiver binds to
    #[arg(long, default_value = crate::constants::DEFAULT_LISTEN, env = "QQBOT_LISTEN")]
    pub(crate) listen: String,

    /// OneBot HTTP API base URL used for replies
    #[arg(long, default_value = crate::constants::DEFAULT_API_URL, env = "QQBOT_API_URL")]
    pub(crate) api_url: String,

    /// Group policy file (JSON or YAML)
    #[arg(long, env = "QQBOT_GROUPS")]
    pub(crate) groups: Option<PathBuf>,

    /// Directory holding list files, the database and stored media
    #[arg(long, default_value = crate::constants::DEFAULT_DATA_DIR, env = "QQBOT_DATA_DIR")]
    pub(crate) data_dir: PathBuf,

    /// Dynamic code provider endpoint
    #[arg(long, env = "QQBOT_CODE_API_URL")]
    pub(crate) code_api_url: Option<String>,

    /// Delete stored media older than this many days at startup
    #[arg(long, env = "QQBOT_MEDIA_TTL_DAYS")]
    pub(crate) media_ttl_days: Option<u64>,
}

/// On-disk shape of the group policy file.
#[derive(Deserialize, Default, Debug)]
struct GroupPolicyFile {
    #[serde(default)]
    permissions: HashMap<String, Vec<i64>>,
    #[serde(default)]
    dynamic_code_groups: Vec<i64>,
    #[serde(default)]
    monitored: Vec<i64>,
}

/// Group-level configuration resolved at startup.
#[derive(Debug, Default)]
pub(crate) struct GroupSettings {
    pub(crate) policy: PermissionPolicy,
    /// Groups whose messages are processed at all.
    pub(crate) monitored: HashSet<i64>,
    /// Groups whose account codes come from the dynamic code provider.
    pub(crate) dynamic_code_groups: HashSet<i64>,
}

impl TryFrom<GroupPolicyFile> for GroupSettings {
    type Error = AppError;

    fn try_from(file: GroupPolicyFile) -> Result<Self, AppError> {
        let mut groups = HashMap::new();
        for (name, ids) in file.permissions {
            let class: PermissionClass = name.parse()?;
            groups
                .entry(class)
                .or_insert_with(HashSet::new)
                .extend(ids);
        }
        let policy = PermissionPolicy::new(groups);
        let mut monitored = policy.monitored_groups();
        monitored.extend(file.monitored);
        Ok(Self {
            policy,
            monitored,
            dynamic_code_groups: file.dynamic_code_groups.into_iter().collect(),
        })
    }
}

fn parse_group_file(path: &Path, contents: &str) -> Result<GroupPolicyFile, AppError> {
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    let file = if is_yaml {
        serde_yaml::from_str(contents)?
    } else {
        serde_json::from_str(contents)?
    };
    Ok(file)
}

/// Load group settings. No path, or a path that does not exist, yields an
/// empty policy that denies every command.
pub(crate) fn load_group_settings(path: Option<&Path>) -> Result<GroupSettings, AppError> {
    let Some(path) = path else {
        warn!("No group policy file configured; all commands are denied");
        return Ok(GroupSettings::default());
    };
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Group policy file not found; all commands are denied");
            return Ok(GroupSettings::default());
        }
        Err(e) => return Err(e.into()),
    };
    let settings = GroupSettings::try_from(parse_group_file(path, &contents)?)?;
    info!(
        path = %path.display(),
        classes = settings.policy.class_count(),
        monitored = settings.monitored.len(),
        "Loaded group policy"
    );
    Ok(settings)
}
