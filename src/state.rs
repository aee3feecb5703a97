use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error};

use crate::commands::{AtBook, GameList, Scalar};
use crate::config::GroupSettings;
use crate::localize::ContentLocalizer;
use crate::media::MediaFetcher;
use crate::router::CommandTable;
use crate::store::{FaqStore, JsonStore};
use crate::traits::{ChatApi, CodeApi};

/// Immutable configuration set at startup from CLI args.
pub(crate) struct Config {
    pub(crate) api_url: String,
    pub(crate) data_dir: PathBuf,
    pub(crate) db_path: PathBuf,
}

/// Runtime metrics (atomic counters).
pub(crate) struct Metrics {
    pub(crate) start_time: Instant,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) events_received: AtomicU64,
    pub(crate) events_ignored: AtomicU64,
    pub(crate) commands_handled: AtomicU64,
    pub(crate) commands_denied: AtomicU64,
    pub(crate) handler_failures: AtomicU64,
    pub(crate) reply_failures: AtomicU64,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self {
            start_time: Instant::now(),
            started_at: Utc::now(),
            events_received: AtomicU64::new(0),
            events_ignored: AtomicU64::new(0),
            commands_handled: AtomicU64::new(0),
            commands_denied: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
            reply_failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Every file-backed document the handlers read and write.
pub(crate) struct Stores {
    pub(crate) faq: FaqStore,
    pub(crate) games: JsonStore<Vec<String>>,
    pub(crate) wd: JsonStore<Vec<String>>,
    pub(crate) mc: JsonStore<Vec<String>>,
    pub(crate) at: JsonStore<AtBook>,
    /// Static account code table.
    pub(crate) codes: JsonStore<BTreeMap<String, Scalar>>,
    /// Account tokens for the dynamic code provider.
    pub(crate) tokens: JsonStore<BTreeMap<String, String>>,
}

impl Stores {
    pub(crate) fn open(data_dir: &Path, db_path: &Path) -> Self {
        let list = |list: GameList| JsonStore::new(data_dir.join(list.file_name()));
        Self {
            faq: FaqStore::new(db_path.to_path_buf()),
            games: list(GameList::Games),
            wd: list(GameList::Wd),
            mc: list(GameList::Mc),
            at: JsonStore::new(data_dir.join("at.json")),
            codes: JsonStore::new(data_dir.join("code.json")),
            tokens: JsonStore::new(data_dir.join("ze_account.json")),
        }
    }

    pub(crate) fn game_list(&self, list: GameList) -> &JsonStore<Vec<String>> {
        match list {
            GameList::Games => &self.games,
            GameList::Wd => &self.wd,
            GameList::Mc => &self.mc,
        }
    }
}

pub(crate) struct State {
    pub(crate) config: Config,
    pub(crate) metrics: Metrics,
    pub(crate) table: CommandTable,
    pub(crate) groups: GroupSettings,
    pub(crate) stores: Stores,
    pub(crate) media: MediaFetcher,
    pub(crate) localizer: ContentLocalizer,
    pub(crate) chat_api: Box<dyn ChatApi>,
    pub(crate) code_api: Option<Box<dyn CodeApi>>,
}

impl State {
    /// Post `message` to a group. Delivery is best-effort: a failure is
    /// logged and counted but never surfaces to the caller.
    pub(crate) async fn reply(&self, group_id: i64, message: &str) {
        match self.chat_api.send_group_msg(group_id, message).await {
            Ok(()) => debug!(group_id, len = message.len(), "Reply delivered"),
            Err(e) => {
                Metrics::bump(&self.metrics.reply_failures);
                error!(group_id, "Reply delivery failed: {e}");
            }
        }
    }
}
