use std::time::Duration;

pub(crate) const DEFAULT_LISTEN: &str = "0.0.0.0:7778";
pub(crate) const DEFAULT_API_URL: &str = "http://127.0.0.1:23333";
pub(crate) const DEFAULT_DATA_DIR: &str = "data";

pub(crate) const MEDIA_DIR: &str = "faq_images";
pub(crate) const DATABASE_FILE: &str = "bot.db";

pub(crate) const CHAT_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const MAX_MEDIA_BYTES: u64 = 20 * 1024 * 1024;
pub(crate) const MEDIA_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const CODE_API_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) const RETRY_ATTEMPTS: u32 = 3;
pub(crate) const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
pub(crate) const RETRY_MAX_DELAY: Duration = Duration::from_secs(4);
