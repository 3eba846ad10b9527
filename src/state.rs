use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::cache::FeedCache;
use crate::config::Config;
use crate::mail::Outbox;
use crate::media::MediaStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub media: MediaStore,
    pub outbox: Outbox,
    pub feed_cache: Arc<Mutex<FeedCache>>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let media = MediaStore::new(config.media_path());
        let outbox = Outbox::new(config.outbox_path());
        let ttl = Duration::from_secs(config.feed.cache_seconds);
        Self {
            db,
            config,
            media,
            outbox,
            feed_cache: Arc::new(Mutex::new(FeedCache::new(ttl))),
        }
    }
}
