use bolt_core::cache::InventoryCache;
use bolt_core::config::Config;
use bolt_core::connection::{Endpoints, UpstreamCredentials};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Credentials and upstream URLs accepted by `/api/authenticate`.
#[derive(Debug, Clone)]
pub struct Session {
    pub credentials: UpstreamCredentials,
    pub endpoints: Endpoints,
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Entry {
    session: Session,
    opened_at: Instant,
}

/// Live sessions keyed by id. Entries expire `ttl` after login; past
/// `capacity` the oldest session is evicted.
#[derive(Debug)]
pub struct SessionStore {
    entries: HashMap<String, Entry>,
    ttl: Duration,
    capacity: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    fn is_live(&self, entry: &Entry) -> bool {
        entry.opened_at.elapsed() < self.ttl
    }

    fn purge_expired(&mut self) {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, e| e.opened_at.elapsed() < ttl);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            tracing::debug!(dropped, "expired sessions purged");
        }
    }

    pub fn insert(&mut self, id: String, session: Session) {
        self.purge_expired();
        while self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.opened_at)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(oldest) => {
                    tracing::info!("session limit reached, evicting oldest session");
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.entries.insert(
            id,
            Entry {
                session,
                opened_at: Instant::now(),
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.entries
            .get(id)
            .filter(|e| self.is_live(e))
            .map(|e| e.session.clone())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<Config>,
    pub sessions: Arc<RwLock<SessionStore>>,
    /// Shared by every pipeline run; `None` when disabled in config.
    pub inventory_cache: Option<Arc<InventoryCache>>,
}

impl AppState {
    pub fn new(root: PathBuf, config: Config) -> Self {
        let inventory_cache = InventoryCache::new(config.inventory_cache_capacity).map(Arc::new);
        let sessions = SessionStore::new(config.session_ttl(), config.max_sessions);
        Self {
            root,
            config: Arc::new(config),
            sessions: Arc::new(RwLock::new(sessions)),
            inventory_cache,
        }
    }

    pub fn export_dir(&self) -> PathBuf {
        self.config.export_dir(&self.root)
    }

    /// Store `session` under a fresh id and return the id.
    pub async fn open_session(&self, session: Session) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.sessions.write().await.insert(id.clone(), session);
        id
    }

    /// The live session for `id`. Expired sessions are dropped on sight.
    pub async fn session(&self, id: &str) -> Option<Session> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return Some(session);
        }
        if self.sessions.write().await.remove(id) {
            tracing::info!("session expired");
        }
        None
    }

    pub async fn close_session(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolt_core::upstream::Credentials;

    fn session() -> Session {
        Session {
            credentials: UpstreamCredentials::shared(Credentials::Bearer("t".into())),
            endpoints: Endpoints::default(),
        }
    }

    #[test]
    fn new_state_builds_cache_from_config() {
        let state = AppState::new(PathBuf::from("/tmp/bolt"), Config::default());
        assert_eq!(state.inventory_cache.as_ref().map(|c| c.capacity()), Some(32));
        assert_eq!(state.export_dir(), PathBuf::from("/tmp/bolt/exports"));

        let config = Config {
            inventory_cache_capacity: 0,
            ..Config::default()
        };
        assert!(AppState::new(PathBuf::from("/tmp/bolt"), config)
            .inventory_cache
            .is_none());
    }

    #[tokio::test]
    async fn sessions_open_and_close() {
        let state = AppState::new(PathBuf::from("/tmp/bolt"), Config::default());
        let id = state.open_session(session()).await;
        assert!(state.session(&id).await.is_some());
        assert!(state.close_session(&id).await);
        assert!(state.session(&id).await.is_none());
        assert!(!state.close_session(&id).await);
    }

    #[tokio::test]
    async fn expired_session_is_dropped_on_lookup() {
        let config = Config {
            session_ttl_secs: 0,
            ..Config::default()
        };
        let state = AppState::new(PathBuf::from("/tmp/bolt"), config);
        let id = state.open_session(session()).await;
        assert!(state.session(&id).await.is_none());
        assert_eq!(state.sessions.read().await.len(), 0);
    }

    #[test]
    fn store_evicts_oldest_past_capacity() {
        let mut store = SessionStore::new(Duration::from_secs(60), 2);
        store.insert("a".into(), session());
        std::thread::sleep(Duration::from_millis(2));
        store.insert("b".into(), session());
        std::thread::sleep(Duration::from_millis(2));
        store.insert("c".into(), session());
        assert_eq!(store.len(), 2);
        assert!(store.get("a").is_none());
        assert!(store.get("b").is_some());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn insert_purges_expired_entries() {
        let mut store = SessionStore::new(Duration::ZERO, 8);
        store.insert("a".into(), session());
        store.insert("b".into(), session());
        assert_eq!(store.len(), 1);
        assert!(store.get("b").is_none());
    }
}
