//! Shared server state: one conversation manager per session

use dashmap::DashMap;
use parley_adapters::ProviderSet;
use parley_conversation::ConversationManager;
use parley_core::{ConversationConfig, SessionId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

pub type SharedSession = Arc<Mutex<ConversationManager>>;

struct SessionEntry {
    session: SharedSession,
    last_activity: Instant,
}

/// Session id to manager map.
///
/// Each manager sits behind its own async mutex, so requests for one session
/// are serialized while different sessions proceed independently. Idle
/// sessions are dropped by [`SessionStore::cleanup_inactive`].
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<SessionId, SessionEntry>>,
    providers: ProviderSet,
    config: ConversationConfig,
}

impl SessionStore {
    pub fn new(providers: ProviderSet, config: ConversationConfig) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            providers,
            config,
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<SharedSession> {
        self.sessions.get_mut(id).map(|mut entry| {
            entry.last_activity = Instant::now();
            Arc::clone(&entry.session)
        })
    }

    /// Look up `id`, creating the session when it is absent or not given
    pub fn get_or_create(&self, id: Option<SessionId>) -> (SessionId, SharedSession) {
        let id = id.unwrap_or_default();
        let mut entry = self.sessions.entry(id).or_insert_with(|| {
            info!(session_id = %id, "Creating conversation session");
            SessionEntry {
                session: Arc::new(Mutex::new(ConversationManager::from_config(
                    self.providers.clone(),
                    &self.config,
                ))),
                last_activity: Instant::now(),
            }
        });
        entry.last_activity = Instant::now();
        (id, Arc::clone(&entry.session))
    }

    /// Forget a session entirely
    pub fn remove(&self, id: &SessionId) -> Option<SharedSession> {
        self.sessions.remove(id).map(|(_, entry)| entry.session)
    }

    /// Drop sessions idle for longer than `max_idle`.
    ///
    /// Sessions still referenced by an in-flight request are kept.
    pub fn cleanup_inactive(&self, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| {
            entry.last_activity.elapsed() <= max_idle || Arc::strong_count(&entry.session) > 1
        });
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            info!(removed, remaining = self.sessions.len(), "Evicted idle sessions");
        }
        removed
    }

    /// Run [`cleanup_inactive`](Self::cleanup_inactive) every `interval`
    pub fn spawn_eviction(&self, max_idle: Duration, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let removed = store.cleanup_inactive(max_idle);
                debug!(removed, "Session sweep finished");
            }
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(providers: ProviderSet, config: ConversationConfig) -> Self {
        Self {
            sessions: SessionStore::new(providers, config),
        }
    }
}
