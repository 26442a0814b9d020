use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tradestation_core::domain::session::Session;
use tradestation_core::domain::snapshot::MarketSnapshot;
use uuid::Uuid;

pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

/// In-memory sessions. Created empty at startup, so a restart clears them.
///
/// Sessions idle for longer than `idle_ttl` are treated as gone and pruned on the
/// next `create`. At `max_sessions` the least recently used session is evicted.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<Inner>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<Uuid, Entry>,
    // Orders touches; Instant alone can tie.
    clock: u64,
}

#[derive(Debug)]
struct Entry {
    session: Session,
    last_used: Instant,
    seq: u64,
}

impl Inner {
    fn touch(&mut self, id: Uuid, idle_ttl: Duration) -> Option<&mut Session> {
        self.clock += 1;
        let clock = self.clock;
        let entry = self.sessions.get_mut(&id)?;
        if entry.last_used.elapsed() > idle_ttl {
            return None;
        }
        entry.last_used = Instant::now();
        entry.seq = clock;
        Some(&mut entry.session)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TTL, DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    pub async fn create(&self) -> Session {
        let session = Session::new();
        let mut inner = self.inner.write().await;

        let before = inner.sessions.len();
        let idle_ttl = self.idle_ttl;
        inner
            .sessions
            .retain(|_, entry| entry.last_used.elapsed() < idle_ttl);
        let expired = before - inner.sessions.len();
        if expired > 0 {
            tracing::debug!(expired, "pruned idle sessions");
        }

        while inner.sessions.len() >= self.max_sessions {
            let Some(oldest) = inner
                .sessions
                .iter()
                .min_by_key(|(_, entry)| entry.seq)
                .map(|(id, _)| *id)
            else {
                break;
            };
            inner.sessions.remove(&oldest);
            tracing::info!(session_id = %oldest, max = self.max_sessions, "evicted least recently used session");
        }

        inner.clock += 1;
        let seq = inner.clock;
        inner.sessions.insert(
            session.id,
            Entry {
                session: session.clone(),
                last_used: Instant::now(),
                seq,
            },
        );
        session
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.inner.write().await.sessions.remove(&id).is_some()
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.inner
            .write()
            .await
            .touch(id, self.idle_ttl)
            .is_some()
    }

    /// `None` when the session does not exist.
    pub async fn market_context(&self, id: Uuid) -> Option<Option<String>> {
        self.inner
            .write()
            .await
            .touch(id, self.idle_ttl)
            .map(|session| session.market_context())
    }

    /// Returns false when the session no longer exists.
    pub async fn record_scan(&self, id: Uuid, snapshot: MarketSnapshot) -> bool {
        match self.inner.write().await.touch(id, self.idle_ttl) {
            Some(session) => {
                session.record_scan(snapshot);
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}
