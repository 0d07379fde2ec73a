//! Process-scoped shared state wiring the registry, queue, and duel store.

pub mod duel;
pub mod queue;
pub mod scoring;
pub mod session;

use std::{
    sync::Arc,
    time::SystemTime,
};

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    catalog::QuestionCatalog,
    config::AppConfig,
    error::ServiceError,
    state::{duel::MatchRecord, queue::MatchQueue, session::PlayerSession},
};

/// Cheaply cloneable handle to the central application state.
pub type SharedState = Arc<AppState>;

/// Serialization unit for one duel.
///
/// Every mutation of the wrapped record (player actions from either
/// connection, the answering deadline, an administrative leave) must go
/// through this mutex, so concurrent events against the same match are
/// linearized while unrelated duels proceed in parallel.
#[derive(Debug)]
pub struct DuelHandle {
    /// The match record guarded by the per-match lock.
    pub record: Mutex<MatchRecord>,
}

/// Central application state: connection registry, matchmaking queue, duel
/// store, and the immutable catalog/configuration.
///
/// Created once at process start and torn down at shutdown; never ambient.
pub struct AppState {
    config: AppConfig,
    catalog: Arc<QuestionCatalog>,
    sessions: DashMap<Uuid, PlayerSession>,
    queue: Mutex<MatchQueue>,
    duels: DashMap<Uuid, Arc<DuelHandle>>,
    started_at: SystemTime,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, catalog: QuestionCatalog) -> SharedState {
        Arc::new(Self {
            config,
            catalog: Arc::new(catalog),
            sessions: DashMap::new(),
            queue: Mutex::new(MatchQueue::new()),
            duels: DashMap::new(),
            started_at: SystemTime::now(),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shared question catalog.
    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    /// Register a fresh session for an identified connection.
    ///
    /// A second connection for an identity that already has a live session is
    /// rejected rather than silently overwriting the earlier connection.
    pub fn register_session(&self, session: PlayerSession) -> Result<(), ServiceError> {
        let user_id = session.user_id;
        match self.sessions.entry(user_id) {
            dashmap::Entry::Occupied(_) => Err(ServiceError::Conflict(format!(
                "user `{user_id}` already has an active session"
            ))),
            dashmap::Entry::Vacant(entry) => {
                entry.insert(session);
                Ok(())
            }
        }
    }

    /// Snapshot the session for a user, if connected.
    pub fn session(&self, user_id: Uuid) -> Option<PlayerSession> {
        self.sessions.get(&user_id).map(|entry| entry.clone())
    }

    /// Remove the session for a user, returning it if present.
    pub fn remove_session(&self, user_id: Uuid) -> Option<PlayerSession> {
        self.sessions.remove(&user_id).map(|(_, session)| session)
    }

    /// Mutate the session for a user in place. Returns `false` when absent.
    pub fn update_session(&self, user_id: Uuid, f: impl FnOnce(&mut PlayerSession)) -> bool {
        match self.sessions.get_mut(&user_id) {
            Some(mut entry) => {
                f(&mut entry);
                true
            }
            None => false,
        }
    }

    /// Number of currently connected players.
    pub fn connected_players(&self) -> usize {
        self.sessions.len()
    }

    /// The matchmaking queue, guarded by its own lock.
    ///
    /// Pairing attempts run entirely under this lock so two concurrent
    /// enqueues can never commit the same candidate twice.
    pub fn queue(&self) -> &Mutex<MatchQueue> {
        &self.queue
    }

    /// Insert a freshly created match record into the duel store.
    pub fn insert_duel(&self, record: MatchRecord) -> Arc<DuelHandle> {
        let match_id = record.id;
        let handle = Arc::new(DuelHandle {
            record: Mutex::new(record),
        });
        self.duels.insert(match_id, handle.clone());
        handle
    }

    /// Look up the serialization handle for a match.
    pub fn duel(&self, match_id: Uuid) -> Option<Arc<DuelHandle>> {
        self.duels.get(&match_id).map(|entry| entry.clone())
    }

    /// Drop a match record from the store. Returns `true` if it was present.
    pub fn remove_duel(&self, match_id: Uuid) -> bool {
        self.duels.remove(&match_id).is_some()
    }

    /// Number of match records currently stored, finished ones included.
    pub fn active_duels(&self) -> usize {
        self.duels.len()
    }

    /// Scan the store for a match the user participates in.
    ///
    /// Handles are collected before locking any record, so the scan never
    /// awaits a per-match mutex while holding a store shard lock.
    pub async fn find_match_of(&self, user_id: Uuid) -> Option<Uuid> {
        let handles: Vec<Arc<DuelHandle>> = self
            .duels
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for handle in handles {
            let record = handle.record.lock().await;
            if record.participant(user_id).is_some() {
                return Some(record.id);
            }
        }
        None
    }

    /// Timestamp of process start, used by the health endpoint.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }
}
