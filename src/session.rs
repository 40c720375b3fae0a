use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

/// Server-side session payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(rename = "patientId")]
    pub patient_id: Option<i64>,
}

impl SessionData {
    pub fn for_patient(patient_id: i64) -> Self {
        Self { patient_id: Some(patient_id) }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("session payload could not be decoded: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Keyed session storage. Expiry is the store's business: an expired session
/// reads back as `None`, and destroying an absent id is not an error.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<SessionData>, SessionError>;

    async fn set(&self, id: &str, data: &SessionData) -> Result<(), SessionError>;

    async fn destroy(&self, id: &str) -> Result<(), SessionError>;

    /// Reachability check for `/health`. In-process stores are always up.
    async fn ping(&self) -> Result<(), SessionError> {
        Ok(())
    }
}

struct Entry {
    data: SessionData,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local store for single-instance deployments and tests.
pub struct MemorySessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Entry>>,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Live (unexpired) sessions.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .read()
            .await
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> Result<Option<SessionData>, SessionError> {
        let now = Instant::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.data.clone())),
                Some(_) => {}
            }
        }

        self.sessions.write().await.remove(id);
        Ok(None)
    }

    async fn set(&self, id: &str, data: &SessionData) -> Result<(), SessionError> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, entry| !entry.is_expired(now));
        sessions.insert(
            id.to_string(),
            Entry {
                data: data.clone(),
                expires_at: now + self.ttl,
            },
        );
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}
