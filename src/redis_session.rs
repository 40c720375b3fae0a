use crate::session::{SessionData, SessionError, SessionStore};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, RedisError};
use std::time::Duration;

const SESSION_KEY_PREFIX: &str = "session:";

/// Sessions shared across instances through Redis, expired by key TTL.
pub struct RedisSessionStore {
    client: ConnectionManager,
    ttl: Duration,
}

impl RedisSessionStore {
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self, RedisError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self { client: conn, ttl })
    }

    fn key(id: &str) -> String {
        format!("{}{}", SESSION_KEY_PREFIX, id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, id: &str) -> Result<Option<SessionData>, SessionError> {
        let mut conn = self.client.clone();
        let json: Option<String> = conn.get(Self::key(id)).await?;

        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, id: &str, data: &SessionData) -> Result<(), SessionError> {
        let json = serde_json::to_string(data)?;
        let mut conn = self.client.clone();

        // Redis rejects EX 0.
        let seconds = self.ttl.as_secs().max(1);
        redis::cmd("SET")
            .arg(Self::key(id))
            .arg(json)
            .arg("EX")
            .arg(seconds)
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        let mut conn = self.client.clone();
        conn.del::<_, ()>(Self::key(id)).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), SessionError> {
        let mut conn = self.client.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
