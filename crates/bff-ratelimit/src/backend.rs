//! Shared coordination backend for bucket state.
//!
//! The backend is a plain key-value store: values are UTF-8 JSON arrays
//! `[available, last_refill_time]`. The read-modify-write cycle is not
//! atomic across gateway processes; occasional slight over-admission under
//! contention is absorbed downstream by the clamp and the breaker.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use redis::AsyncCommands;
use thiserror::Error;

/// Errors raised by a coordination backend.
///
/// These never reach a client: every caller downgrades to the local
/// fallback path on error.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached or the connection dropped.
    #[error("backend transport error: {0}")]
    Transport(String),

    /// The backend answered with something we could not interpret.
    #[error("backend protocol error: {0}")]
    Protocol(String),
}

impl From<redis::RedisError> for BackendError {
    fn from(err: redis::RedisError) -> Self {
        BackendError::Transport(err.to_string())
    }
}

/// Key-value store shared by all gateway processes.
#[async_trait]
pub trait CoordinationBackend: Send + Sync {
    /// Reads the raw value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Writes `value` under `key`, overwriting any previous value.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), BackendError>;

    /// Round-trips the backend to report liveness for `/health`.
    async fn ping(&self) -> Result<(), BackendError>;
}

/// Redis-backed store used in production deployments.
///
/// The connection manager transparently reconnects; a single failed
/// operation surfaces as one [`BackendError`] and triggers fallback for
/// that call only.
#[derive(Clone)]
pub struct RedisBackend {
    conn: redis::aio::ConnectionManager,
}

impl RedisBackend {
    /// Connects to the Redis instance at `url`.
    pub async fn connect(url: &str) -> Result<Self, BackendError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CoordinationBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// In-process store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordinationBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), BackendError> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
