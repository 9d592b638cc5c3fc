//! Server-side browser sessions.
//!
//! Sessions are opaque random ids handed out as cookies; the record lives
//! in a TTL'd in-memory cache. The post-login redirect slot is not stored
//! here; it travels in its own short-lived cookie so it survives the
//! round-trip through Discord.

use moka::future::Cache as MokaCache;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::Duration;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// An authenticated browser session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: MokaCache<String, Session>,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        let sessions = MokaCache::builder()
            .time_to_live(Duration::from_secs(ttl_secs))
            .max_capacity(10_000)
            .build();
        Self { sessions }
    }

    /// Create a session for the user and return its id.
    pub async fn create(&self, user_id: &str) -> String {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();
        self.sessions.insert(
            id.clone(),
            Session {
                user_id: user_id.to_string(),
            },
        )
        .await;
        id
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).await
    }

    pub async fn destroy(&self, id: &str) {
        self.sessions.invalidate(id).await;
    }
}
