//! Session registry - activity tracking for protocol clients
//!
//! A session only correlates a client's sequence of protocol calls; it
//! carries no authentication meaning.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub created_at: Instant,
    pub last_activity: Instant,
}

/// Process-wide map of session id to session record, owned by the server instance
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
    timeout: Duration,
}

/// Generate a session id: unix millis plus a random suffix
pub fn generate_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix = Uuid::new_v4().simple().to_string();
    format!("mcp-{}-{}", millis, &suffix[..12])
}

impl SessionRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Insert a fresh session and return its id
    pub async fn create(&self) -> String {
        let id = generate_session_id();
        let now = Instant::now();
        let session = Session {
            id: id.clone(),
            created_at: now,
            last_activity: now,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone(), session);
        debug!("Created session: {}", id);
        id
    }

    /// Refresh last activity; returns false for unknown ids
    pub async fn touch(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) => {
                session.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Reuse a known session (refreshing it) or mint a new one
    pub async fn resolve(&self, presented: Option<&str>) -> String {
        if let Some(id) = presented {
            if self.touch(id).await {
                return id.to_string();
            }
            debug!("Unknown session id presented: {}", id);
        }
        self.create().await
    }

    /// Remove every session idle for longer than the timeout
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    /// Sweep as if the current time were `now`
    pub async fn sweep_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| now.saturating_duration_since(s.last_activity) <= self.timeout);
        let removed = before - sessions.len();
        if removed > 0 {
            info!(
                "Expired {} idle session(s), {} remaining",
                removed,
                sessions.len()
            );
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_session_id_shape() {
        let id = generate_session_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "mcp");
        assert!(parts[1].parse::<u128>().is_ok());
        assert_eq!(parts[2].len(), 12);
    }
}
