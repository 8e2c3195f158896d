use mongodb::bson::oid::ObjectId;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Identity state of one realtime session.
///
/// A session is `Anonymous` after the transport connects, becomes
/// `Authenticated` once the client self-reports a user id, and is removed
/// from the registry on disconnect (the terminal state). A reconnecting
/// client starts over as a fresh anonymous session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionIdentity {
    Anonymous,
    Authenticated(ObjectId),
}

struct Session {
    identity: SessionIdentity,
    tx: UnboundedSender<String>,
}

/// Registry of connected sessions, keyed by connection id. This is the
/// realtime transport the notifier fans out through: `broadcast_all` for
/// public events, `send_to_user(s)` for targeted ones.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

fn envelope(event: &str, data: &Value) -> String {
    serde_json::json!({ "event": event, "data": data }).to_string()
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new anonymous session and returns its connection id.
    pub fn register(&self, tx: UnboundedSender<String>) -> Uuid {
        let conn_id = Uuid::new_v4();
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(
                conn_id,
                Session {
                    identity: SessionIdentity::Anonymous,
                    tx,
                },
            );
        }
        conn_id
    }

    /// Anonymous → Authenticated. A session identifies itself at most once;
    /// later attempts are ignored.
    pub fn authenticate(&self, conn_id: Uuid, user: ObjectId) -> bool {
        let Ok(mut sessions) = self.sessions.write() else {
            return false;
        };
        match sessions.get_mut(&conn_id) {
            Some(session) if session.identity == SessionIdentity::Anonymous => {
                session.identity = SessionIdentity::Authenticated(user);
                true
            }
            _ => false,
        }
    }

    pub fn unregister(&self, conn_id: Uuid) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.remove(&conn_id);
        }
    }

    pub fn identity(&self, conn_id: Uuid) -> Option<SessionIdentity> {
        let sessions = self.sessions.read().ok()?;
        sessions.get(&conn_id).map(|s| s.identity)
    }

    /// Delivers to every connected session, anonymous ones included.
    pub fn broadcast_all(&self, event: &str, data: &Value) {
        let Ok(sessions) = self.sessions.read() else {
            return;
        };
        let text = envelope(event, data);
        for session in sessions.values() {
            if session.tx.send(text.clone()).is_err() {
                tracing::debug!("dropping realtime delivery to closed session");
            }
        }
    }

    /// Delivers to every authenticated session of the given user.
    pub fn send_to_user(&self, user: ObjectId, event: &str, data: &Value) {
        self.send_to_users(std::slice::from_ref(&user), event, data);
    }

    pub fn send_to_users(&self, users: &[ObjectId], event: &str, data: &Value) {
        let Ok(sessions) = self.sessions.read() else {
            return;
        };
        let text = envelope(event, data);
        for session in sessions.values() {
            if let SessionIdentity::Authenticated(user) = session.identity {
                if users.contains(&user) && session.tx.send(text.clone()).is_err() {
                    tracing::debug!("dropping realtime delivery to closed session");
                }
            }
        }
    }
}
