//! Per-user chat sessions with an optional guided-maintenance run.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use techcare_shared::api::{ChatSessionView, GuideStatus};
use techcare_shared::chat::ChatEngine;
use techcare_shared::error::Result;
use techcare_shared::guide::{GuideKind, GuideSession, SessionState};
use techcare_shared::TechcareError;
use tracing::debug;

pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub engine: ChatEngine,
    pub guide: Option<GuideSession>,
    pub created_at: DateTime<Utc>,
    last_active: Instant,
    /// Creation order, breaks ties between equal instants
    seq: u64,
}

impl ChatSession {
    pub fn view(&self) -> ChatSessionView {
        ChatSessionView {
            id: self.id.clone(),
            history: self.engine.history().to_vec(),
            guide: self.guide.as_ref().map(GuideStatus::from),
        }
    }

    fn guide_mut(&mut self) -> Result<&mut GuideSession> {
        self.guide
            .as_mut()
            .ok_or_else(|| TechcareError::InvalidState("no guide is running".to_string()))
    }

    /// Point the assistant at the guide's current step, or clear it when done
    fn sync_step(&mut self) {
        match &self.guide {
            Some(guide) if guide.state() == SessionState::InProgress => {
                self.engine.set_step(guide.step_context());
                self.engine.set_context("guide", guide.kind.as_str());
            }
            _ => self.engine.clear_step(),
        }
    }

    pub fn start_guide(&mut self, kind: GuideKind) -> GuideStatus {
        let guide = GuideSession::start(kind);
        let status = GuideStatus::from(&guide);
        self.guide = Some(guide);
        self.sync_step();
        status
    }

    pub fn guide_next(&mut self) -> Result<GuideStatus> {
        let guide = self.guide_mut()?;
        guide.next()?;
        let status = GuideStatus::from(&*guide);
        self.sync_step();
        Ok(status)
    }

    pub fn guide_previous(&mut self) -> Result<GuideStatus> {
        let guide = self.guide_mut()?;
        guide.previous()?;
        let status = GuideStatus::from(&*guide);
        self.sync_step();
        Ok(status)
    }

    pub fn guide_complete(&mut self) -> Result<GuideStatus> {
        let guide = self.guide_mut()?;
        guide.complete_current();
        let status = GuideStatus::from(&*guide);
        self.sync_step();
        Ok(status)
    }
}

pub struct SessionStore {
    sessions: HashMap<String, ChatSession>,
    idle_ttl: Duration,
    max_per_user: usize,
    next_seq: u64,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration, max_per_user: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            idle_ttl,
            max_per_user: max_per_user.max(1),
            next_seq: 0,
        }
    }

    /// Drop sessions idle longer than the TTL
    pub fn prune(&mut self) -> usize {
        let before = self.sessions.len();
        let ttl = self.idle_ttl;
        self.sessions.retain(|_, s| s.last_active.elapsed() <= ttl);
        let pruned = before - self.sessions.len();
        if pruned > 0 {
            debug!("Pruned {} idle chat sessions", pruned);
        }
        pruned
    }

    /// Open a session and greet; the user's oldest session is evicted at the cap
    pub fn create(&mut self, user_id: &str) -> &mut ChatSession {
        self.prune();

        let mut owned: Vec<(Instant, u64, String)> = self
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| (s.last_active, s.seq, s.id.clone()))
            .collect();
        owned.sort();
        while owned.len() >= self.max_per_user {
            let (_, _, oldest) = owned.remove(0);
            self.sessions.remove(&oldest);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let mut engine = ChatEngine::new();
        engine.greet();
        let session = ChatSession {
            id: id.clone(),
            user_id: user_id.to_string(),
            engine,
            guide: None,
            created_at: Utc::now(),
            last_active: Instant::now(),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.sessions.entry(id).or_insert(session)
    }

    /// A live session owned by `user_id`; touching it resets the idle timer.
    /// Idle sessions are dropped on every lookup.
    pub fn get_mut(&mut self, id: &str, user_id: &str) -> Result<&mut ChatSession> {
        self.prune();
        match self.sessions.get_mut(id) {
            Some(s) if s.user_id == user_id => {
                s.last_active = Instant::now();
                Ok(s)
            }
            _ => Err(TechcareError::not_found(format!("chat session {}", id))),
        }
    }

    pub fn remove(&mut self, id: &str, user_id: &str) -> Result<()> {
        self.get_mut(id, user_id)?;
        self.sessions.remove(id);
        Ok(())
    }

    pub fn count_for(&self, user_id: &str) -> usize {
        self.sessions.values().filter(|s| s.user_id == user_id).count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(Duration::from_secs(3600), 2)
    }

    #[test]
    fn test_create_greets() {
        let mut store = store();
        let session = store.create("alice");
        assert_eq!(session.engine.history().len(), 1);
        assert!(session.guide.is_none());
    }

    #[test]
    fn test_sessions_are_private() {
        let mut store = store();
        let id = store.create("alice").id.clone();
        assert!(store.get_mut(&id, "alice").is_ok());
        assert!(store.get_mut(&id, "bob").is_err());
        assert!(store.remove(&id, "bob").is_err());
        store.remove(&id, "alice").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut store = store();
        let first = store.create("alice").id.clone();
        store.create("alice");
        store.create("alice");
        store.create("bob");
        assert_eq!(store.count_for("alice"), 2);
        assert!(store.get_mut(&first, "alice").is_err());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_idle_sessions_pruned() {
        let mut store = SessionStore::new(Duration::ZERO, 5);
        let id = store.create("alice").id.clone();
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get_mut(&id, "alice").is_err());
        assert!(store.is_empty());
        assert_eq!(store.prune(), 0);
    }

    #[test]
    fn test_lookup_drops_other_idle_sessions() {
        let mut store = SessionStore::new(Duration::from_millis(50), 5);
        store.create("alice");
        let bob = store.create("bob").id.clone();
        assert_eq!(store.len(), 2);
        std::thread::sleep(Duration::from_millis(80));
        assert!(store.get_mut(&bob, "bob").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_guide_drives_chat_context() {
        let mut store = store();
        let session = store.create("alice");
        assert!(session.guide_next().is_err());

        let status = session.start_guide(GuideKind::Startup);
        assert_eq!(status.current, 0);
        assert!(session.engine.current_step().is_some());

        let status = session.guide_next().unwrap();
        assert_eq!(status.current, 1);
        assert_eq!(
            session.engine.current_step().map(|s| s.title.clone()),
            Some(status.step.title.clone())
        );

        let total = status.total;
        let mut last = status;
        for _ in 0..total {
            last = session.guide_complete().unwrap();
        }
        assert_eq!(last.state, SessionState::Finished);
        assert!(session.engine.current_step().is_none());
        assert!(session.view().guide.is_some());
    }
}
