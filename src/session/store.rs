use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{InterviewError, InterviewResult};

use super::model::{ChatEntry, Session, SessionId};

/// Authoritative set of candidate sessions.
///
/// `sessions` owns every record; `order` lists ids newest first and
/// `current` is an id lookup into `sessions`, never a second owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStore {
    sessions: HashMap<SessionId, Session>,
    order: Vec<SessionId>,
    current: Option<SessionId>,
}

impl SessionStore {
    /// Fresh, empty store. Process start uses this instead of any implicit reset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session in front of the ordering and makes it current.
    pub fn create(&mut self, session: Session) -> SessionId {
        let id = session.id;
        if self.sessions.insert(id, session).is_some() {
            self.order.retain(|existing| *existing != id);
        }
        self.order.insert(0, id);
        self.current = Some(id);
        id
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Runs `apply` against an existing session. Unknown ids are an error, never created.
    pub fn update<R>(
        &mut self,
        id: &SessionId,
        apply: impl FnOnce(&mut Session) -> InterviewResult<R>,
    ) -> InterviewResult<R> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or(InterviewError::NotFound(*id))?;
        apply(session)
    }

    /// Overwrites the provided contact fields.
    pub fn update_fields(
        &mut self,
        id: &SessionId,
        name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> InterviewResult<()> {
        self.update(id, |session| {
            if name.is_some() {
                session.name = name;
            }
            if email.is_some() {
                session.email = email;
            }
            if phone.is_some() {
                session.phone = phone;
            }
            session.touch();
            Ok(())
        })
    }

    pub fn append_chat(&mut self, id: &SessionId, entry: ChatEntry) -> InterviewResult<()> {
        self.update(id, |session| {
            session.push_chat(entry);
            Ok(())
        })
    }

    /// Removes a session everywhere; clears `current` if it pointed at it.
    pub fn delete(&mut self, id: &SessionId) -> Option<Session> {
        let removed = self.sessions.remove(id)?;
        self.order.retain(|existing| existing != id);
        if self.current == Some(*id) {
            self.current = None;
        }
        Some(removed)
    }

    /// Points `current` at an existing session and returns the previous value.
    pub fn set_current(&mut self, id: &SessionId) -> InterviewResult<Option<SessionId>> {
        if !self.sessions.contains_key(id) {
            return Err(InterviewError::NotFound(*id));
        }
        Ok(self.current.replace(*id))
    }

    pub fn current_id(&self) -> Option<SessionId> {
        self.current
    }

    /// Sessions newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.order.iter().filter_map(|id| self.sessions.get(id))
    }

    pub fn ids(&self) -> &[SessionId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops dangling ids left by a hand-edited snapshot.
    pub(crate) fn repair_indexes(&mut self) {
        let sessions = &self.sessions;
        self.order.retain(|id| sessions.contains_key(id));
        for id in sessions.keys() {
            if !self.order.contains(id) {
                self.order.push(*id);
            }
        }
        if let Some(current) = self.current {
            if !sessions.contains_key(&current) {
                self.current = None;
            }
        }
    }
}
