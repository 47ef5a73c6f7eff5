use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use medgrid_core::OccupancyEvent;
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::NotificationError;
use crate::publisher::Publisher;
use crate::types::Notification;

pub const DEFAULT_SESSION_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

struct Session {
    sender: mpsc::Sender<Notification>,
    /// hospital id -> optional department filter
    scopes: HashMap<String, Option<String>>,
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<SessionId, Session>,
    /// hospital id -> subscribed sessions
    scopes: HashMap<String, HashSet<SessionId>>,
    /// bed id -> version of the newest event published for it
    bed_versions: HashMap<String, u64>,
}

impl Registry {
    /// Keeps only events newer than anything already published for their bed
    /// and records them as the newest.
    fn fresh(&mut self, events: Vec<OccupancyEvent>) -> Vec<OccupancyEvent> {
        events
            .into_iter()
            .filter(|event| {
                let newest = self.bed_versions.entry(event.bed_id.clone()).or_default();
                if event.version <= *newest {
                    tracing::debug!(
                        bed_id = %event.bed_id,
                        version = event.version,
                        newest = *newest,
                        "dropping out-of-order occupancy event"
                    );
                    return false;
                }
                *newest = event.version;
                true
            })
            .collect()
    }

    fn remove_session(&mut self, id: SessionId) -> bool {
        let Some(session) = self.sessions.remove(&id) else {
            return false;
        };
        for hospital_id in session.scopes.keys() {
            self.leave_scope(hospital_id, id);
        }
        true
    }

    fn leave_scope(&mut self, hospital_id: &str, id: SessionId) {
        if let Some(members) = self.scopes.get_mut(hospital_id) {
            members.remove(&id);
            if members.is_empty() {
                self.scopes.remove(hospital_id);
            }
        }
    }
}

struct HubInner {
    registry: RwLock<Registry>,
    next_id: AtomicU64,
    session_buffer: usize,
}

/// Registry of connected dashboard sessions and the hospital scopes they
/// joined.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_BUFFER)
    }
}

impl fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationHub")
            .field("sessions", &self.session_count())
            .field("session_buffer", &self.inner.session_buffer)
            .finish()
    }
}

impl NotificationHub {
    /// `session_buffer` bounds how many undelivered notifications a slow
    /// session may accumulate before further ones are dropped for it.
    pub fn new(session_buffer: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                registry: RwLock::new(Registry::default()),
                next_id: AtomicU64::new(1),
                session_buffer: session_buffer.max(1),
            }),
        }
    }

    /// Registers a new session. The session leaves every scope when the
    /// returned handle is dropped.
    pub fn connect(&self) -> SessionHandle {
        let id = SessionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.inner.session_buffer);
        self.inner.registry.write().sessions.insert(
            id,
            Session {
                sender,
                scopes: HashMap::new(),
            },
        );
        tracing::debug!(session = %id, "notification session connected");
        SessionHandle {
            id,
            receiver,
            hub: self.clone(),
        }
    }

    /// Joins `session` to a hospital scope. With `department_id` set the
    /// session only receives events for that department. Joining a scope
    /// again replaces the department filter.
    pub fn subscribe(
        &self,
        session: SessionId,
        hospital_id: &str,
        department_id: Option<&str>,
    ) -> Result<(), NotificationError> {
        if hospital_id.trim().is_empty() {
            return Err(NotificationError::InvalidScope("hospital id is empty".into()));
        }
        let mut registry = self.inner.registry.write();
        let entry = registry
            .sessions
            .get_mut(&session)
            .ok_or_else(|| NotificationError::UnknownSession(session.to_string()))?;
        entry
            .scopes
            .insert(hospital_id.to_string(), department_id.map(str::to_string));
        registry
            .scopes
            .entry(hospital_id.to_string())
            .or_default()
            .insert(session);

        tracing::debug!(
            session = %session,
            hospital_id,
            department_id,
            "session joined hospital scope"
        );
        Ok(())
    }

    /// Removes `session` from one hospital scope. Returns whether it was a
    /// member.
    pub fn unsubscribe(
        &self,
        session: SessionId,
        hospital_id: &str,
    ) -> Result<bool, NotificationError> {
        let mut registry = self.inner.registry.write();
        let entry = registry
            .sessions
            .get_mut(&session)
            .ok_or_else(|| NotificationError::UnknownSession(session.to_string()))?;
        let was_member = entry.scopes.remove(hospital_id).is_some();
        registry.leave_scope(hospital_id, session);
        Ok(was_member)
    }

    /// Removes `session` from every scope and forgets it.
    pub fn disconnect(&self, session: SessionId) {
        if self.inner.registry.write().remove_session(session) {
            tracing::debug!(session = %session, "notification session disconnected");
        }
    }

    /// Hands `events` to every session subscribed to `hospital_id`.
    ///
    /// Never blocks. Each session gets the events of one call as a single
    /// [`Notification`], so concurrent publishes cannot interleave within it.
    /// An event whose version is not newer than the last one published for
    /// its bed is dropped, so every session sees each bed's commits in order.
    /// Sessions with a full buffer miss this notification; sessions whose
    /// receiver is gone are dropped from the registry.
    pub fn publish(&self, hospital_id: &str, events: Vec<OccupancyEvent>) -> usize {
        if events.is_empty() {
            return 0;
        }

        let mut registry = self.inner.registry.write();
        let events = registry.fresh(events);
        if events.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let Some(members) = registry.scopes.get(hospital_id) else {
                tracing::trace!(hospital_id, "no subscribers for occupancy events");
                return 0;
            };

            for id in members {
                let Some(session) = registry.sessions.get(id) else {
                    continue;
                };
                let filter = session.scopes.get(hospital_id).and_then(Option::as_deref);
                let selected: Vec<OccupancyEvent> = match filter {
                    Some(department_id) => events
                        .iter()
                        .filter(|e| e.department_id == department_id)
                        .cloned()
                        .collect(),
                    None => events.clone(),
                };
                if selected.is_empty() {
                    continue;
                }

                let notification = Notification {
                    hospital_id: hospital_id.to_string(),
                    events: selected,
                };
                match session.sender.try_send(notification) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            session = %id,
                            hospital_id,
                            "session buffer full, dropping occupancy notification"
                        );
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        for id in closed {
            registry.remove_session(id);
        }

        tracing::debug!(hospital_id, delivered, "published occupancy events");
        delivered
    }

    pub fn session_count(&self) -> usize {
        self.inner.registry.read().sessions.len()
    }

    pub fn subscriber_count(&self, hospital_id: &str) -> usize {
        self.inner
            .registry
            .read()
            .scopes
            .get(hospital_id)
            .map_or(0, HashSet::len)
    }
}

impl Publisher for NotificationHub {
    fn publish(&self, hospital_id: &str, events: Vec<OccupancyEvent>) -> usize {
        NotificationHub::publish(self, hospital_id, events)
    }
}

/// A connected session: its id plus the receiving end of its queue.
///
/// Dropping the handle disconnects the session.
pub struct SessionHandle {
    id: SessionId,
    receiver: mpsc::Receiver<Notification>,
    hub: NotificationHub,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn subscribe(
        &self,
        hospital_id: &str,
        department_id: Option<&str>,
    ) -> Result<(), NotificationError> {
        self.hub.subscribe(self.id, hospital_id, department_id)
    }

    pub fn unsubscribe(&self, hospital_id: &str) -> Result<bool, NotificationError> {
        self.hub.unsubscribe(self.id, hospital_id)
    }

    /// Waits for the next notification.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Notification> {
        self.receiver.try_recv().ok()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle").field("id", &self.id).finish()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.hub.disconnect(self.id);
    }
}
