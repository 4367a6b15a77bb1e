//! Room membership for live relay sessions.
//!
//! Both directions (room -> members, session -> room) live behind one lock so
//! every operation is a single consistent step.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::protocol::ServerEvent;

pub type SessionId = Uuid;
pub type SessionSender = mpsc::UnboundedSender<Arc<ServerEvent>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Joined {
    Entered,
    AlreadyMember,
    Switched { from: String },
}

struct Member {
    tx: SessionSender,
    room: Option<String>,
}

#[derive(Default)]
struct Rooms {
    rooms: HashMap<String, HashSet<SessionId>>,
    members: HashMap<SessionId, Member>,
}

impl Rooms {
    fn leave(&mut self, session: SessionId) -> Option<String> {
        let room = self.members.get_mut(&session)?.room.take()?;

        if let Some(sessions) = self.rooms.get_mut(&room) {
            sessions.remove(&session);
            if sessions.is_empty() {
                self.rooms.remove(&room);
            }
        }

        Some(room)
    }
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<Rooms>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self, session: SessionId, tx: SessionSender) {
        self.inner
            .write()
            .await
            .members
            .insert(session, Member { tx, room: None });
    }

    /// Puts `session` in `order_id`'s room, leaving any other room first.
    ///
    /// Returns `None` if the session never connected.
    pub async fn join(&self, session: SessionId, order_id: &str) -> Option<Joined> {
        let mut inner = self.inner.write().await;

        let current = inner.members.get(&session)?.room.clone();
        let joined = match current {
            Some(room) if room == order_id => return Some(Joined::AlreadyMember),
            Some(_) => Joined::Switched { from: inner.leave(session)? },
            None => Joined::Entered,
        };

        inner
            .rooms
            .entry(order_id.to_owned())
            .or_default()
            .insert(session);
        if let Some(member) = inner.members.get_mut(&session) {
            member.room = Some(order_id.to_owned());
        }

        Some(joined)
    }

    /// Takes `session` out of its room. Returns the room it left, if any.
    pub async fn leave(&self, session: SessionId) -> Option<String> {
        self.inner.write().await.leave(session)
    }

    /// Leaves the current room and forgets the session's outbound channel.
    pub async fn disconnect(&self, session: SessionId) -> Option<String> {
        let mut inner = self.inner.write().await;
        let room = inner.leave(session);
        inner.members.remove(&session);
        room
    }

    /// Sends `event` to every member of `order_id`'s room, the sender included.
    ///
    /// Returns how many sessions it reached.
    pub async fn broadcast(&self, order_id: &str, event: ServerEvent) -> usize {
        let inner = self.inner.read().await;
        let Some(sessions) = inner.rooms.get(order_id) else {
            return 0;
        };

        let event = Arc::new(event);
        sessions
            .iter()
            .filter_map(|session| inner.members.get(session))
            .filter(|member| member.tx.send(event.clone()).is_ok())
            .count()
    }

    pub async fn room_size(&self, order_id: &str) -> usize {
        self.inner
            .read()
            .await
            .rooms
            .get(order_id)
            .map_or(0, HashSet::len)
    }

    pub async fn room_of(&self, session: SessionId) -> Option<String> {
        self.inner.read().await.members.get(&session)?.room.clone()
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }
}
