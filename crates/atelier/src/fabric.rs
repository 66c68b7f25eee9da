//! Connection registry and room broadcast plumbing.
//!
//! Every connection gets an unbounded outbound channel at registration; the
//! transport layer drains it and writes frames to the socket. Rooms group
//! connections for session- and drawing-scoped broadcasts. Room membership
//! lives here, not on the connections: a connection holds at most one
//! session room and one drawing room at a time, and joining a new room of a
//! kind silently replaces the old one.
//!
//! Event order is decided by whoever emits while holding the relevant
//! session or drawing lock; the fabric just fans frames out in the order it
//! receives them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::event::ServerEvent;
use crate::metrics::CoreMetrics;
use crate::types::{ConnectionId, DrawingId, RoomId, SessionId};

pub struct BroadcastFabric {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
    rooms: DashMap<RoomId, Vec<ConnectionId>>,
    session_rooms: DashMap<ConnectionId, SessionId>,
    drawing_rooms: DashMap<ConnectionId, DrawingId>,
    metrics: Arc<CoreMetrics>,
}

impl BroadcastFabric {
    pub fn new(metrics: Arc<CoreMetrics>) -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
            session_rooms: DashMap::new(),
            drawing_rooms: DashMap::new(),
            metrics,
        }
    }

    /// Register a connection and hand back its outbound event stream.
    /// Registering an id again replaces the previous channel.
    pub fn register(&self, connection_id: ConnectionId) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.connections.insert(connection_id, tx).is_none() {
            self.metrics.connections.inc();
        }
        rx
    }

    /// Drop a connection and all its room memberships.
    pub fn unregister(&self, connection_id: &ConnectionId) {
        if let Some((_, session_id)) = self.session_rooms.remove(connection_id) {
            self.remove_from_room(&RoomId::Session(session_id), connection_id);
        }
        if let Some((_, drawing_id)) = self.drawing_rooms.remove(connection_id) {
            self.remove_from_room(&RoomId::Drawing(drawing_id), connection_id);
        }
        if self.connections.remove(connection_id).is_some() {
            self.metrics.connections.dec();
        }
    }

    pub fn is_registered(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Put a connection in a room, leaving any previous room of the same
    /// kind first.
    pub fn join(&self, connection_id: &ConnectionId, room: RoomId) {
        match &room {
            RoomId::Session(session_id) => {
                if let Some(prev) = self
                    .session_rooms
                    .insert(connection_id.clone(), session_id.clone())
                {
                    if prev != *session_id {
                        self.remove_from_room(&RoomId::Session(prev), connection_id);
                    }
                }
            }
            RoomId::Drawing(drawing_id) => {
                if let Some(prev) = self
                    .drawing_rooms
                    .insert(connection_id.clone(), drawing_id.clone())
                {
                    if prev != *drawing_id {
                        self.remove_from_room(&RoomId::Drawing(prev), connection_id);
                    }
                }
            }
        }
        let mut members = self.rooms.entry(room).or_default();
        if !members.contains(connection_id) {
            members.push(connection_id.clone());
        }
    }

    /// Remove a connection from a room. A no-op if it was not a member.
    pub fn leave(&self, connection_id: &ConnectionId, room: &RoomId) {
        match room {
            RoomId::Session(session_id) => {
                self.session_rooms
                    .remove_if(connection_id, |_, v| v == session_id);
            }
            RoomId::Drawing(drawing_id) => {
                self.drawing_rooms
                    .remove_if(connection_id, |_, v| v == drawing_id);
            }
        }
        self.remove_from_room(room, connection_id);
    }

    /// The session room a connection currently occupies, if any.
    pub fn session_room_of(&self, connection_id: &ConnectionId) -> Option<SessionId> {
        self.session_rooms.get(connection_id).map(|r| r.clone())
    }

    /// The drawing room a connection currently occupies, if any.
    pub fn drawing_room_of(&self, connection_id: &ConnectionId) -> Option<DrawingId> {
        self.drawing_rooms.get(connection_id).map(|r| r.clone())
    }

    pub fn members(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.rooms.get(room).map(|m| m.clone()).unwrap_or_default()
    }

    /// Drop a room and every membership pointing at it. Connections stay
    /// registered.
    pub fn clear_room(&self, room: &RoomId) {
        let Some((_, members)) = self.rooms.remove(room) else {
            return;
        };
        for connection_id in members {
            match room {
                RoomId::Session(session_id) => {
                    self.session_rooms
                        .remove_if(&connection_id, |_, v| v == session_id);
                }
                RoomId::Drawing(drawing_id) => {
                    self.drawing_rooms
                        .remove_if(&connection_id, |_, v| v == drawing_id);
                }
            }
        }
    }

    /// Send one event to one connection. Races with disconnection are
    /// expected and dropped quietly.
    pub fn emit_to(&self, connection_id: &ConnectionId, event: ServerEvent) {
        let Some(tx) = self.connections.get(connection_id) else {
            debug!(%connection_id, tag = event.tag(), "emit to unknown connection dropped");
            return;
        };
        if tx.send(event).is_err() {
            debug!(%connection_id, "connection receiver dropped");
        } else {
            self.metrics.broadcasts_total.inc();
        }
    }

    /// Send one event to every member of a room.
    pub fn emit_to_room(&self, room: &RoomId, event: ServerEvent) {
        for connection_id in self.members(room) {
            self.emit_to(&connection_id, event.clone());
        }
    }

    /// Send one event to every room member except one connection.
    pub fn emit_to_room_except(
        &self,
        room: &RoomId,
        except: &ConnectionId,
        event: ServerEvent,
    ) {
        for connection_id in self.members(room) {
            if connection_id != *except {
                self.emit_to(&connection_id, event.clone());
            }
        }
    }

    fn remove_from_room(&self, room: &RoomId, connection_id: &ConnectionId) {
        let mut drop_room = false;
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.retain(|c| c != connection_id);
            drop_room = members.is_empty();
        }
        if drop_room {
            self.rooms.remove_if(room, |_, members| members.is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fabric() -> BroadcastFabric {
        BroadcastFabric::new(Arc::new(CoreMetrics::unregistered()))
    }

    fn event(reason: &str) -> ServerEvent {
        ServerEvent::Error {
            reason: reason.into(),
        }
    }

    #[test]
    fn register_and_emit() {
        let fabric = fabric();
        let conn = ConnectionId::new("c-1");
        let mut rx = fabric.register(conn.clone());

        fabric.emit_to(&conn, event("hello"));
        assert_eq!(rx.try_recv().unwrap(), event("hello"));
    }

    #[test]
    fn emit_to_unknown_connection_is_dropped() {
        let fabric = fabric();
        fabric.emit_to(&ConnectionId::new("ghost"), event("x"));
    }

    #[test]
    fn room_broadcast_reaches_all_members() {
        let fabric = fabric();
        let a = ConnectionId::new("a");
        let b = ConnectionId::new("b");
        let c = ConnectionId::new("c");
        let mut rx_a = fabric.register(a.clone());
        let mut rx_b = fabric.register(b.clone());
        let mut rx_c = fabric.register(c.clone());

        let room = RoomId::session("lobby-1");
        fabric.join(&a, room.clone());
        fabric.join(&b, room.clone());

        fabric.emit_to_room(&room, event("ping"));
        assert_eq!(rx_a.try_recv().unwrap(), event("ping"));
        assert_eq!(rx_b.try_recv().unwrap(), event("ping"));
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn emit_to_room_except_skips_the_sender() {
        let fabric = fabric();
        let a = ConnectionId::new("a");
        let b = ConnectionId::new("b");
        let mut rx_a = fabric.register(a.clone());
        let mut rx_b = fabric.register(b.clone());

        let room = RoomId::drawing("d-1");
        fabric.join(&a, room.clone());
        fabric.join(&b, room.clone());

        fabric.emit_to_room_except(&room, &a, event("edit"));
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), event("edit"));
    }

    #[test]
    fn joining_second_session_room_replaces_the_first() {
        let fabric = fabric();
        let conn = ConnectionId::new("c-1");
        let _rx = fabric.register(conn.clone());

        fabric.join(&conn, RoomId::session("lobby-1"));
        fabric.join(&conn, RoomId::session("lobby-2"));

        assert_eq!(
            fabric.session_room_of(&conn),
            Some(SessionId::new("lobby-2"))
        );
        assert!(fabric.members(&RoomId::session("lobby-1")).is_empty());
        assert_eq!(fabric.members(&RoomId::session("lobby-2")), vec![conn]);
    }

    #[test]
    fn session_and_drawing_memberships_are_independent() {
        let fabric = fabric();
        let conn = ConnectionId::new("c-1");
        let _rx = fabric.register(conn.clone());

        fabric.join(&conn, RoomId::session("lobby-1"));
        fabric.join(&conn, RoomId::drawing("d-1"));

        assert_eq!(
            fabric.session_room_of(&conn),
            Some(SessionId::new("lobby-1"))
        );
        assert_eq!(fabric.drawing_room_of(&conn), Some(DrawingId::new("d-1")));

        fabric.leave(&conn, &RoomId::drawing("d-1"));
        assert_eq!(fabric.drawing_room_of(&conn), None);
        assert_eq!(
            fabric.session_room_of(&conn),
            Some(SessionId::new("lobby-1"))
        );
    }

    #[test]
    fn unregister_clears_memberships() {
        let fabric = fabric();
        let conn = ConnectionId::new("c-1");
        let _rx = fabric.register(conn.clone());
        fabric.join(&conn, RoomId::session("lobby-1"));
        fabric.join(&conn, RoomId::drawing("d-1"));

        fabric.unregister(&conn);

        assert!(!fabric.is_registered(&conn));
        assert!(fabric.members(&RoomId::session("lobby-1")).is_empty());
        assert!(fabric.members(&RoomId::drawing("d-1")).is_empty());
        assert_eq!(fabric.session_room_of(&conn), None);
    }

    #[test]
    fn clear_room_evicts_everyone_but_keeps_connections() {
        let fabric = fabric();
        let a = ConnectionId::new("a");
        let b = ConnectionId::new("b");
        let _rx_a = fabric.register(a.clone());
        let _rx_b = fabric.register(b.clone());

        let room = RoomId::session("lobby-1");
        fabric.join(&a, room.clone());
        fabric.join(&b, room.clone());

        fabric.clear_room(&room);

        assert!(fabric.members(&room).is_empty());
        assert_eq!(fabric.session_room_of(&a), None);
        assert!(fabric.is_registered(&a));
        assert!(fabric.is_registered(&b));
    }

    #[test]
    fn connection_gauge_tracks_registrations() {
        let metrics = Arc::new(CoreMetrics::unregistered());
        let fabric = BroadcastFabric::new(Arc::clone(&metrics));
        let conn = ConnectionId::new("c-1");

        let _rx = fabric.register(conn.clone());
        assert_eq!(metrics.connections.get(), 1);
        fabric.unregister(&conn);
        assert_eq!(metrics.connections.get(), 0);
    }
}
