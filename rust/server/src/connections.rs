use crate::events::ConnId;
use std::collections::HashMap;
use std::sync::RwLock;
use tonk_engine::game::{PlayerId, TableId};

/// Weak association between seats and live connections. Seats never
/// own transport lifetime; this map is refreshed on (re)connect and
/// cleared on disconnect, leaving a disconnected seat stale rather
/// than tearing the session down.
#[derive(Debug, Default)]
pub struct ConnectionMap {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    players: HashMap<ConnId, PlayerId>,
    seats: HashMap<(TableId, PlayerId), ConnId>,
}

impl ConnectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a connection with a seated player. A reconnect under
    /// a new connection id simply rebinds the seat.
    pub fn bind(&self, conn_id: ConnId, table_id: TableId, player_id: PlayerId) {
        let mut guard = self.inner.write().expect("connection map poisoned");
        guard.players.insert(conn_id, player_id);
        guard.seats.insert((table_id, player_id), conn_id);
    }

    /// Drops every association for a connection. The seat itself stays
    /// in the game; it just has no live transport until a rebind.
    pub fn unbind(&self, conn_id: &ConnId) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.players.remove(conn_id);
        guard.seats.retain(|_, bound| bound != conn_id);
    }

    /// Drops the binding for one seat, keeping the connection's seats
    /// at other tables intact. The reverse mapping survives until the
    /// last seat goes.
    pub fn unbind_seat(&self, table_id: &TableId, player_id: &PlayerId) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(conn_id) = guard.seats.remove(&(*table_id, *player_id)) {
            if !guard.seats.values().any(|bound| *bound == conn_id) {
                guard.players.remove(&conn_id);
            }
        }
    }

    pub fn player_for(&self, conn_id: &ConnId) -> Option<PlayerId> {
        let guard = self.inner.read().expect("connection map poisoned");
        guard.players.get(conn_id).copied()
    }

    pub fn conn_for(&self, table_id: &TableId, player_id: &PlayerId) -> Option<ConnId> {
        let guard = self.inner.read().expect("connection map poisoned");
        guard.seats.get(&(*table_id, *player_id)).copied()
    }
}
