use crate::projector::TableView;
use crate::roster::TableSummary;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tonk_engine::cards::Card;
use tonk_engine::game::{PlayerId, TableId};
use uuid::Uuid;

// Use bounded channels with a reasonable buffer to prevent memory
// exhaustion. Events for slow consumers are dropped (backpressure).
const EVENT_CHANNEL_BUFFER: usize = 1000;

pub type ConnId = Uuid;
pub type EventSender = mpsc::Sender<TableEvent>;
pub type EventReceiver = mpsc::Receiver<TableEvent>;

/// A live connection's view into the bus. Dropping the subscription
/// unregisters the connection and leaves every group it joined.
pub struct EventSubscription {
    bus: EventBus,
    conn_id: ConnId,
    pub receiver: EventReceiver,
}

impl EventSubscription {
    pub fn conn_id(&self) -> ConnId {
        self.conn_id
    }

    pub fn receiver(&mut self) -> &mut EventReceiver {
        &mut self.receiver
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.bus.disconnect(&self.conn_id);
    }
}

/// Transport boundary: connection groups keyed by table id. Delivery
/// is fire-and-forget; one failed connection never affects the others
/// or the session state.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Debug, Default)]
struct EventBusInner {
    connections: RwLock<HashMap<ConnId, EventSender>>,
    groups: RwLock<HashMap<TableId, HashSet<ConnId>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and hands back its event stream. A
    /// reconnect under the same id replaces the previous sender.
    pub fn register(&self, conn_id: ConnId) -> EventSubscription {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER);
        {
            let mut guard = self
                .inner
                .connections
                .write()
                .expect("connection lock poisoned");
            guard.insert(conn_id, tx);
        }

        tracing::info!(conn_id = %conn_id, "connection registered for events");

        EventSubscription {
            bus: self.clone(),
            conn_id,
            receiver: rx,
        }
    }

    pub fn join_group(&self, conn_id: ConnId, table_id: TableId) {
        let mut guard = self.inner.groups.write().expect("group lock poisoned");
        guard.entry(table_id).or_default().insert(conn_id);
    }

    pub fn leave_group(&self, conn_id: &ConnId, table_id: &TableId) {
        let mut guard = self.inner.groups.write().expect("group lock poisoned");
        if let Some(members) = guard.get_mut(table_id) {
            members.remove(conn_id);
            if members.is_empty() {
                guard.remove(table_id);
            }
        }
    }

    pub fn emit_to_group(&self, table_id: &TableId, event: TableEvent) {
        tracing::debug!(
            table_id = %table_id,
            event_type = ?event,
            "broadcasting table event"
        );

        let members: Vec<ConnId> = {
            let guard = self.inner.groups.read().expect("group lock poisoned");
            match guard.get(table_id) {
                Some(members) => members.iter().copied().collect(),
                None => {
                    tracing::debug!(table_id = %table_id, "no group members for table");
                    return;
                }
            }
        };

        let mut failed = Vec::new();
        for conn_id in members {
            if !self.send_to(&conn_id, event.clone()) {
                failed.push(conn_id);
            }
        }
        for conn_id in failed {
            self.disconnect(&conn_id);
        }
    }

    pub fn emit_to_one(&self, conn_id: &ConnId, event: TableEvent) {
        if !self.send_to(conn_id, event) {
            self.disconnect(conn_id);
        }
    }

    /// Removes a connection and its group memberships. Safe to call
    /// for ids that were already removed.
    pub fn disconnect(&self, conn_id: &ConnId) {
        {
            let mut guard = match self.inner.connections.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.remove(conn_id);
        }
        let mut guard = match self.inner.groups.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.retain(|_, members| {
            members.remove(conn_id);
            !members.is_empty()
        });
    }

    pub fn drop_group(&self, table_id: &TableId) {
        let mut guard = self.inner.groups.write().expect("group lock poisoned");
        guard.remove(table_id);
    }

    pub fn connection_count(&self) -> usize {
        let guard = self
            .inner
            .connections
            .read()
            .expect("connection lock poisoned");
        guard.len()
    }

    pub fn group_size(&self, table_id: &TableId) -> usize {
        let guard = self.inner.groups.read().expect("group lock poisoned");
        guard.get(table_id).map(|m| m.len()).unwrap_or(0)
    }

    fn send_to(&self, conn_id: &ConnId, event: TableEvent) -> bool {
        let sender = {
            let guard = self
                .inner
                .connections
                .read()
                .expect("connection lock poisoned");
            guard.get(conn_id).cloned()
        };

        match sender {
            Some(sender) => {
                // try_send keeps broadcast non-blocking; a full or
                // closed channel marks the connection for removal.
                if let Err(err) = sender.try_send(event) {
                    tracing::warn!(
                        conn_id = %conn_id,
                        error = ?err,
                        "failed to deliver event to connection"
                    );
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }
}

/// Everything the server pushes over a connection. Closed tagged set;
/// `ActionRejected` and `HandUpdated` only ever go to one connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableEvent {
    GameStarted {
        view: TableView,
    },
    GameStateUpdated {
        view: TableView,
    },
    /// Private push of the receiving seat's own hand.
    HandUpdated {
        table_id: TableId,
        cards: Vec<Card>,
    },
    GameEnded {
        table_id: TableId,
        winner_id: PlayerId,
        scores: HashMap<PlayerId, u32>,
        pot_amount: u32,
    },
    PlayerJoined {
        table_id: TableId,
        player_id: PlayerId,
        name: String,
        avatar: Option<String>,
    },
    PlayerLeft {
        table_id: TableId,
        player_id: PlayerId,
    },
    TableUpdated {
        table: TableSummary,
    },
    ChatMessage {
        table_id: TableId,
        player_id: PlayerId,
        player_name: String,
        message: String,
        timestamp: String,
    },
    /// Private rejection notice with a stable machine-readable kind.
    ActionRejected {
        table_id: TableId,
        kind: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejection(table_id: TableId) -> TableEvent {
        TableEvent::ActionRejected {
            table_id,
            kind: "not_your_turn".into(),
            message: "ping".into(),
        }
    }

    #[test]
    fn subscription_drop_unregisters_connection() {
        let bus = EventBus::new();
        let table_id = Uuid::new_v4();
        {
            let sub = bus.register(Uuid::new_v4());
            bus.join_group(sub.conn_id(), table_id);
            assert_eq!(bus.connection_count(), 1);
            assert_eq!(bus.group_size(&table_id), 1);
        }
        assert_eq!(bus.connection_count(), 0);
        assert_eq!(bus.group_size(&table_id), 0);
    }

    #[test]
    fn group_emit_reaches_all_members() {
        let bus = EventBus::new();
        let table_id = Uuid::new_v4();
        let mut sub1 = bus.register(Uuid::new_v4());
        let mut sub2 = bus.register(Uuid::new_v4());
        bus.join_group(sub1.conn_id(), table_id);
        bus.join_group(sub2.conn_id(), table_id);

        bus.emit_to_group(&table_id, rejection(table_id));

        let ev1 = sub1.receiver.try_recv().expect("sub1 event");
        let ev2 = sub2.receiver.try_recv().expect("sub2 event");
        assert!(matches!(ev1, TableEvent::ActionRejected { .. }));
        assert!(matches!(ev2, TableEvent::ActionRejected { .. }));
    }

    #[test]
    fn private_emit_skips_the_rest_of_the_group() {
        let bus = EventBus::new();
        let table_id = Uuid::new_v4();
        let mut target = bus.register(Uuid::new_v4());
        let mut other = bus.register(Uuid::new_v4());
        bus.join_group(target.conn_id(), table_id);
        bus.join_group(other.conn_id(), table_id);

        bus.emit_to_one(&target.conn_id(), rejection(table_id));

        assert!(target.receiver.try_recv().is_ok());
        assert!(other.receiver.try_recv().is_err());
    }

    #[test]
    fn stale_connection_is_pruned_on_emit() {
        let bus = EventBus::new();
        let table_id = Uuid::new_v4();
        let conn_id = Uuid::new_v4();
        let mut sub = bus.register(conn_id);
        bus.join_group(conn_id, table_id);
        // Drop only the receiver half, keeping the registration.
        let (_tx, placeholder) = mpsc::channel(1);
        drop(std::mem::replace(&mut sub.receiver, placeholder));

        bus.emit_to_group(&table_id, rejection(table_id));
        assert_eq!(bus.connection_count(), 0);
        assert_eq!(bus.group_size(&table_id), 0);
    }

    #[test]
    fn leave_group_stops_delivery_but_keeps_connection() {
        let bus = EventBus::new();
        let table_id = Uuid::new_v4();
        let mut sub = bus.register(Uuid::new_v4());
        bus.join_group(sub.conn_id(), table_id);
        bus.leave_group(&sub.conn_id(), &table_id);

        bus.emit_to_group(&table_id, rejection(table_id));
        assert!(sub.receiver.try_recv().is_err());
        assert_eq!(bus.connection_count(), 1);
    }
}
