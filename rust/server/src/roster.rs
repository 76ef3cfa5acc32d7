use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use tonk_engine::game::{PlayerId, TableId};
use uuid::Uuid;

/// Persisted table state: seat roster and stake, the source of truth
/// for membership outside of play. Hands are never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    pub name: String,
    pub stake_amount: u32,
    pub max_seats: usize,
    pub seats: Vec<TableSeat>,
    pub game_in_progress: bool,
}

/// Roster entry for one seated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSeat {
    pub player_id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Lobby-facing summary broadcast on roster changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub id: TableId,
    pub name: String,
    pub stake_amount: u32,
    pub max_seats: usize,
    pub seats: Vec<TableSeat>,
    pub status: TableStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Waiting,
    Full,
    Active,
}

impl Table {
    pub fn summary(&self) -> TableSummary {
        let status = if self.game_in_progress {
            TableStatus::Active
        } else if self.seats.len() >= self.max_seats {
            TableStatus::Full
        } else {
            TableStatus::Waiting
        };
        TableSummary {
            id: self.id,
            name: self.name.clone(),
            stake_amount: self.stake_amount,
            max_seats: self.max_seats,
            seats: self.seats.clone(),
            status,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("Table not found: {0}")]
    NotFound(TableId),
    #[error("Table {0} is full")]
    TableFull(TableId),
    #[error("Player {0} already seated at this table")]
    AlreadyJoined(PlayerId),
    #[error("Player {0} is not seated at this table")]
    NotSeated(PlayerId),
    #[error("Roster storage poisoned")]
    StoragePoisoned,
}

/// External roster store contract. The registry reads the roster once
/// at session start and writes membership back when the table returns
/// to idle.
pub trait TableStore: Send + Sync {
    fn load(&self, table_id: &TableId) -> Result<Table, RosterError>;
    fn save_roster(&self, table_id: &TableId, seats: Vec<TableSeat>) -> Result<(), RosterError>;
    fn set_in_progress(&self, table_id: &TableId, in_progress: bool) -> Result<(), RosterError>;
    fn join(&self, table_id: &TableId, seat: TableSeat) -> Result<Table, RosterError>;
    fn leave(&self, table_id: &TableId, player_id: &PlayerId) -> Result<Table, RosterError>;
}

/// In-memory roster store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    tables: RwLock<HashMap<TableId, Table>>,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table and returns its id.
    pub fn create(&self, name: impl Into<String>, stake_amount: u32, max_seats: usize) -> TableId {
        let id = Uuid::new_v4();
        let table = Table {
            id,
            name: name.into(),
            stake_amount,
            max_seats,
            seats: Vec::new(),
            game_in_progress: false,
        };
        let mut guard = self.tables.write().expect("table store poisoned");
        guard.insert(id, table);
        id
    }
}

impl TableStore for InMemoryTableStore {
    fn load(&self, table_id: &TableId) -> Result<Table, RosterError> {
        let guard = self
            .tables
            .read()
            .map_err(|_| RosterError::StoragePoisoned)?;
        guard
            .get(table_id)
            .cloned()
            .ok_or(RosterError::NotFound(*table_id))
    }

    fn save_roster(&self, table_id: &TableId, seats: Vec<TableSeat>) -> Result<(), RosterError> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| RosterError::StoragePoisoned)?;
        let table = guard
            .get_mut(table_id)
            .ok_or(RosterError::NotFound(*table_id))?;
        table.seats = seats;
        Ok(())
    }

    fn set_in_progress(&self, table_id: &TableId, in_progress: bool) -> Result<(), RosterError> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| RosterError::StoragePoisoned)?;
        let table = guard
            .get_mut(table_id)
            .ok_or(RosterError::NotFound(*table_id))?;
        table.game_in_progress = in_progress;
        Ok(())
    }

    fn join(&self, table_id: &TableId, seat: TableSeat) -> Result<Table, RosterError> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| RosterError::StoragePoisoned)?;
        let table = guard
            .get_mut(table_id)
            .ok_or(RosterError::NotFound(*table_id))?;
        if table.seats.iter().any(|s| s.player_id == seat.player_id) {
            return Err(RosterError::AlreadyJoined(seat.player_id));
        }
        if table.seats.len() >= table.max_seats {
            return Err(RosterError::TableFull(*table_id));
        }
        table.seats.push(seat);
        Ok(table.clone())
    }

    fn leave(&self, table_id: &TableId, player_id: &PlayerId) -> Result<Table, RosterError> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| RosterError::StoragePoisoned)?;
        let table = guard
            .get_mut(table_id)
            .ok_or(RosterError::NotFound(*table_id))?;
        let before = table.seats.len();
        table.seats.retain(|s| s.player_id != *player_id);
        if table.seats.len() == before {
            return Err(RosterError::NotSeated(*player_id));
        }
        Ok(table.clone())
    }
}
