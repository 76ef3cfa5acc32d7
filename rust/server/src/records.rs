use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use thiserror::Error;
use tonk_engine::game::{PlayerId, TableId};
use uuid::Uuid;

pub type RecordId = Uuid;

/// Immutable record of one finished game, captured exactly once at
/// termination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub table_id: TableId,
    pub seats: Vec<SeatResult>,
    pub winner_id: PlayerId,
    pub pot_amount: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatResult {
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Record storage poisoned")]
    StoragePoisoned,
}

/// External historical record store contract.
pub trait GameRecordStore: Send + Sync {
    fn record_game(&self, record: GameRecord) -> Result<RecordId, RecordError>;
}

/// In-memory record store with recency queries for tests and
/// single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<Vec<(RecordId, GameRecord)>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<GameRecord>, RecordError> {
        let guard = self
            .records
            .read()
            .map_err(|_| RecordError::StoragePoisoned)?;
        Ok(guard
            .iter()
            .rev()
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect())
    }

    pub fn get(&self, record_id: &RecordId) -> Result<Option<GameRecord>, RecordError> {
        let guard = self
            .records
            .read()
            .map_err(|_| RecordError::StoragePoisoned)?;
        Ok(guard
            .iter()
            .find(|(id, _)| id == record_id)
            .map(|(_, record)| record.clone()))
    }

    pub fn total(&self) -> Result<usize, RecordError> {
        let guard = self
            .records
            .read()
            .map_err(|_| RecordError::StoragePoisoned)?;
        Ok(guard.len())
    }
}

impl GameRecordStore for InMemoryRecordStore {
    fn record_game(&self, record: GameRecord) -> Result<RecordId, RecordError> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| RecordError::StoragePoisoned)?;
        let id = Uuid::new_v4();
        guard.push((id, record));
        Ok(id)
    }
}
