use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use tonk_engine::game::PlayerId;

/// External balance ledger contract. Each call is independently
/// atomic; the registry sequences them around session creation and
/// termination.
pub trait BalanceLedger: Send + Sync {
    /// Removes `amount` from the player's balance, failing without any
    /// mutation when the balance cannot cover it.
    fn debit(&self, player_id: PlayerId, amount: u32) -> Result<(), LedgerError>;

    /// Adds `amount` to the player's balance.
    fn credit(&self, player_id: PlayerId, amount: u32) -> Result<(), LedgerError>;

    /// Records a ledger row describing a debit or credit.
    fn record_entry(&self, entry: LedgerEntry) -> Result<(), LedgerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    GameWin,
    GameLoss,
}

/// One immutable ledger row, referencing the game that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub player_id: PlayerId,
    pub kind: EntryKind,
    pub amount: u32,
    pub reference: String,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient funds for player {player_id}: need {needed}, have {available}")]
    InsufficientFunds {
        player_id: PlayerId,
        needed: u32,
        available: u32,
    },
    #[error("Ledger storage poisoned")]
    StoragePoisoned,
}

/// In-memory ledger for tests and single-process deployments. Players
/// not seeded with a balance are treated as holding zero.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: RwLock<HashMap<PlayerId, u32>>,
    entries: RwLock<Vec<LedgerEntry>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, player_id: PlayerId, amount: u32) {
        let mut guard = self.balances.write().expect("ledger poisoned");
        guard.insert(player_id, amount);
    }

    pub fn balance_of(&self, player_id: &PlayerId) -> u32 {
        let guard = self.balances.read().expect("ledger poisoned");
        guard.get(player_id).copied().unwrap_or(0)
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        let guard = self.entries.read().expect("ledger poisoned");
        guard.clone()
    }
}

impl BalanceLedger for InMemoryLedger {
    fn debit(&self, player_id: PlayerId, amount: u32) -> Result<(), LedgerError> {
        let mut guard = self
            .balances
            .write()
            .map_err(|_| LedgerError::StoragePoisoned)?;
        let balance = guard.entry(player_id).or_insert(0);
        if *balance < amount {
            return Err(LedgerError::InsufficientFunds {
                player_id,
                needed: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(&self, player_id: PlayerId, amount: u32) -> Result<(), LedgerError> {
        let mut guard = self
            .balances
            .write()
            .map_err(|_| LedgerError::StoragePoisoned)?;
        let balance = guard.entry(player_id).or_insert(0);
        *balance = balance.saturating_add(amount);
        Ok(())
    }

    fn record_entry(&self, entry: LedgerEntry) -> Result<(), LedgerError> {
        let mut guard = self
            .entries
            .write()
            .map_err(|_| LedgerError::StoragePoisoned)?;
        guard.push(entry);
        Ok(())
    }
}
