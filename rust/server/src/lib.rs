//! HTTP and SSE hosting layer for multi-player Tonk tables.
//!
//! The engine crate owns the rules; this crate owns everything around
//! a running game: the table roster, per-table event groups, the
//! sanitized state broadcast, stake settlement through the balance
//! ledger, and the historical record written when a game ends.

pub mod connections;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod ledger;
pub mod logging;
pub mod projector;
pub mod records;
pub mod registry;
pub mod roster;
pub mod server;

pub use connections::ConnectionMap;
pub use errors::{ErrorResponse, IntoErrorResponse};
pub use events::{ConnId, EventBus, EventSubscription, TableEvent};
pub use ledger::{BalanceLedger, EntryKind, InMemoryLedger, LedgerEntry, LedgerError};
pub use logging::{init_logging, CapturedLog, LogCapture};
pub use projector::{project, SeatView, TableView};
pub use records::{GameRecord, GameRecordStore, InMemoryRecordStore, RecordError, SeatResult};
pub use registry::{RegistryConfig, RegistryError, TableRegistry};
pub use roster::{
    InMemoryTableStore, RosterError, Table, TableSeat, TableStatus, TableStore, TableSummary,
};
pub use server::{AppContext, ServerConfig, ServerError, ServerHandle, WebServer};
