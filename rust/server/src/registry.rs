use crate::connections::ConnectionMap;
use crate::events::{ConnId, EventBus, TableEvent};
use crate::ledger::{BalanceLedger, EntryKind, LedgerEntry, LedgerError};
use crate::projector::{project, TableView};
use crate::records::{GameRecord, GameRecordStore, RecordError, SeatResult};
use crate::roster::{RosterError, TableStore, TableSummary};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tonk_engine::cards::Card;
use tonk_engine::deck::Deck;
use tonk_engine::errors::GameError;
use tonk_engine::game::{
    GameOutcome, GameSession, PlayerAction, PlayerId, SeatInfo, TableId, TurnOutcome,
};

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Cadence of the periodic public-state broadcast per live table.
    pub tick_interval: Duration,
    /// Fixed dealer seed for reproducible games. `None` seeds from
    /// entropy.
    pub deck_seed: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            deck_seed: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No active game at table {0}")]
    SessionNotFound(TableId),
    #[error("Table {0} already has a game in progress")]
    AlreadyInProgress(TableId),
    #[error("Connection {0} is not bound to a seat")]
    UnknownConnection(ConnId),
    #[error(transparent)]
    Roster(#[from] RosterError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("Registry storage poisoned")]
    StoragePoisoned,
}

/// One live game and its broadcast ticker. The handle owns the only
/// mutable path to the session.
struct TableHandle {
    session: Mutex<GameSession>,
    tick: Mutex<Option<JoinHandle<()>>>,
}

/// Owns every active game session and sequences the external effects
/// around its lifecycle: stake debits at the deal, winner credit and
/// the historical record at termination. Roster membership lives in
/// the [`TableStore`]; only tables mid-game appear here.
pub struct TableRegistry {
    tables: RwLock<HashMap<TableId, Arc<TableHandle>>>,
    /// Tables with a deal currently being committed. Reserving the id
    /// here before any stake moves keeps session creation serialized
    /// per table.
    starting: Mutex<HashSet<TableId>>,
    bus: EventBus,
    connections: Arc<ConnectionMap>,
    store: Arc<dyn TableStore>,
    ledger: Arc<dyn BalanceLedger>,
    records: Arc<dyn GameRecordStore>,
    config: RegistryConfig,
}

impl TableRegistry {
    pub fn new(
        bus: EventBus,
        connections: Arc<ConnectionMap>,
        store: Arc<dyn TableStore>,
        ledger: Arc<dyn BalanceLedger>,
        records: Arc<dyn GameRecordStore>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            starting: Mutex::new(HashSet::new()),
            bus,
            connections,
            store,
            ledger,
            records,
            config,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn connections(&self) -> &ConnectionMap {
        &self.connections
    }

    /// Seats a player at a table and subscribes their connection to its
    /// event group. Rejected while a game is running; mid-game joins
    /// would desync the deal.
    pub fn join_table(
        &self,
        table_id: TableId,
        player_id: PlayerId,
        name: String,
        avatar: Option<String>,
        conn_id: ConnId,
    ) -> Result<TableSummary, RegistryError> {
        let table = self.store.load(&table_id)?;
        if table.game_in_progress {
            return Err(RegistryError::AlreadyInProgress(table_id));
        }

        let table = self.store.join(
            &table_id,
            crate::roster::TableSeat {
                player_id,
                name: name.clone(),
                avatar: avatar.clone(),
            },
        )?;

        self.bus.join_group(conn_id, table_id);
        self.connections.bind(conn_id, table_id, player_id);

        tracing::info!(table_id = %table_id, player_id = %player_id, "player joined table");

        self.bus.emit_to_group(
            &table_id,
            TableEvent::PlayerJoined {
                table_id,
                player_id,
                name,
                avatar,
            },
        );
        let summary = table.summary();
        self.bus.emit_to_group(
            &table_id,
            TableEvent::TableUpdated {
                table: summary.clone(),
            },
        );
        Ok(summary)
    }

    /// Removes a player from the roster and its event group. Leaving
    /// mid-game forfeits nothing here; the seat plays on with a stale
    /// connection until the game ends.
    pub fn leave_table(
        &self,
        table_id: TableId,
        player_id: PlayerId,
        conn_id: ConnId,
    ) -> Result<TableSummary, RegistryError> {
        let table = self.store.leave(&table_id, &player_id)?;

        self.bus.leave_group(&conn_id, &table_id);
        self.connections.unbind_seat(&table_id, &player_id);

        tracing::info!(table_id = %table_id, player_id = %player_id, "player left table");

        self.bus
            .emit_to_group(&table_id, TableEvent::PlayerLeft { table_id, player_id });
        let summary = table.summary();
        self.bus.emit_to_group(
            &table_id,
            TableEvent::TableUpdated {
                table: summary.clone(),
            },
        );
        // Nobody seated means nothing left to announce; release the
        // whole group rather than leaking spectator memberships.
        if table.seats.is_empty() {
            self.bus.drop_group(&table_id);
        }
        Ok(summary)
    }

    /// Tears down everything a dropped connection held. The seat stays
    /// in any running game.
    pub fn disconnect(&self, conn_id: &ConnId) {
        self.bus.disconnect(conn_id);
        self.connections.unbind(conn_id);
    }

    /// Deals a new game for the table: debits every seat's stake, and
    /// rolls the debits back as a unit if any seat cannot cover it or
    /// the deal itself fails. On success the table is flagged busy and
    /// the periodic broadcast starts.
    pub fn start_game(&self, table_id: TableId) -> Result<TableView, RegistryError> {
        // Held until the handle is inserted (or the attempt fails), so
        // a concurrent start on the same table cannot debit twice.
        let _reservation = self.reserve_start(table_id)?;

        let table = self.store.load(&table_id)?;
        if table.game_in_progress {
            return Err(RegistryError::AlreadyInProgress(table_id));
        }

        let roster: Vec<SeatInfo> = table
            .seats
            .iter()
            .map(|seat| SeatInfo {
                player_id: seat.player_id,
                name: seat.name.clone(),
                avatar: seat.avatar.clone(),
            })
            .collect();
        if roster.len() < 2 {
            return Err(RegistryError::Game(GameError::NotEnoughPlayers(
                roster.len(),
            )));
        }

        let mut debited: Vec<PlayerId> = Vec::new();
        for seat in &roster {
            if let Err(err) = self.ledger.debit(seat.player_id, table.stake_amount) {
                self.rollback_debits(&debited, table.stake_amount);
                return Err(err.into());
            }
            debited.push(seat.player_id);
        }

        let deck = match self.config.deck_seed {
            Some(seed) => Deck::new_with_seed(seed),
            None => Deck::new(),
        };
        let session = match GameSession::start(table_id, &roster, table.stake_amount, deck) {
            Ok(session) => session,
            Err(err) => {
                self.rollback_debits(&debited, table.stake_amount);
                return Err(err.into());
            }
        };
        let view = project(&session);

        if let Err(err) = self.store.set_in_progress(&table_id, true) {
            self.rollback_debits(&debited, table.stake_amount);
            return Err(err.into());
        }

        let handle = Arc::new(TableHandle {
            session: Mutex::new(session),
            tick: Mutex::new(None),
        });
        {
            let mut guard = self
                .tables
                .write()
                .map_err(|_| RegistryError::StoragePoisoned)?;
            guard.insert(table_id, Arc::clone(&handle));
        }
        self.spawn_tick(table_id, &handle);

        tracing::info!(
            table_id = %table_id,
            seats = roster.len(),
            pot = view.pot_amount,
            "game started"
        );

        self.bus
            .emit_to_group(&table_id, TableEvent::GameStarted { view: view.clone() });
        self.push_hands(&table_id, &handle);

        Ok(view)
    }

    /// Applies one action on behalf of the connection's seat.
    /// Rejections go back privately over that connection and never
    /// touch the session; a terminal outcome commits the payout and
    /// record before returning.
    pub fn process_action(
        &self,
        table_id: TableId,
        conn_id: ConnId,
        action: PlayerAction,
    ) -> Result<TableView, RegistryError> {
        let player_id = self
            .connections
            .player_for(&conn_id)
            .ok_or(RegistryError::UnknownConnection(conn_id))?;
        let handle = self
            .handle_for(&table_id)
            .ok_or(RegistryError::SessionNotFound(table_id))?;

        let (outcome, view, hand) = {
            let mut session = handle
                .session
                .lock()
                .map_err(|_| RegistryError::StoragePoisoned)?;
            match session.apply(player_id, action) {
                Ok(outcome) => {
                    let hand = session.hand_of(player_id).map(|cards| cards.to_vec());
                    (outcome, project(&session), hand)
                }
                Err(err) => {
                    tracing::debug!(
                        table_id = %table_id,
                        player_id = %player_id,
                        error = %err,
                        "action rejected"
                    );
                    self.bus.emit_to_one(
                        &conn_id,
                        TableEvent::ActionRejected {
                            table_id,
                            kind: err.kind().to_string(),
                            message: err.to_string(),
                        },
                    );
                    return Err(err.into());
                }
            }
        };

        self.bus
            .emit_to_group(&table_id, TableEvent::GameStateUpdated { view: view.clone() });
        if let Some(cards) = hand {
            self.bus
                .emit_to_one(&conn_id, TableEvent::HandUpdated { table_id, cards });
        }

        if let TurnOutcome::Ended(outcome) = outcome {
            self.terminate(table_id, outcome)?;
        }
        Ok(view)
    }

    /// Commits a finished game: winner credit, one ledger row per seat,
    /// one historical record, and the table flagged idle again. Safe to
    /// call more than once per table; only the call that removes the
    /// handle commits anything. A failing collaborator degrades this
    /// table's commit but never leaves it flagged busy.
    pub fn terminate(&self, table_id: TableId, outcome: GameOutcome) -> Result<(), RegistryError> {
        let handle = {
            let mut guard = self
                .tables
                .write()
                .map_err(|_| RegistryError::StoragePoisoned)?;
            match guard.remove(&table_id) {
                Some(handle) => handle,
                None => return Ok(()),
            }
        };
        if let Ok(mut tick) = handle.tick.lock() {
            if let Some(task) = tick.take() {
                task.abort();
            }
        }

        // The handle is already gone, so this commit runs exactly once
        // and cannot be retried. Collaborator failures past this point
        // are logged and skipped; in particular the busy flag must be
        // cleared even when a payout step fails.
        let seats: Vec<SeatResult> = {
            let session = match handle.session.lock() {
                Ok(session) => session,
                Err(poisoned) => poisoned.into_inner(),
            };
            session
                .seats()
                .iter()
                .map(|seat| SeatResult {
                    player_id: seat.player_id,
                    name: seat.name.clone(),
                    score: outcome.scores.get(&seat.player_id).copied().unwrap_or(0),
                })
                .collect()
        };
        let table = match self.store.load(&table_id) {
            Ok(table) => Some(table),
            Err(err) => {
                tracing::error!(
                    table_id = %table_id,
                    error = %err,
                    "failed to load roster during game-end commit"
                );
                None
            }
        };
        // Every seat staked the same amount, so the pot reconstructs
        // the stake if the roster store is unavailable.
        let stake_amount = table
            .as_ref()
            .map(|t| t.stake_amount)
            .unwrap_or(outcome.pot_amount / seats.len().max(1) as u32);

        if let Err(err) = self.ledger.credit(outcome.winner_id, outcome.pot_amount) {
            tracing::error!(
                table_id = %table_id,
                winner_id = %outcome.winner_id,
                error = %err,
                "failed to credit pot to winner"
            );
        }
        let reference = format!("GAME-{table_id}");
        let now = Utc::now();
        for seat in &seats {
            let (kind, amount) = if seat.player_id == outcome.winner_id {
                (EntryKind::GameWin, outcome.pot_amount)
            } else {
                (EntryKind::GameLoss, stake_amount)
            };
            if let Err(err) = self.ledger.record_entry(LedgerEntry {
                player_id: seat.player_id,
                kind,
                amount,
                reference: reference.clone(),
                ts: now,
            }) {
                tracing::error!(
                    table_id = %table_id,
                    player_id = %seat.player_id,
                    error = %err,
                    "failed to write ledger entry"
                );
            }
        }

        if let Err(err) = self.records.record_game(GameRecord {
            table_id,
            seats,
            winner_id: outcome.winner_id,
            pot_amount: outcome.pot_amount,
            start_time: outcome.start_time,
            end_time: outcome.end_time,
        }) {
            tracing::error!(table_id = %table_id, error = %err, "failed to store game record");
        }

        // Membership is written back without hands; hands never leave
        // process memory.
        if let Some(table) = table {
            if let Err(err) = self.store.save_roster(&table_id, table.seats) {
                tracing::error!(table_id = %table_id, error = %err, "failed to write roster back");
            }
        }
        if let Err(err) = self.store.set_in_progress(&table_id, false) {
            tracing::error!(table_id = %table_id, error = %err, "failed to clear busy flag");
        }

        tracing::info!(
            table_id = %table_id,
            winner_id = %outcome.winner_id,
            pot = outcome.pot_amount,
            "game ended"
        );

        self.bus.emit_to_group(
            &table_id,
            TableEvent::GameEnded {
                table_id,
                winner_id: outcome.winner_id,
                scores: outcome.scores,
                pot_amount: outcome.pot_amount,
            },
        );
        if let Ok(table) = self.store.load(&table_id) {
            self.bus.emit_to_group(
                &table_id,
                TableEvent::TableUpdated {
                    table: table.summary(),
                },
            );
        }
        Ok(())
    }

    /// Public projection of a running game.
    pub fn state(&self, table_id: &TableId) -> Result<TableView, RegistryError> {
        let handle = self
            .handle_for(table_id)
            .ok_or(RegistryError::SessionNotFound(*table_id))?;
        let session = handle
            .session
            .lock()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        Ok(project(&session))
    }

    /// The requesting seat's own cards, for a private refresh after a
    /// reconnect.
    pub fn hand_view(
        &self,
        table_id: &TableId,
        player_id: &PlayerId,
    ) -> Result<Vec<Card>, RegistryError> {
        let handle = self
            .handle_for(table_id)
            .ok_or(RegistryError::SessionNotFound(*table_id))?;
        let session = handle
            .session
            .lock()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        session
            .hand_of(*player_id)
            .map(|cards| cards.to_vec())
            .ok_or(RegistryError::Roster(RosterError::NotSeated(*player_id)))
    }

    /// Relays a chat line to the table group. The sender must hold a
    /// roster seat; spectators cannot speak.
    pub fn chat(
        &self,
        table_id: TableId,
        player_id: PlayerId,
        message: String,
    ) -> Result<(), RegistryError> {
        let table = self.store.load(&table_id)?;
        let seat = table
            .seats
            .iter()
            .find(|seat| seat.player_id == player_id)
            .ok_or(RegistryError::Roster(RosterError::NotSeated(player_id)))?;

        self.bus.emit_to_group(
            &table_id,
            TableEvent::ChatMessage {
                table_id,
                player_id,
                player_name: seat.name.clone(),
                message,
                timestamp: Utc::now().to_rfc3339(),
            },
        );
        Ok(())
    }

    pub fn active_tables(&self) -> Vec<TableId> {
        match self.tables.read() {
            Ok(guard) => guard.keys().copied().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn is_active(&self, table_id: &TableId) -> bool {
        self.handle_for(table_id).is_some()
    }

    fn handle_for(&self, table_id: &TableId) -> Option<Arc<TableHandle>> {
        let guard = self.tables.read().ok()?;
        guard.get(table_id).cloned()
    }

    /// Claims the exclusive right to deal at this table. The claim is
    /// released when the returned guard drops; by then either the
    /// handle is in `tables` or the start has failed.
    fn reserve_start(&self, table_id: TableId) -> Result<StartReservation<'_>, RegistryError> {
        let mut starting = self
            .starting
            .lock()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        if self.handle_for(&table_id).is_some() || !starting.insert(table_id) {
            return Err(RegistryError::AlreadyInProgress(table_id));
        }
        Ok(StartReservation {
            registry: self,
            table_id,
        })
    }

    fn rollback_debits(&self, debited: &[PlayerId], stake_amount: u32) {
        for &player_id in debited {
            if let Err(err) = self.ledger.credit(player_id, stake_amount) {
                tracing::error!(
                    player_id = %player_id,
                    error = %err,
                    "failed to refund stake after aborted deal"
                );
            }
        }
    }

    fn push_hands(&self, table_id: &TableId, handle: &Arc<TableHandle>) {
        let hands: Vec<(PlayerId, Vec<Card>)> = match handle.session.lock() {
            Ok(session) => session
                .seats()
                .iter()
                .map(|seat| (seat.player_id, seat.hand.clone()))
                .collect(),
            Err(_) => return,
        };
        for (player_id, cards) in hands {
            if let Some(conn_id) = self.connections.conn_for(table_id, &player_id) {
                self.bus.emit_to_one(
                    &conn_id,
                    TableEvent::HandUpdated {
                        table_id: *table_id,
                        cards,
                    },
                );
            }
        }
    }

    fn spawn_tick(&self, table_id: TableId, handle: &Arc<TableHandle>) {
        let bus = self.bus.clone();
        let tick_handle = Arc::clone(handle);
        let interval = self.config.tick_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick fires immediately; skip it so broadcasts start
            // one interval after the deal.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let view = match tick_handle.session.lock() {
                    Ok(session) => project(&session),
                    Err(_) => break,
                };
                bus.emit_to_group(&table_id, TableEvent::GameStateUpdated { view });
            }
        });
        if let Ok(mut tick) = handle.tick.lock() {
            *tick = Some(task);
        }
    }
}

struct StartReservation<'a> {
    registry: &'a TableRegistry,
    table_id: TableId,
}

impl Drop for StartReservation<'_> {
    fn drop(&mut self) {
        let mut starting = match self.registry.starting.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        starting.remove(&self.table_id);
    }
}
