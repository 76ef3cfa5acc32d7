use serde::{Deserialize, Serialize};
use tonk_engine::cards::Card;
use tonk_engine::game::{GameSession, GameStatus, PlayerId, TableId};

/// Public projection of a session: everything every spectator may see.
/// Hidden hands are reduced to counts; the full `Seat` never crosses
/// this boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableView {
    pub table_id: TableId,
    pub status: GameStatus,
    pub seats: Vec<SeatView>,
    pub current_turn: usize,
    pub deck_count: usize,
    pub top_discard: Option<Card>,
    pub pot_amount: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatView {
    pub player_id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub is_active_turn: bool,
    pub hand_count: usize,
}

/// Projects a session into its broadcast-safe view.
pub fn project(session: &GameSession) -> TableView {
    TableView {
        table_id: session.table_id(),
        status: session.status(),
        seats: session
            .seats()
            .iter()
            .map(|seat| SeatView {
                player_id: seat.player_id,
                name: seat.name.clone(),
                avatar: seat.avatar.clone(),
                is_active_turn: seat.is_active_turn,
                hand_count: seat.hand.len(),
            })
            .collect(),
        current_turn: session.current_turn(),
        deck_count: session.deck_count(),
        top_discard: session.top_discard(),
        pot_amount: session.pot_amount(),
    }
}
