/// Event delivery across a table's lifecycle, driven straight through
/// the registry with bus subscriptions standing in for SSE clients.
use std::sync::Arc;
use std::time::Duration;
use tonk_server::{
    BalanceLedger, ConnectionMap, EventBus, EventSubscription, GameRecordStore, InMemoryLedger,
    InMemoryRecordStore, InMemoryTableStore, RegistryConfig, TableEvent, TableRegistry,
    TableStore,
};
use tonk_engine::deck::HAND_SIZE;
use tonk_engine::game::{PlayerAction, PlayerId, TableId};
use uuid::Uuid;

struct Fixture {
    registry: Arc<TableRegistry>,
    store: Arc<InMemoryTableStore>,
    ledger: Arc<InMemoryLedger>,
    table_id: TableId,
}

fn fixture(stake: u32) -> Fixture {
    let store = Arc::new(InMemoryTableStore::new());
    let ledger = Arc::new(InMemoryLedger::new());
    let registry = Arc::new(TableRegistry::new(
        EventBus::new(),
        Arc::new(ConnectionMap::new()),
        Arc::clone(&store) as Arc<dyn TableStore>,
        Arc::clone(&ledger) as Arc<dyn BalanceLedger>,
        Arc::new(InMemoryRecordStore::new()) as Arc<dyn GameRecordStore>,
        RegistryConfig {
            tick_interval: Duration::from_millis(20),
            deck_seed: Some(99),
        },
    ));
    let table_id = store.create("event table", stake, 6);
    Fixture {
        registry,
        store,
        ledger,
        table_id,
    }
}

/// Registers a bus connection and seats the player with it.
fn seat_player(fx: &Fixture, name: &str) -> (PlayerId, EventSubscription) {
    let player_id = Uuid::new_v4();
    fx.ledger.set_balance(player_id, 1000);
    let conn_id = Uuid::new_v4();
    let sub = fx.registry.event_bus().register(conn_id);
    fx.registry
        .join_table(fx.table_id, player_id, name.into(), None, conn_id)
        .expect("join ok");
    (player_id, sub)
}

fn drain(sub: &mut EventSubscription) -> Vec<TableEvent> {
    let mut events = Vec::new();
    while let Ok(event) = sub.receiver.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn joins_announce_to_everyone_already_seated() {
    let fx = fixture(10);
    let (_first, mut first_sub) = seat_player(&fx, "first");
    drain(&mut first_sub);

    let (second, mut second_sub) = seat_player(&fx, "second");

    let first_events = drain(&mut first_sub);
    assert!(first_events.iter().any(|e| matches!(
        e,
        TableEvent::PlayerJoined { player_id, .. } if *player_id == second
    )));
    assert!(first_events
        .iter()
        .any(|e| matches!(e, TableEvent::TableUpdated { table } if table.seats.len() == 2)));

    // The joiner sees its own announcement too.
    let second_events = drain(&mut second_sub);
    assert!(second_events
        .iter()
        .any(|e| matches!(e, TableEvent::PlayerJoined { .. })));
}

#[tokio::test]
async fn deal_broadcasts_public_view_and_private_hands() {
    let fx = fixture(10);
    let (first, mut first_sub) = seat_player(&fx, "first");
    let (_second, mut second_sub) = seat_player(&fx, "second");
    drain(&mut first_sub);
    drain(&mut second_sub);

    fx.registry.start_game(fx.table_id).expect("start ok");

    let first_events = drain(&mut first_sub);
    let started = first_events
        .iter()
        .find_map(|e| match e {
            TableEvent::GameStarted { view } => Some(view),
            _ => None,
        })
        .expect("GameStarted delivered");
    assert!(started.seats.iter().all(|s| s.hand_count == HAND_SIZE));
    assert_eq!(started.pot_amount, 20);

    // Each seat gets exactly its own hand, never another seat's.
    let first_hands: Vec<&TableEvent> = first_events
        .iter()
        .filter(|e| matches!(e, TableEvent::HandUpdated { .. }))
        .collect();
    assert_eq!(first_hands.len(), 1);
    match first_hands[0] {
        TableEvent::HandUpdated { cards, .. } => {
            let own = fx
                .registry
                .hand_view(&fx.table_id, &first)
                .expect("hand ok");
            assert_eq!(*cards, own);
        }
        _ => unreachable!(),
    }

    let second_hands = drain(&mut second_sub)
        .into_iter()
        .filter(|e| matches!(e, TableEvent::HandUpdated { .. }))
        .count();
    assert_eq!(second_hands, 1);
}

#[tokio::test]
async fn rejections_stay_private_to_the_offender() {
    let fx = fixture(10);
    let (first, mut first_sub) = seat_player(&fx, "first");
    let (_second, mut second_sub) = seat_player(&fx, "second");
    fx.registry.start_game(fx.table_id).expect("start ok");
    drain(&mut first_sub);
    drain(&mut second_sub);

    // Seats keep join order, so the first joiner holds the opening
    // turn and the second connection acting is out of turn.
    let state = fx.registry.state(&fx.table_id).expect("state ok");
    assert_eq!(state.seats[0].player_id, first);
    fx.registry
        .process_action(fx.table_id, second_sub.conn_id(), PlayerAction::DrawFromDeck)
        .unwrap_err();

    let offender_events = drain(&mut second_sub);
    assert!(offender_events.iter().any(|e| matches!(
        e,
        TableEvent::ActionRejected { kind, .. } if kind == "not_your_turn"
    )));
    assert!(drain(&mut first_sub)
        .iter()
        .all(|e| !matches!(e, TableEvent::ActionRejected { .. })));
}

#[tokio::test]
async fn game_end_reaches_the_whole_group() {
    let fx = fixture(10);
    let (_first, mut first_sub) = seat_player(&fx, "first");
    let (_second, mut second_sub) = seat_player(&fx, "second");
    fx.registry.start_game(fx.table_id).expect("start ok");
    drain(&mut first_sub);
    drain(&mut second_sub);

    let view = fx.registry.state(&fx.table_id).expect("state ok");
    assert_eq!(view.current_turn, 0);
    fx.registry
        .process_action(fx.table_id, first_sub.conn_id(), PlayerAction::TonkClaim)
        .expect("claim ok");

    for sub in [&mut first_sub, &mut second_sub] {
        let events = drain(sub);
        let ended = events
            .iter()
            .find_map(|e| match e {
                TableEvent::GameEnded {
                    pot_amount, scores, ..
                } => Some((pot_amount, scores)),
                _ => None,
            })
            .expect("GameEnded delivered");
        assert_eq!(*ended.0, 20);
        assert_eq!(ended.1.len(), 2);
    }
    assert!(!fx.store.load(&fx.table_id).unwrap().game_in_progress);
}

#[tokio::test]
async fn periodic_tick_rebroadcasts_public_state() {
    let fx = fixture(10);
    let (_first, mut first_sub) = seat_player(&fx, "first");
    let (_second, _second_sub) = seat_player(&fx, "second");
    fx.registry.start_game(fx.table_id).expect("start ok");
    drain(&mut first_sub);

    // Two 20ms intervals are plenty for at least one tick.
    tokio::time::sleep(Duration::from_millis(80)).await;

    let events = drain(&mut first_sub);
    assert!(events
        .iter()
        .any(|e| matches!(e, TableEvent::GameStateUpdated { .. })));
}

#[tokio::test]
async fn chat_is_relayed_with_the_sender_name() {
    let fx = fixture(10);
    let (first, _first_sub) = seat_player(&fx, "first");
    let (_second, mut second_sub) = seat_player(&fx, "second");
    drain(&mut second_sub);

    fx.registry
        .chat(fx.table_id, first, "good luck".into())
        .expect("chat ok");

    let events = drain(&mut second_sub);
    match events.as_slice() {
        [TableEvent::ChatMessage {
            player_name,
            message,
            ..
        }] => {
            assert_eq!(player_name, "first");
            assert_eq!(message, "good luck");
        }
        other => panic!("expected one chat message, got {other:?}"),
    }
}
