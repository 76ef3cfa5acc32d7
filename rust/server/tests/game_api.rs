/// End-to-end tests for the table API over a real HTTP server.
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tonk_server::{
    AppContext, BalanceLedger, ConnectionMap, EventBus, GameRecordStore, InMemoryLedger,
    InMemoryRecordStore, InMemoryTableStore, RegistryConfig, ServerConfig, TableRegistry,
    TableStore, WebServer,
};
use uuid::Uuid;
use warp::hyper::{self, Body, Client as HyperClient, Request};

struct TestServer {
    handle: tonk_server::ServerHandle,
    store: Arc<InMemoryTableStore>,
    ledger: Arc<InMemoryLedger>,
}

async fn start_server() -> TestServer {
    let store = Arc::new(InMemoryTableStore::new());
    let ledger = Arc::new(InMemoryLedger::new());
    let records = Arc::new(InMemoryRecordStore::new());
    let registry = Arc::new(TableRegistry::new(
        EventBus::new(),
        Arc::new(ConnectionMap::new()),
        Arc::clone(&store) as Arc<dyn TableStore>,
        Arc::clone(&ledger) as Arc<dyn BalanceLedger>,
        records as Arc<dyn GameRecordStore>,
        RegistryConfig {
            tick_interval: Duration::from_secs(3600),
            deck_seed: Some(7),
        },
    ));
    let context = AppContext::with_registry(ServerConfig::for_tests(), registry);
    let handle = WebServer::from_context(context)
        .start()
        .await
        .expect("start server");

    TestServer {
        handle,
        store,
        ledger,
    }
}

async fn post_json(
    client: &HyperClient<hyper::client::HttpConnector>,
    uri: String,
    body: serde_json::Value,
) -> (hyper::StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(hyper::Method::POST)
        .uri(uri)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request");
    let response = client.request(request).await.expect("send request");
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("read body");
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse body")
    };
    (status, value)
}

async fn get_json(
    client: &HyperClient<hyper::client::HttpConnector>,
    uri: String,
) -> (hyper::StatusCode, serde_json::Value) {
    let response = client
        .get(uri.parse::<hyper::Uri>().expect("parse uri"))
        .await
        .expect("send request");
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("read body");
    let value = serde_json::from_slice(&bytes).expect("parse body");
    (status, value)
}

#[tokio::test]
async fn health_endpoint_responds() {
    let server = start_server().await;
    let address = server.handle.address();
    let client = HyperClient::new();

    let (status, body) = get_json(&client, format!("http://{address}/health")).await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn full_table_lifecycle_over_http() {
    let server = start_server().await;
    let address = server.handle.address();
    let client = HyperClient::new();

    let table_id = server.store.create("api table", 10, 4);
    let players: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
    let conns: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
    for (i, (player, conn)) in players.iter().zip(&conns).enumerate() {
        server.ledger.set_balance(*player, 100);
        let (status, body) = post_json(
            &client,
            format!("http://{address}/api/tables/{table_id}/join"),
            json!({
                "player_id": player,
                "name": format!("player-{i}"),
                "conn_id": conn,
            }),
        )
        .await;
        assert_eq!(status, hyper::StatusCode::OK);
        assert_eq!(body["seats"].as_array().unwrap().len(), i + 1);
    }

    let (status, view) = post_json(
        &client,
        format!("http://{address}/api/tables/{table_id}/start"),
        json!({}),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::CREATED);
    assert_eq!(view["pot_amount"], 20);
    assert_eq!(view["seats"].as_array().unwrap().len(), 2);
    assert!(view["seats"][0]["hand_count"].is_number());
    assert!(view["seats"][0].get("hand").is_none());

    // Current seat draws and discards over the API. Seats keep join
    // order, so the first joiner's connection holds the opening turn.
    assert_eq!(
        view["seats"][0]["player_id"].as_str().expect("player id"),
        players[0].to_string()
    );
    let current_conn = conns[0];
    let (status, _) = post_json(
        &client,
        format!("http://{address}/api/tables/{table_id}/actions"),
        json!({ "conn_id": current_conn, "kind": "draw_from_deck" }),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);

    let (status, after) = post_json(
        &client,
        format!("http://{address}/api/tables/{table_id}/actions"),
        json!({ "conn_id": current_conn, "kind": "discard", "card_index": 0 }),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(after["current_turn"], 1);

    let (status, state) = get_json(
        &client,
        format!("http://{address}/api/tables/{table_id}/state"),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(state["current_turn"], 1);

    server.handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn out_of_turn_action_returns_stable_error_code() {
    let server = start_server().await;
    let address = server.handle.address();
    let client = HyperClient::new();

    let table_id = server.store.create("api table", 10, 4);
    let players: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
    let conns: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
    for (i, (player, conn)) in players.iter().zip(&conns).enumerate() {
        server.ledger.set_balance(*player, 100);
        post_json(
            &client,
            format!("http://{address}/api/tables/{table_id}/join"),
            json!({
                "player_id": player,
                "name": format!("player-{i}"),
                "conn_id": conn,
            }),
        )
        .await;
    }
    post_json(
        &client,
        format!("http://{address}/api/tables/{table_id}/start"),
        json!({}),
    )
    .await;

    // Seat 1 holds no turn yet; its connection acting is out of turn.
    let (status, body) = post_json(
        &client,
        format!("http://{address}/api/tables/{table_id}/actions"),
        json!({ "conn_id": conns[1], "kind": "draw_from_deck" }),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "not_your_turn");

    // An unbound connection cannot act at all.
    let (status, body) = post_json(
        &client,
        format!("http://{address}/api/tables/{table_id}/actions"),
        json!({ "conn_id": Uuid::new_v4(), "kind": "draw_from_deck" }),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "unknown_connection");
}

#[tokio::test]
async fn unknown_table_is_not_found() {
    let server = start_server().await;
    let address = server.handle.address();
    let client = HyperClient::new();

    let missing = Uuid::new_v4();
    let (status, body) = get_json(
        &client,
        format!("http://{address}/api/tables/{missing}/state"),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "game_not_found");

    let (status, body) = post_json(
        &client,
        format!("http://{address}/api/tables/{missing}/join"),
        json!({
            "player_id": Uuid::new_v4(),
            "name": "nobody",
            "conn_id": Uuid::new_v4(),
        }),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "table_not_found");
}

#[tokio::test]
async fn underfunded_seat_blocks_the_deal() {
    let server = start_server().await;
    let address = server.handle.address();
    let client = HyperClient::new();

    let table_id = server.store.create("api table", 50, 4);
    let funded = Uuid::new_v4();
    let broke = Uuid::new_v4();
    server.ledger.set_balance(funded, 100);
    for (player, name) in [(funded, "funded"), (broke, "broke")] {
        post_json(
            &client,
            format!("http://{address}/api/tables/{table_id}/join"),
            json!({ "player_id": player, "name": name, "conn_id": Uuid::new_v4() }),
        )
        .await;
    }

    let (status, body) = post_json(
        &client,
        format!("http://{address}/api/tables/{table_id}/start"),
        json!({}),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "insufficient_funds");
    assert_eq!(body["details"]["needed"], 50);
    // The funded seat got its stake back.
    assert_eq!(server.ledger.balance_of(&funded), 100);
}

#[tokio::test]
async fn sse_stream_connects() {
    let server = start_server().await;
    let address = server.handle.address();
    let client = HyperClient::new();

    let conn_id = Uuid::new_v4();
    let response = client
        .get(
            format!("http://{address}/api/events/{conn_id}")
                .parse::<hyper::Uri>()
                .expect("parse uri"),
        )
        .await
        .expect("connect sse");
    assert_eq!(response.status(), hyper::StatusCode::OK);
    let content_type = response
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(content_type.starts_with("text/event-stream"));
}
