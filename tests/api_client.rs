#![allow(non_snake_case)]

use axum::{
    Json,
    Router,
    extract::{
        Query,
        State,
    },
    http::{
        HeaderMap,
        StatusCode,
    },
    response::{
        IntoResponse,
        Response,
    },
    routing::{
        get,
        post,
    },
};
use rolls_client::{
    ApiClient,
    ApiError,
    ErrorKind,
    RollsApi,
    UserIdentity,
    amount::Amount,
    api::{
        INIT_DATA_HEADER,
        USER_ID_HEADER,
    },
    round::{
        Color,
        RoundStatus,
    },
};
use serde_json::{
    Value,
    json,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
    },
};

#[derive(Clone, Debug, Default)]
struct Seen {
    identities: Vec<(String, String)>,
    bets: Vec<Value>,
    queries: Vec<HashMap<String, String>>,
}

type Shared = Arc<Mutex<Seen>>;

fn record_identity(seen: &Shared, headers: &HeaderMap) -> Option<Response> {
    let user = headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok());
    let init = headers.get(INIT_DATA_HEADER).and_then(|v| v.to_str().ok());
    match (user, init) {
        (Some(user), Some(init)) => {
            seen.lock()
                .unwrap()
                .identities
                .push((user.to_string(), init.to_string()));
            None
        }
        _ => Some(
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Missing Telegram identity"})),
            )
                .into_response(),
        ),
    }
}

async fn current(State(seen): State<Shared>, headers: HeaderMap) -> Response {
    if let Some(rejection) = record_identity(&seen, &headers) {
        return rejection;
    }
    Json(json!({
        "game_number": 42,
        "opened_at": "2026-10-18T12:00:00Z",
        "duration_seconds": 10,
        "status": "OPEN",
        "winning_color": null
    }))
    .into_response()
}

async fn bet(State(seen): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Some(rejection) = record_identity(&seen, &headers) {
        return rejection;
    }
    let amount = body["amount"].as_f64().unwrap_or_default();
    seen.lock().unwrap().bets.push(body);
    if amount > 5.0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Insufficient balance"})),
        )
            .into_response();
    }
    Json(json!({"success": true})).into_response()
}

async fn history(
    State(seen): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(rejection) = record_identity(&seen, &headers) {
        return rejection;
    }
    let limit: usize = query
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(10);
    seen.lock().unwrap().queries.push(query);
    let entries: Vec<Value> = (0..limit as u64)
        .map(|i| {
            let color = match i % 3 {
                0 => "green",
                1 => "red",
                _ => "blue",
            };
            json!({"game_number": 1_000 - i, "winning_color": color})
        })
        .collect();
    Json(entries).into_response()
}

async fn bets(
    State(seen): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(rejection) = record_identity(&seen, &headers) {
        return rejection;
    }
    seen.lock().unwrap().queries.push(query);
    Json(json!([
        {"color": "red", "amount": 1.5},
        {"color": "red", "amount": 0.25},
        {"color": "green", "amount": 3}
    ]))
    .into_response()
}

async fn balance(State(seen): State<Shared>, headers: HeaderMap) -> Response {
    if let Some(rejection) = record_identity(&seen, &headers) {
        return rejection;
    }
    Json(json!({"balance": 12.5, "ref_balance": 0.75})).into_response()
}

async fn spawn_backend() -> (String, Shared) {
    let seen = Shared::default();
    let app = Router::new()
        .route("/api/games/rolls/current", get(current))
        .route("/api/games/rolls/bet", post(bet))
        .route("/api/games/rolls/history", get(history))
        .route("/api/games/rolls/bets", get(bets))
        .route("/api/user/balance", get(balance))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/"), seen)
}

fn identity() -> UserIdentity {
    UserIdentity {
        user_id: 777,
        init_data: "query_id=AAE&hash=f00".to_string(),
    }
}

#[tokio::test]
async fn current_round__sends_identity_and_parses_round() {
    // given
    let (url, seen) = spawn_backend().await;
    let client = ApiClient::new(url, identity()).unwrap();

    // when
    let round = client.current_round().await.unwrap();

    // then
    assert_eq!(round.game_number, 42);
    assert_eq!(round.status, RoundStatus::Open);
    assert_eq!(round.winning_color, None);
    assert_eq!(
        seen.lock().unwrap().identities,
        vec![("777".to_string(), "query_id=AAE&hash=f00".to_string())]
    );
}

#[tokio::test]
async fn place_bet__accepted__posts_color_and_amount() {
    // given
    let (url, seen) = spawn_backend().await;
    let client = ApiClient::new(url, identity()).unwrap();

    // when
    client
        .place_bet(Color::Blue, Amount::from_nanotons(500_000_000))
        .await
        .unwrap();

    // then
    assert_eq!(
        seen.lock().unwrap().bets,
        vec![json!({"color": "blue", "amount": 0.5})]
    );
}

#[tokio::test]
async fn place_bet__rejected__surfaces_backend_reason() {
    // given
    let (url, _seen) = spawn_backend().await;
    let client = ApiClient::new(url, identity()).unwrap();

    // when
    let err = client
        .place_bet(Color::Red, Amount::from_ton(6))
        .await
        .unwrap_err();

    // then
    assert_eq!(err.kind(), ErrorKind::BackendRejection);
    assert_eq!(err.user_message(), "Insufficient balance");
    assert!(matches!(err, ApiError::Rejected { status: 400, .. }));
}

#[tokio::test]
async fn history__passes_limit_and_keeps_server_order() {
    let (url, seen) = spawn_backend().await;
    let client = ApiClient::new(url, identity()).unwrap();

    let history = client.history(100).await.unwrap();

    assert_eq!(history.len(), 100);
    assert_eq!(history[0].game_number, 1_000);
    assert_eq!(history[0].winning_color, Color::Green);
    assert_eq!(
        seen.lock().unwrap().queries[0].get("limit").map(String::as_str),
        Some("100")
    );
}

#[tokio::test]
async fn bet_totals__aggregates_per_color() {
    let (url, seen) = spawn_backend().await;
    let client = ApiClient::new(url, identity()).unwrap();

    let totals = client.bet_totals(42).await.unwrap();

    assert_eq!(totals.game_number, 42);
    assert_eq!(totals.get(Color::Red), Amount::from_nanotons(1_750_000_000));
    assert_eq!(totals.get(Color::Blue), Amount::ZERO);
    assert_eq!(totals.get(Color::Green), Amount::from_ton(3));
    assert_eq!(
        seen.lock().unwrap().queries[0]
            .get("game_number")
            .map(String::as_str),
        Some("42")
    );
}

#[tokio::test]
async fn balance__reads_both_balances() {
    let (url, _seen) = spawn_backend().await;
    let client = ApiClient::new(url, identity()).unwrap();

    let balance = client.balance().await.unwrap();

    assert_eq!(balance.balance, Amount::from_nanotons(12_500_000_000));
    assert_eq!(balance.ref_balance, Amount::from_nanotons(750_000_000));
}

#[tokio::test]
async fn current_round__unreachable_backend__is_a_network_failure() {
    // given
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = ApiClient::new(format!("http://{addr}"), identity()).unwrap();

    // when
    let err = client.current_round().await.unwrap_err();

    // then
    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
    assert_eq!(err.user_message(), "Backend unavailable");
}
