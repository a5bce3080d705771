#![allow(clippy::panic, clippy::indexing_slicing, missing_docs)]

//! End-to-end tests against a gateway bound to an ephemeral port.
//!
//! Auto-fulfillment is off so each test decides when randomness arrives.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

use arisan_gateway::api::caller::CALLER_HEADER;
use arisan_gateway::config::GatewayConfig;
use arisan_gateway::server::{build_app, build_state};

struct TestGateway {
    base: String,
    addr: SocketAddr,
    client: Client,
}

impl TestGateway {
    async fn start() -> Self {
        let config = GatewayConfig {
            vrf_auto_fulfill: false,
            vrf_seed: Some([42u8; 32]),
            ..GatewayConfig::default()
        };
        let Ok((state, announcements)) = build_state(&config) else {
            panic!("state construction failed");
        };
        drop(announcements);

        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        let app = build_app(state);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base: format!("http://{addr}/api/v1"),
            addr,
            client: Client::new(),
        }
    }

    async fn call(
        &self,
        method: reqwest::Method,
        path: &str,
        caller: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = self.client.request(method, format!("{}{path}", self.base));
        if let Some(caller) = caller {
            request = request.header(CALLER_HEADER, caller);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let Ok(response) = request.send().await else {
            panic!("request to {path} failed");
        };
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let json = serde_json::from_str(&text).unwrap_or(Value::Null);
        (status, json)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.call(reqwest::Method::GET, path, None, None).await
    }

    async fn post(&self, path: &str, caller: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call(reqwest::Method::POST, path, Some(caller), body)
            .await
    }

    async fn create(&self, organizer: &str, ether: &str, max: u32) -> u64 {
        let (status, body) = self
            .post(
                "/arisans",
                organizer,
                Some(json!({
                    "payment_amount": { "ether": ether },
                    "max_participants": max,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
        let Some(id) = body["arisan_id"].as_u64() else {
            panic!("missing arisan_id in {body}");
        };
        id
    }

    async fn join_and_pay(&self, id: u64, who: &str, ether: &str) {
        let (status, body) = self.post(&format!("/arisans/{id}/join"), who, None).await;
        assert_eq!(status, StatusCode::OK, "join failed: {body}");
        let (status, body) = self
            .post(
                &format!("/arisans/{id}/pay"),
                who,
                Some(json!({ "amount": { "ether": ether } })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "pay failed: {body}");
    }

    async fn pick_winner(&self, id: u64, organizer: &str) -> u64 {
        let (status, body) = self
            .post(&format!("/arisans/{id}/pick-winner"), organizer, None)
            .await;
        assert_eq!(status, StatusCode::ACCEPTED, "pick-winner failed: {body}");
        let Some(request_id) = body["request_id"].as_u64() else {
            panic!("missing request_id in {body}");
        };
        request_id
    }

    async fn fulfill(&self, request_id: u64) -> (StatusCode, Value) {
        self.post(
            &format!("/randomness/requests/{request_id}/fulfill"),
            "operator",
            None,
        )
        .await
    }
}

#[tokio::test]
async fn full_round_pays_the_pot_to_one_participant() {
    let gw = TestGateway::start().await;
    let id = gw.create("org", "10", 4).await;
    for who in ["alice", "bob", "carol", "dave"] {
        gw.join_and_pay(id, who, "10").await;
    }

    let (_, detail) = gw.get(&format!("/arisans/{id}")).await;
    assert_eq!(detail["pot"]["ether"], json!("40"));
    assert_eq!(detail["participant_count"], json!(4));

    let request_id = gw.pick_winner(id, "org").await;

    // Winner is only chosen once randomness arrives.
    let (_, winners) = gw.get(&format!("/arisans/{id}/winners")).await;
    assert_eq!(winners["winners"], json!([]));
    let (_, pending) = gw.get("/randomness/requests").await;
    assert_eq!(pending["data"][0]["request_id"], json!(request_id));
    assert_eq!(pending["data"][0]["consumer"], json!(id));

    let (status, payout) = gw.fulfill(request_id).await;
    assert_eq!(status, StatusCode::OK, "fulfill failed: {payout}");
    assert_eq!(payout["amount"]["ether"], json!("40"));
    assert_eq!(payout["round"], json!(1));
    let Some(winner) = payout["winner"].as_str().map(str::to_string) else {
        panic!("missing winner in {payout}");
    };
    assert!(["alice", "bob", "carol", "dave"].contains(&winner.as_str()));

    let (_, winners) = gw.get(&format!("/arisans/{id}/winners")).await;
    assert_eq!(winners["winners"], json!([winner.clone()]));
    let (_, detail) = gw.get(&format!("/arisans/{id}")).await;
    assert_eq!(detail["pot"]["wei"], json!("0"));
    assert_eq!(detail["active_request"], Value::Null);

    let (_, paid) = gw
        .get(&format!("/arisans/{id}/participants/alice/paid"))
        .await;
    assert_eq!(paid["has_paid"], json!(false));

    let (_, balance) = gw.get(&format!("/payouts/{winner}")).await;
    assert_eq!(balance["balance"]["ether"], json!("40"));

    // A second fulfillment of the same request is refused.
    let (status, _) = gw.fulfill(request_id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn organizer_only_actions_are_forbidden_to_others() {
    let gw = TestGateway::start().await;
    let id = gw.create("org", "1", 2).await;
    gw.join_and_pay(id, "alice", "1").await;

    let (status, body) = gw
        .post(&format!("/arisans/{id}/pick-winner"), "alice", None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], json!(1201));

    let (status, _) = gw.post(&format!("/arisans/{id}/close"), "alice", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = gw
        .call(
            reqwest::Method::DELETE,
            &format!("/arisans/{id}"),
            Some("alice"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], json!(1202));
}

#[tokio::test]
async fn missing_caller_header_is_unauthorized() {
    let gw = TestGateway::start().await;
    let (status, body) = gw
        .call(
            reqwest::Method::POST,
            "/arisans",
            None,
            Some(json!({ "payment_amount": { "wei": "1" }, "max_participants": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!(1101));
}

#[tokio::test]
async fn wrong_payment_and_double_payment_are_rejected() {
    let gw = TestGateway::start().await;
    let id = gw.create("org", "2", 3).await;

    let (status, _) = gw
        .post(
            &format!("/arisans/{id}/pay"),
            "alice",
            Some(json!({ "amount": { "ether": "2" } })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let _ = gw.post(&format!("/arisans/{id}/join"), "alice", None).await;
    let (status, _) = gw
        .post(
            &format!("/arisans/{id}/pay"),
            "alice",
            Some(json!({ "amount": { "ether": "1" } })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let pay = Some(json!({ "amount": { "ether": "2" } }));
    let (status, _) = gw
        .post(&format!("/arisans/{id}/pay"), "alice", pay.clone())
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = gw.post(&format!("/arisans/{id}/pay"), "alice", pay).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!(4004));
}

#[tokio::test]
async fn full_and_closed_arisans_refuse_joins() {
    let gw = TestGateway::start().await;
    let id = gw.create("org", "1", 1).await;
    let (status, _) = gw.post(&format!("/arisans/{id}/join"), "alice", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = gw.post(&format!("/arisans/{id}/join"), "bob", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!(4002));

    let (status, body) = gw.post(&format!("/arisans/{id}/join"), "alice", None).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let other = gw.create("org", "1", 5).await;
    let (status, body) = gw.post(&format!("/arisans/{other}/close"), "org", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], json!(true));
    let (status, body) = gw.post(&format!("/arisans/{other}/join"), "bob", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!(4001));
}

#[tokio::test]
async fn second_draw_waits_for_the_first() {
    let gw = TestGateway::start().await;
    let id = gw.create("org", "1", 2).await;
    gw.join_and_pay(id, "alice", "1").await;

    let _ = gw.pick_winner(id, "org").await;
    let (status, body) = gw
        .post(&format!("/arisans/{id}/pick-winner"), "org", None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!(4007));
}

#[tokio::test]
async fn deleted_ids_are_never_reused() {
    let gw = TestGateway::start().await;
    let first = gw.create("org", "1", 2).await;
    let second = gw.create("org", "1", 2).await;
    assert_eq!(second, first + 1);

    let (status, _) = gw
        .call(
            reqwest::Method::DELETE,
            &format!("/arisans/{first}"),
            Some("org"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = gw.get(&format!("/arisans/{first}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, count) = gw.get("/arisans/count").await;
    assert_eq!(count["count"], json!(1));

    let third = gw.create("org", "1", 2).await;
    assert_eq!(third, second + 1);

    let (_, list) = gw.get("/arisans?organizer=org").await;
    assert_eq!(list["pagination"]["total"], json!(2));
}

#[tokio::test]
async fn owned_subscription_admits_only_its_owner() {
    let gw = TestGateway::start().await;
    let (status, body) = gw.post("/randomness/subscriptions", "org", None).await;
    assert_eq!(status, StatusCode::CREATED, "subscription failed: {body}");
    assert_eq!(body["owner"], json!("org"));
    let Some(sub) = body["subscription_id"].as_u64() else {
        panic!("missing subscription_id in {body}");
    };

    let create_body = json!({
        "payment_amount": { "ether": "1" },
        "max_participants": 2,
        "randomness": { "subscription_id": sub },
    });
    let (status, body) = gw
        .post("/arisans", "mallory", Some(create_body.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], json!(1203));

    let (status, body) = gw.post("/arisans", "org", Some(create_body)).await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    let Some(id) = body["arisan_id"].as_u64() else {
        panic!("missing arisan_id in {body}");
    };

    // Anyone may top up the balance.
    let (status, body) = gw
        .post(
            &format!("/randomness/subscriptions/{sub}/fund"),
            "alice",
            Some(json!({ "amount": { "ether": "1" } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "fund failed: {body}");
    assert_eq!(body["balance"]["ether"], json!("1"));
    assert_eq!(body["consumers"], json!([id]));

    let (status, _) = gw
        .post(
            "/randomness/subscriptions/999/fund",
            "alice",
            Some(json!({ "amount": { "wei": "1" } })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn websocket_streams_subscribed_events() {
    let gw = TestGateway::start().await;
    let id = gw.create("org", "1", 3).await;

    let url = format!("ws://{}/ws", gw.addr);
    let Ok((mut socket, _)) = tokio_tungstenite::connect_async(url).await else {
        panic!("ws connect failed");
    };
    let subscribe = json!({
        "id": "sub-1",
        "type": "command",
        "timestamp": chrono::Utc::now(),
        "payload": { "command": "subscribe", "arisan_ids": [id] },
    });
    tokio_test::assert_ok!(socket.send(Message::text(subscribe.to_string())).await);

    let ack = read_json(&mut socket).await;
    assert_eq!(ack["id"], json!("sub-1"));
    assert_eq!(ack["type"], json!("response"));

    let (status, _) = gw.post(&format!("/arisans/{id}/join"), "alice", None).await;
    assert_eq!(status, StatusCode::OK);

    let event = read_json(&mut socket).await;
    assert_eq!(event["type"], json!("event"));
    assert_eq!(event["payload"]["event_type"], json!("participant_joined"));
    assert_eq!(event["payload"]["participant"], json!("alice"));
}

async fn read_json<S>(socket: &mut tokio_tungstenite::WebSocketStream<S>) -> Value
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let frame = tokio::time::timeout(Duration::from_secs(5), socket.next()).await;
    let Ok(Some(Ok(message))) = frame else {
        panic!("no ws frame received");
    };
    let Ok(text) = message.to_text() else {
        panic!("non-text ws frame");
    };
    let Ok(value) = serde_json::from_str(text) else {
        panic!("ws frame is not JSON: {text}");
    };
    value
}
