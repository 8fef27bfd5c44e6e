//! WebSocket push against a served router.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use ratecast_common::{Clock, Currency, SystemClock};
use ratecast_fx::testing::{snapshot_with, ScriptedProvider};
use ratecast_fx::{FxError, RateCacheConfig, SchedulerConfig};
use ratecast_gateway::routes::router;
use ratecast_gateway::AppState;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

fn warm_state() -> AppState {
    let state = AppState::build(
        Arc::new(ScriptedProvider::new(|_| {
            Err(FxError::ProviderError("unused".into()))
        })),
        Arc::new(SystemClock),
        RateCacheConfig::default(),
        SchedulerConfig::default(),
    );
    let now_ms = state.clock.now_ms();
    let now_unix = now_ms / 1000;
    state.cache.put(
        snapshot_with("USD", &[("USD", 1.0), ("EUR", 0.9)], now_unix, now_unix + 3600),
        now_ms,
    );
    state
}

async fn serve(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    addr
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("payload within 5s")
            .expect("socket open")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_subscriber_gets_current_then_published_payloads() {
    let state = warm_state();
    let addr = serve(state.clone()).await;

    let (mut client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

    let initial = next_json(&mut client).await;
    assert_eq!(initial["base_code"], "USD");
    assert_eq!(initial["rates"]["EUR"], 0.9);
    assert!(initial["rates"].get("GBP").is_none());

    let mut update = state.current_payload().unwrap();
    update.snapshot.rates.insert(Currency::gbp(), 0.79);
    state.updates.send(update).unwrap();

    let pushed = next_json(&mut client).await;
    assert_eq!(pushed["rates"]["GBP"], 0.79);
    assert_eq!(pushed["cache_ttl_ms"], 60_000);
}

#[tokio::test]
async fn test_subscriber_on_cold_cache_waits_for_first_publish() {
    let state = AppState::build(
        Arc::new(ScriptedProvider::new(|_| Err(FxError::CacheEmpty))),
        Arc::new(SystemClock),
        RateCacheConfig::default(),
        SchedulerConfig::default(),
    );
    let addr = serve(state.clone()).await;
    let (mut client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

    let payload = {
        let warm = warm_state();
        warm.current_payload().unwrap()
    };

    // the handler subscribes right after the upgrade; retry until it is listening
    let mut sent = false;
    for _ in 0..50 {
        if state.updates.send(payload.clone()).is_ok() {
            sent = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(sent, "subscriber never registered");

    let pushed = next_json(&mut client).await;
    assert_eq!(pushed["base_code"], "USD");
}
