// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tracking through the assembled [`Analytics`] service.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wuzzy_config::model::{StorageBackend, StorageConfig};
use wuzzy_config::WuzzyConfig;
use wuzzy_core::{
    ApplicationType, ConsentStatus, KeyValueStore, SessionInitError, UbiQuery,
    WalletConsentStatus,
};
use wuzzy_queue::QueuePhase;
use wuzzy_storage::{keys, MemoryStore};
use wuzzy_test_utils::{FixedClock, ManualScheduler, MockTransport};
use wuzzy_tracker::Analytics;

struct Fixture {
    analytics: Analytics,
    transport: Arc<MockTransport>,
    store: Arc<MemoryStore>,
}

fn fixture_with(store: MemoryStore) -> Fixture {
    let store = Arc::new(store);
    let transport = Arc::new(MockTransport::new());
    let analytics = Analytics::builder(WuzzyConfig::default())
        .with_store(store.clone())
        .with_transport(transport.clone())
        .with_clock(Arc::new(FixedClock::epoch()))
        .with_scheduler(Arc::new(ManualScheduler::new()))
        .build()
        .unwrap();
    Fixture {
        analytics,
        transport,
        store,
    }
}

fn fixture() -> Fixture {
    fixture_with(MemoryStore::new())
}

async fn search(analytics: &Analytics, text: &str) -> uuid::Uuid {
    analytics
        .track_query(
            ApplicationType::GraphqlImages,
            text,
            vec![format!("{text}-tx")],
            None,
        )
        .await
}

#[tokio::test]
async fn declined_consent_returns_id_without_tracking() {
    let f = fixture();
    f.analytics.initialize().await;
    f.analytics.decline_consent();

    let before = f.analytics.queue_len();
    let id = search(&f.analytics, "cats").await;

    assert!(!id.is_nil());
    assert_eq!(f.analytics.queue_len(), before);
    assert!(f.transport.session_requests().is_empty());
}

#[tokio::test]
async fn pending_consent_is_not_tracked() {
    let f = fixture();
    f.analytics.initialize().await;
    assert!(f.analytics.needs_consent());

    let first = search(&f.analytics, "cats").await;
    let second = search(&f.analytics, "cats").await;
    assert_ne!(first, second);
    assert_eq!(f.analytics.queue_len(), 0);
}

#[tokio::test]
async fn accepted_consent_queues_a_complete_event() {
    let f = fixture();
    f.analytics.initialize().await;
    f.analytics.accept_consent().await;

    let attributes = BTreeMap::from([("page".to_string(), json!(2))]);
    let id = f
        .analytics
        .track_query(
            ApplicationType::GraphqlVideo,
            "sunsets",
            vec!["tx-1".into(), "tx-2".into()],
            Some(attributes.clone()),
        )
        .await;

    let events = f.analytics.queued_events();
    assert_eq!(events.len(), 1);
    let event: &UbiQuery = &events[0];
    assert_eq!(event.query_id, id);
    assert_eq!(event.application, ApplicationType::GraphqlVideo);
    assert_eq!(event.client_id, "wuzzy-site@1.0.0@session-1");
    assert_eq!(event.user_query, "sunsets");
    assert_eq!(event.timestamp, "2026-01-01T00:00:00.000Z");
    assert_eq!(event.query_response_hit_ids, ["tx-1", "tx-2"]);
    assert_eq!(event.query_attributes, Some(attributes));
    assert!(f.store.get(keys::QUEUE).unwrap().unwrap().contains("sunsets"));
}

#[tokio::test]
async fn submit_initializes_lazily_from_stored_consent() {
    let store = MemoryStore::new();
    store.set(keys::CONSENT, "\"accepted\"").unwrap();
    store.set(keys::SESSION_ID, "\"stored\"").unwrap();
    let f = fixture_with(store);

    search(&f.analytics, "cats").await;
    assert_eq!(f.analytics.queue_len(), 1);
    assert_eq!(
        f.analytics.queued_events()[0].client_id,
        "wuzzy-site@1.0.0@stored"
    );
    assert!(f.transport.session_requests().is_empty());
}

#[tokio::test]
async fn session_failure_is_swallowed_and_retried_next_time() {
    let f = fixture();
    f.transport
        .push_session_response(Err(SessionInitError::Transport("offline".into())));
    f.analytics.initialize().await;
    f.analytics.accept_consent().await;
    assert_eq!(f.analytics.session_id(), None);

    f.transport
        .push_session_response(Err(SessionInitError::Transport("offline".into())));
    search(&f.analytics, "cats").await;
    assert_eq!(f.analytics.queue_len(), 0);

    search(&f.analytics, "dogs").await;
    assert_eq!(f.analytics.queue_len(), 1);
    assert_eq!(f.analytics.queued_events()[0].user_query, "dogs");
}

#[tokio::test]
async fn tenth_query_sends_one_batch() {
    let f = fixture();
    f.analytics.initialize().await;
    f.analytics.accept_consent().await;
    for i in 0..10 {
        search(&f.analytics, &format!("q{i}")).await;
    }

    let batches = f.transport.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 10);
    assert_eq!(f.analytics.queue_len(), 0);
}

#[tokio::test]
async fn wallet_consent_stamps_wallet_on_events() {
    let f = fixture();
    f.analytics.initialize().await;
    f.analytics.accept_consent().await;
    f.analytics.connect_wallet("wallet-abc");
    assert!(f.analytics.needs_wallet_consent(Some("wallet-abc")));

    f.analytics
        .accept_wallet_consent("wallet-abc")
        .await
        .unwrap();
    search(&f.analytics, "cats").await;

    assert_eq!(
        f.analytics.queued_events()[0].client_id,
        "wuzzy-site@1.0.0@session-1@wallet-abc"
    );
}

#[tokio::test]
async fn clear_all_data_forgets_everything() {
    let f = fixture();
    f.analytics.initialize().await;
    f.analytics.accept_consent().await;
    f.analytics
        .accept_wallet_consent("wallet-abc")
        .await
        .unwrap();
    search(&f.analytics, "cats").await;

    f.analytics.clear_all_data();

    assert_eq!(f.analytics.queue_len(), 0);
    assert_eq!(f.analytics.consent_status(), ConsentStatus::Pending);
    assert_eq!(f.analytics.wallet_consent_status(), WalletConsentStatus::Pending);
    assert_eq!(f.analytics.session_id(), None);
    for key in [
        keys::CONSENT,
        keys::SESSION_ID,
        keys::WALLET_CONSENT,
        keys::QUEUE,
        keys::RETRY_STATE,
    ] {
        assert_eq!(f.store.get(key).unwrap(), None, "{key} survived");
    }
}

async fn wait_for(mut done: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn submit_returns_id_and_tracks_in_background() {
    let f = fixture();
    f.analytics.initialize().await;
    f.analytics.accept_consent().await;

    let id = f.analytics.submit_query(
        ApplicationType::GraphqlAudio,
        "rain",
        Vec::new(),
        None,
    );
    wait_for(|| f.analytics.queue_len() == 1).await;
    assert_eq!(f.analytics.queued_events()[0].query_id, id);
}

#[tokio::test]
async fn submit_does_not_wait_for_a_batch_in_flight() {
    let f = fixture();
    f.analytics.initialize().await;
    f.analytics.accept_consent().await;
    for i in 0..9 {
        search(&f.analytics, &format!("q{i}")).await;
    }
    let gate = f.transport.hold_next_batch();

    let id = tokio::time::timeout(Duration::from_secs(2), async {
        f.analytics
            .submit_query(ApplicationType::GraphqlImages, "tenth", Vec::new(), None)
    })
    .await
    .expect("submit_query waited on the network");
    assert!(!id.is_nil());

    // The tenth event fills the batch; the send is now held open.
    gate.started().await;
    assert_eq!(f.analytics.queue_phase(), QueuePhase::Flushing);
    assert_eq!(f.analytics.queue_len(), 10);

    gate.release();
    wait_for(|| f.analytics.queue_len() == 0).await;
    assert_eq!(f.transport.batch_count(), 1);
}

#[tokio::test]
async fn submit_outside_a_runtime_still_returns_an_id() {
    let f = fixture();
    let analytics = f.analytics.clone();
    let id = std::thread::spawn(move || {
        analytics.submit_query(ApplicationType::GraphqlImages, "cats", Vec::new(), None)
    })
    .join()
    .unwrap();
    assert!(!id.is_nil());
}

#[tokio::test]
async fn queue_survives_restart_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = WuzzyConfig::default();
    config.storage = StorageConfig {
        backend: StorageBackend::Sqlite,
        database_path: dir.path().join("analytics.db").display().to_string(),
        quota_bytes: None,
    };

    {
        let analytics = Analytics::builder(config.clone())
            .without_transport()
            .with_scheduler(Arc::new(ManualScheduler::new()))
            .build()
            .unwrap();
        analytics.initialize().await;
        analytics.accept_consent().await;
        for text in ["a", "b", "c"] {
            search(&analytics, text).await;
        }
    }

    let analytics = Analytics::builder(config)
        .without_transport()
        .with_scheduler(Arc::new(ManualScheduler::new()))
        .build()
        .unwrap();
    analytics.initialize().await;
    assert_eq!(analytics.consent_status(), ConsentStatus::Accepted);
    assert_eq!(analytics.queue_len(), 3);
    assert!(analytics.session_id().unwrap().starts_with("fallback-"));
}

#[tokio::test]
async fn exit_flush_sends_events_waiting_on_the_timer() {
    let f = fixture();
    f.analytics.initialize().await;
    f.analytics.accept_consent().await;
    for text in ["a", "b", "c"] {
        search(&f.analytics, text).await;
    }
    assert_eq!(f.analytics.queue_phase(), QueuePhase::Scheduled);

    f.analytics.flush_before_exit(Duration::from_secs(2)).await;

    assert_eq!(f.transport.batch_count(), 1);
    assert_eq!(f.analytics.queue_len(), 0);
}

#[tokio::test]
async fn exit_flush_leaves_backoff_to_the_persisted_retry() {
    let f = fixture();
    f.analytics.initialize().await;
    f.analytics.accept_consent().await;
    search(&f.analytics, "a").await;
    f.transport.fail_next_batches(1);
    f.analytics.flush().await;
    assert_eq!(f.analytics.queue_phase(), QueuePhase::Backoff);

    f.analytics.flush_before_exit(Duration::from_secs(2)).await;

    assert_eq!(f.transport.batch_count(), 1);
    assert_eq!(f.analytics.queue_len(), 1);
}

#[tokio::test]
async fn exit_flush_gives_up_after_the_limit() {
    let f = fixture();
    f.analytics.initialize().await;
    f.analytics.accept_consent().await;
    search(&f.analytics, "a").await;
    let _gate = f.transport.hold_next_batch();

    let finished = tokio::time::timeout(
        Duration::from_secs(5),
        f.analytics.flush_before_exit(Duration::from_millis(50)),
    )
    .await;
    assert!(finished.is_ok());
    assert_eq!(f.analytics.queue_len(), 1);
}

// --- against a real HTTP server ---

fn http_config(server: &MockServer) -> WuzzyConfig {
    let mut config = WuzzyConfig::default();
    config.analytics.api_url = Some(server.uri());
    config
}

fn build_http(server: &MockServer) -> Analytics {
    Analytics::builder(http_config(server))
        .with_store(Arc::new(MemoryStore::new()))
        .with_scheduler(Arc::new(ManualScheduler::new()))
        .build()
        .unwrap()
}

fn session_body(id: &str) -> serde_json::Value {
    json!({ "session_id": id, "client_id": format!("wuzzy-site@1.0.0@{id}") })
}

async fn batch_bodies(server: &MockServer) -> Vec<Vec<UbiQuery>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == "/analytics/batch")
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            serde_json::from_value(body["queries"].clone()).unwrap()
        })
        .collect()
}

#[tokio::test]
async fn http_batch_is_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/session/init"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body("s-1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/analytics/batch"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let analytics = build_http(&server);
    analytics.initialize().await;
    analytics.accept_consent().await;
    for i in 0..10 {
        search(&analytics, &format!("q{i}")).await;
    }

    let batches = batch_bodies(&server).await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 10);
    assert!(batches[0]
        .iter()
        .all(|q| q.client_id == "wuzzy-site@1.0.0@s-1"));
    assert_eq!(analytics.queue_len(), 0);
}

#[tokio::test]
async fn http_expired_session_is_renewed_and_resent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/session/init"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body("s-1")))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/session/init"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body("s-2")))
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/analytics/batch"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "statusCode": 401,
            "message": "Session expired",
            "error": "Unauthorized",
            "errorCode": "EXPIRED_SESSION",
            "action": "REQUEST_NEW_SESSION",
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/analytics/batch"))
        .respond_with(ResponseTemplate::new(200))
        .with_priority(2)
        .mount(&server)
        .await;

    let analytics = build_http(&server);
    analytics.initialize().await;
    analytics.accept_consent().await;
    for i in 0..10 {
        search(&analytics, &format!("q{i}")).await;
    }

    let batches = batch_bodies(&server).await;
    assert_eq!(batches.len(), 2);
    assert!(batches[0].iter().all(|q| q.client_id.ends_with("@s-1")));
    assert!(batches[1].iter().all(|q| q.client_id == "wuzzy-site@1.0.0@s-2"));
    assert_eq!(analytics.session_id().as_deref(), Some("s-2"));
    assert_eq!(analytics.queue_len(), 0);
    assert_eq!(analytics.retry_state().attempts, 0);
}
