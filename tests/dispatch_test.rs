//! Webhook delivery tests against a local mock endpoint

use fwregistry_lib::engine::firmware::{
    ArtifactService, BlobStore, InMemoryArtifactRepository, EVENT_DELETED, EVENT_UPLOADED,
};
use fwregistry_lib::engine::webhook::{
    sign, verify, DeliveryOutcome, DispatchSettings, Dispatcher, InMemorySubscriptionRepository, NewSubscription,
    SubscriptionRepository, SIGNATURE_HEADER,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const SECRET: &str = "hook-secret";

fn settings(retries: u32) -> DispatchSettings {
    DispatchSettings {
        secret: Some(SECRET.to_string()),
        timeout: Duration::from_secs(2),
        retries,
        base_backoff: Duration::from_millis(500),
    }
}

fn subscribe(repo: &InMemorySubscriptionRepository, url: String, events: &[&str], enabled: bool) {
    repo.create(&NewSubscription {
        url,
        events: events.iter().map(|e| e.to_string()).collect(),
        enabled,
    })
    .unwrap();
}

/// Records when each attempt arrived and answers with a fixed status
struct TimedResponder {
    status: u16,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for TimedResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        ResponseTemplate::new(self.status)
    }
}

#[tokio::test]
async fn test_matching_subscription_receives_signed_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let repo = Arc::new(InMemorySubscriptionRepository::new());
    subscribe(&repo, format!("{}/hook", server.uri()), &[EVENT_UPLOADED], true);
    let dispatcher = Dispatcher::new(repo, settings(0)).unwrap();

    let outcomes = dispatcher
        .dispatch(EVENT_UPLOADED, &json!({"type": "gateway", "version": "1.0.0"}))
        .join()
        .await;
    assert_eq!(outcomes, vec![DeliveryOutcome::Delivered { attempts: 1, status: 200 }]);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    let signature = request.headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap();
    assert_eq!(signature, sign(SECRET.as_bytes(), &request.body));
    assert!(verify(SECRET.as_bytes(), &request.body, signature));

    let envelope: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(envelope["event"], EVENT_UPLOADED);
    assert_eq!(envelope["data"]["version"], "1.0.0");
    assert!(envelope["time"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_non_matching_and_disabled_subscriptions_are_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let repo = Arc::new(InMemorySubscriptionRepository::new());
    subscribe(&repo, format!("{}/deleted-only", server.uri()), &[EVENT_DELETED], true);
    subscribe(&repo, format!("{}/disabled", server.uri()), &[EVENT_UPLOADED], false);
    let dispatcher = Dispatcher::new(repo, settings(0)).unwrap();

    let handle = dispatcher.dispatch(EVENT_UPLOADED, &json!({}));
    assert!(handle.is_empty());
    assert!(handle.join().await.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_endpoint_is_retried_with_linear_backoff() {
    let server = MockServer::start().await;
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    Mock::given(method("POST"))
        .respond_with(TimedResponder {
            status: 500,
            arrivals: arrivals.clone(),
        })
        .expect(3)
        .mount(&server)
        .await;

    let repo = Arc::new(InMemorySubscriptionRepository::new());
    subscribe(&repo, server.uri(), &[EVENT_UPLOADED], true);
    let dispatcher = Dispatcher::new(repo, settings(2)).unwrap();

    let started = Instant::now();
    let outcomes = dispatcher.dispatch(EVENT_UPLOADED, &json!({})).join().await;
    assert!(started.elapsed() >= Duration::from_millis(1500));

    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        DeliveryOutcome::Exhausted { attempts, last_error } => {
            assert_eq!(*attempts, 3);
            assert!(last_error.contains("500"));
        }
        other => panic!("expected exhausted delivery, got {:?}", other),
    }

    let arrivals = arrivals.lock().unwrap();
    assert_eq!(arrivals.len(), 3);
    assert!(arrivals[1] - arrivals[0] >= Duration::from_millis(500));
    assert!(arrivals[2] - arrivals[1] >= Duration::from_millis(1000));
}

#[tokio::test]
async fn test_recovering_endpoint_stops_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let repo = Arc::new(InMemorySubscriptionRepository::new());
    subscribe(&repo, server.uri(), &[EVENT_UPLOADED], true);
    let dispatcher = Dispatcher::new(repo, settings(3)).unwrap();

    let outcomes = dispatcher.dispatch(EVENT_UPLOADED, &json!({})).join().await;
    assert_eq!(outcomes, vec![DeliveryOutcome::Delivered { attempts: 2, status: 204 }]);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let repo = Arc::new(InMemorySubscriptionRepository::new());
    subscribe(&repo, server.uri(), &[EVENT_UPLOADED], true);
    let dispatcher = Dispatcher::new(
        repo,
        DispatchSettings {
            timeout: Duration::from_millis(200),
            retries: 0,
            ..settings(0)
        },
    )
    .unwrap();

    let outcomes = dispatcher.dispatch(EVENT_UPLOADED, &json!({})).join().await;
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].is_delivered());
    assert_eq!(outcomes[0].attempts(), 1);
}

#[tokio::test]
async fn test_unsigned_without_secret() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let repo = Arc::new(InMemorySubscriptionRepository::new());
    subscribe(&repo, server.uri(), &[EVENT_UPLOADED], true);
    let dispatcher = Dispatcher::new(
        repo,
        DispatchSettings {
            secret: None,
            ..settings(0)
        },
    )
    .unwrap();

    dispatcher.dispatch(EVENT_UPLOADED, &json!({})).join().await;
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get(SIGNATURE_HEADER).is_none());
}

#[tokio::test]
async fn test_ingest_publishes_through_dispatcher() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let repo = Arc::new(InMemorySubscriptionRepository::new());
    subscribe(&repo, server.uri(), &[EVENT_UPLOADED, EVENT_DELETED], true);
    let dispatcher = Dispatcher::new(repo, settings(0)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let service = ArtifactService::new(
        Arc::new(InMemoryArtifactRepository::new()),
        BlobStore::new(dir.path()),
    )
    .with_events(Arc::new(dispatcher));

    service
        .ingest("gateway", "1.0.0", "gw.bin", &b"firmware-v1"[..])
        .unwrap();

    // Delivery is detached from ingest
    let mut requests = Vec::new();
    for _ in 0..100 {
        requests = server.received_requests().await.unwrap();
        if !requests.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(requests.len(), 1);

    let envelope: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(envelope["event"], EVENT_UPLOADED);
    assert_eq!(envelope["data"]["type"], "gateway");
    assert_eq!(
        envelope["data"]["sha256"],
        "12fa4a7e1d32f7d69677ba92b781565407eee58c44a0be1cdd9b9e76780633f4"
    );
}
