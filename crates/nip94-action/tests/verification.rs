mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{event_signal, signed_event, urls, MockConnector, MockRelay, FILE_HASH};
use nip94_action::{
    EventVerifier, SignedEvent, SubscriptionSignal, VerificationError, VerifierConfig,
    VerifyRequest,
};

fn verifier(connector: &MockConnector, timeout: Duration) -> EventVerifier {
    EventVerifier::new(
        Arc::new(connector.clone()),
        VerifierConfig {
            connect_timeout: Duration::from_millis(100),
            timeout,
        },
    )
}

fn request(relays: &[&str], event: &SignedEvent, content: &str) -> VerifyRequest {
    VerifyRequest {
        relays: urls(relays),
        event_id: event.id_hex(),
        expected_content: content.to_string(),
        expected_hash: FILE_HASH.to_string(),
    }
}

#[tokio::test]
async fn matching_event_passes() {
    let event = signed_event("release notes");
    let connector = MockConnector::new(vec![
        ("wss://a.relay", MockRelay::serving(vec![(10, event_signal(&event))])),
        ("wss://b.relay", MockRelay::silent()),
    ]);

    let verified = verifier(&connector, Duration::from_secs(2))
        .verify(&request(&["wss://a.relay", "wss://b.relay"], &event, "release notes"))
        .await
        .unwrap();

    assert_eq!(verified.event_id, event.id_hex());
    assert_eq!(verified.relay, "wss://a.relay");
    assert_eq!(verified.pubkey, event.pubkey_hex());
    assert_eq!(connector.closes("wss://a.relay"), 1);
    assert_eq!(connector.closes("wss://b.relay"), 1);
}

#[tokio::test]
async fn content_mismatch_fails_immediately_with_both_values() {
    let event = signed_event("release notes v2");
    let connector = MockConnector::new(vec![
        ("wss://a.relay", MockRelay::serving(vec![(10, event_signal(&event))])),
        ("wss://b.relay", MockRelay::silent()),
    ]);

    let started = Instant::now();
    let err = verifier(&connector, Duration::from_secs(5))
        .verify(&request(&["wss://a.relay", "wss://b.relay"], &event, "release notes"))
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(
        err,
        VerificationError::ContentMismatch {
            relay: "wss://a.relay".to_string(),
            expected: "release notes".to_string(),
            received: "release notes v2".to_string(),
        }
    );
    let message = err.to_string();
    assert!(message.contains("\"release notes\""));
    assert!(message.contains("\"release notes v2\""));
    assert_eq!(connector.total_closes(), 2);
}

#[tokio::test]
async fn hash_mismatch_is_reported() {
    let event = signed_event("notes");
    let connector = MockConnector::new(vec![(
        "wss://a.relay",
        MockRelay::serving(vec![(5, event_signal(&event))]),
    )]);
    let mut request = request(&["wss://a.relay"], &event, "notes");
    request.expected_hash = "0".repeat(64);

    let err = verifier(&connector, Duration::from_secs(2))
        .verify(&request)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        VerificationError::HashMismatch {
            relay: "wss://a.relay".to_string(),
            expected: "0".repeat(64),
            received: FILE_HASH.to_string(),
        }
    );
}

#[tokio::test]
async fn end_of_stored_events_everywhere_means_not_found() {
    let event = signed_event("notes");
    let connector = MockConnector::new(vec![
        (
            "wss://a.relay",
            MockRelay::serving(vec![(5, SubscriptionSignal::EndOfStoredEvents)]),
        ),
        (
            "wss://b.relay",
            MockRelay::serving(vec![(15, SubscriptionSignal::Closed("error: shutting down".to_string()))]),
        ),
    ]);

    let started = Instant::now();
    let err = verifier(&connector, Duration::from_secs(5))
        .verify(&request(&["wss://a.relay", "wss://b.relay"], &event, "notes"))
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(err, VerificationError::NotFound);
    assert_eq!(err.to_string(), "event not found on any relay");
    assert_eq!(connector.total_closes(), 2);
}

#[tokio::test]
async fn unrelated_events_are_skipped() {
    let event = signed_event("notes");
    let other = signed_event("something else");
    let connector = MockConnector::new(vec![(
        "wss://a.relay",
        MockRelay::serving(vec![
            (5, event_signal(&other)),
            (5, SubscriptionSignal::EndOfStoredEvents),
        ]),
    )]);

    let err = verifier(&connector, Duration::from_secs(2))
        .verify(&request(&["wss://a.relay"], &event, "notes"))
        .await
        .unwrap_err();

    assert_eq!(err, VerificationError::NotFound);
}

#[tokio::test]
async fn silence_times_out() {
    let event = signed_event("notes");
    let connector = MockConnector::new(vec![
        (
            "wss://a.relay",
            MockRelay::serving(vec![(5, SubscriptionSignal::EndOfStoredEvents)]),
        ),
        ("wss://b.relay", MockRelay::silent()),
    ]);

    let started = Instant::now();
    let err = verifier(&connector, Duration::from_millis(150))
        .verify(&request(&["wss://a.relay", "wss://b.relay"], &event, "notes"))
        .await
        .unwrap_err();

    assert!(started.elapsed() >= Duration::from_millis(150));
    assert_eq!(err, VerificationError::Timeout(Duration::from_millis(150)));
    assert!(err.to_string().starts_with("timeout waiting for event"));
    assert_eq!(connector.closes("wss://a.relay"), 1);
    assert_eq!(connector.closes("wss://b.relay"), 1);
}

#[tokio::test]
async fn late_event_after_one_end_marker_still_matches() {
    let event = signed_event("notes");
    let connector = MockConnector::new(vec![
        (
            "wss://a.relay",
            MockRelay::serving(vec![(5, SubscriptionSignal::EndOfStoredEvents)]),
        ),
        ("wss://b.relay", MockRelay::serving(vec![(40, event_signal(&event))])),
    ]);

    let verified = verifier(&connector, Duration::from_secs(2))
        .verify(&request(&["wss://a.relay", "wss://b.relay"], &event, "notes"))
        .await
        .unwrap();

    assert_eq!(verified.relay, "wss://b.relay");
}

#[tokio::test]
async fn no_reachable_relay_is_unreachable() {
    let event = signed_event("notes");
    let connector = MockConnector::new(vec![
        ("wss://a.relay", MockRelay::unreachable()),
        ("wss://b.relay", MockRelay::refusing_subscriptions()),
    ]);

    let err = verifier(&connector, Duration::from_secs(2))
        .verify(&request(&["wss://a.relay", "wss://b.relay"], &event, "notes"))
        .await
        .unwrap_err();

    assert_eq!(err, VerificationError::Unreachable { attempted: 2 });
    assert_eq!(connector.closes("wss://a.relay"), 0);
    assert_eq!(connector.closes("wss://b.relay"), 1);
}

#[tokio::test]
async fn malformed_event_id_is_rejected_before_connecting() {
    let event = signed_event("notes");
    let connector = MockConnector::new(vec![("wss://a.relay", MockRelay::silent())]);
    let mut request = request(&["wss://a.relay"], &event, "notes");
    request.event_id = "not-hex".to_string();

    let err = verifier(&connector, Duration::from_secs(2))
        .verify(&request)
        .await
        .unwrap_err();

    assert!(matches!(err, VerificationError::InvalidEventId(_)));
    assert_eq!(connector.connects("wss://a.relay"), 0);
}

#[tokio::test]
async fn stalled_connect_does_not_hide_a_served_event() {
    let event = signed_event("notes");
    let connector = MockConnector::new(vec![
        ("wss://slow.relay", MockRelay::slow_to_connect()),
        ("wss://fast.relay", MockRelay::serving(vec![(10, event_signal(&event))])),
    ]);
    let verifier = EventVerifier::new(
        Arc::new(connector.clone()),
        VerifierConfig {
            connect_timeout: Duration::from_millis(500),
            timeout: Duration::from_millis(500),
        },
    );

    let started = Instant::now();
    let verified = verifier
        .verify(&request(&["wss://slow.relay", "wss://fast.relay"], &event, "notes"))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(verified.relay, "wss://fast.relay");
    assert_eq!(connector.closes("wss://fast.relay"), 1);
    assert_eq!(connector.closes("wss://slow.relay"), 0);
}

#[tokio::test]
async fn not_found_waits_for_relays_still_connecting() {
    let event = signed_event("notes");
    let connector = MockConnector::new(vec![
        ("wss://slow.relay", MockRelay::slow_to_connect()),
        (
            "wss://fast.relay",
            MockRelay::serving(vec![(5, SubscriptionSignal::EndOfStoredEvents)]),
        ),
    ]);

    // connect_timeout is 100ms in `verifier`; the slow relay gives up then.
    let started = Instant::now();
    let err = verifier(&connector, Duration::from_secs(2))
        .verify(&request(&["wss://slow.relay", "wss://fast.relay"], &event, "notes"))
        .await
        .unwrap_err();

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(err, VerificationError::NotFound);
}
