use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, FuturesUnordered, SelectAll, StreamExt};
use nostr_sdk::prelude::*;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::VerifierConfig;
use crate::connections::ConnectionSet;
use crate::events::{event_tag_value, KIND_FILE_METADATA, TAG_HASH};
use crate::transport::{RelayConnector, SignalStream, SubscriptionSignal};
use crate::wait::{wait_bounded, Waited};

const MISSING: &str = "(missing)";

/// What a published event is expected to look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    pub relays: Vec<String>,
    /// Lowercase hex event id.
    pub event_id: String,
    pub expected_content: String,
    /// Lowercase hex SHA-256 expected in the `x` tag.
    pub expected_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("content mismatch on {relay}: expected {expected:?}, received {received:?}")]
    ContentMismatch {
        relay: String,
        expected: String,
        received: String,
    },
    #[error("file hash mismatch on {relay}: expected {expected}, received {received}")]
    HashMismatch {
        relay: String,
        expected: String,
        received: String,
    },
    #[error("event not found on any relay")]
    NotFound,
    #[error("timeout waiting for event after {0:?}")]
    Timeout(Duration),
    #[error("could not reach any of {attempted} relays")]
    Unreachable { attempted: usize },
    #[error("invalid event id: {0}")]
    InvalidEventId(String),
    #[error("verification cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedEvent {
    pub relay: String,
    pub event_id: String,
    pub pubkey: String,
    pub created_at: u64,
}

/// Waits for a published event to come back from the network and checks it.
///
/// Completion is whichever comes first: the event arrives (checked and
/// returned), every subscribed relay reports end of stored events without it
/// (`NotFound`), or the timeout elapses (`Timeout`). Connections are closed
/// exactly once afterwards.
#[derive(Clone)]
pub struct EventVerifier {
    connector: Arc<dyn RelayConnector>,
    config: VerifierConfig,
}

impl EventVerifier {
    pub fn new(connector: Arc<dyn RelayConnector>, config: VerifierConfig) -> Self {
        Self { connector, config }
    }

    pub async fn verify(&self, request: &VerifyRequest) -> Result<VerifiedEvent, VerificationError> {
        self.verify_with_cancel(request, &CancellationToken::new())
            .await
    }

    pub async fn verify_with_cancel(
        &self,
        request: &VerifyRequest,
        cancel: &CancellationToken,
    ) -> Result<VerifiedEvent, VerificationError> {
        let event_id = EventId::from_hex(&request.event_id)
            .map_err(|err| VerificationError::InvalidEventId(err.to_string()))?;
        let filter = Filter::new()
            .id(event_id)
            .kind(Kind::from(KIND_FILE_METADATA));

        let connections = ConnectionSet::new();
        let result = match wait_bounded(
            self.watch(request, event_id, filter, &connections, cancel),
            self.config.timeout,
            cancel,
        )
        .await
        {
            Waited::Ready(result) => result,
            Waited::TimedOut => Err(VerificationError::Timeout(self.config.timeout)),
            Waited::Cancelled => Err(VerificationError::Cancelled),
        };
        connections.close_all().await;

        match &result {
            Ok(verified) => info!(event_id = %verified.event_id, relay = %verified.relay, "Verification passed"),
            Err(err) => warn!(event_id = %request.event_id, error = %err, "Verification failed"),
        }
        result
    }

    async fn watch(
        &self,
        request: &VerifyRequest,
        target: EventId,
        filter: Filter,
        connections: &ConnectionSet,
        cancel: &CancellationToken,
    ) -> Result<VerifiedEvent, VerificationError> {
        // Relays join the match loop as soon as their subscription is open;
        // a slow connect never holds back a relay that is already serving.
        let mut opening: FuturesUnordered<_> = request
            .relays
            .iter()
            .enumerate()
            .map(|(index, relay)| self.open(index, relay, filter.clone(), connections, cancel))
            .collect();
        let mut merged = SelectAll::new();
        let mut pending: HashSet<usize> = HashSet::new();
        let mut subscribed = 0usize;

        loop {
            tokio::select! {
                Some((index, opened)) = opening.next(), if !opening.is_empty() => {
                    if let Some(signals) = opened {
                        subscribed += 1;
                        pending.insert(index);
                        merged.push(
                            signals
                                .map(Some)
                                .chain(stream::once(async { None }))
                                .map(move |signal| (index, signal))
                                .boxed(),
                        );
                    }
                }
                Some((index, signal)) = merged.next(), if !merged.is_empty() => {
                    let relay = &request.relays[index];
                    match signal {
                        Some(SubscriptionSignal::Event(event)) => {
                            if event.id != target {
                                debug!(relay = %relay, event_id = %event.id, "Ignoring unrelated event");
                                continue;
                            }
                            return check_event(relay, &event, request);
                        }
                        Some(SubscriptionSignal::EndOfStoredEvents) => {
                            debug!(relay = %relay, "End of stored events");
                            pending.remove(&index);
                        }
                        Some(SubscriptionSignal::Closed(reason)) => {
                            warn!(relay = %relay, reason = %reason, "Relay closed subscription");
                            pending.remove(&index);
                        }
                        None => {
                            debug!(relay = %relay, "Subscription stream ended");
                            pending.remove(&index);
                        }
                    }
                }
                else => break,
            }

            if opening.is_empty() && pending.is_empty() {
                break;
            }
        }

        if subscribed == 0 {
            return Err(VerificationError::Unreachable {
                attempted: request.relays.len(),
            });
        }
        Err(VerificationError::NotFound)
    }

    /// Connect to one relay and open the subscription. `None` when either
    /// step fails; the failure is logged.
    async fn open(
        &self,
        index: usize,
        relay: &str,
        filter: Filter,
        connections: &ConnectionSet,
        cancel: &CancellationToken,
    ) -> (usize, Option<SignalStream>) {
        let handle = match wait_bounded(
            self.connector.connect(relay),
            self.config.connect_timeout,
            cancel,
        )
        .await
        {
            Waited::Ready(Ok(handle)) => handle,
            Waited::Ready(Err(err)) => {
                warn!(relay = %relay, error = %err, "Relay connection failed");
                return (index, None);
            }
            Waited::TimedOut => {
                warn!(relay = %relay, "Relay connection timed out");
                return (index, None);
            }
            Waited::Cancelled => return (index, None),
        };
        connections.register(index, handle.clone()).await;

        match wait_bounded(handle.subscribe(filter), self.config.connect_timeout, cancel).await {
            Waited::Ready(Ok(signals)) => (index, Some(signals)),
            Waited::Ready(Err(err)) => {
                warn!(relay = %relay, error = %err, "Subscription failed");
                (index, None)
            }
            Waited::TimedOut => {
                warn!(relay = %relay, "Subscription request timed out");
                (index, None)
            }
            Waited::Cancelled => (index, None),
        }
    }
}

/// Compare a delivered event against the expectations. The first mismatch
/// found is returned.
pub fn check_event(
    relay: &str,
    event: &Event,
    request: &VerifyRequest,
) -> Result<VerifiedEvent, VerificationError> {
    if event.content != request.expected_content {
        return Err(VerificationError::ContentMismatch {
            relay: relay.to_string(),
            expected: request.expected_content.clone(),
            received: event.content.clone(),
        });
    }

    match event_tag_value(event, TAG_HASH) {
        Some(hash) if hash == request.expected_hash => {}
        other => {
            return Err(VerificationError::HashMismatch {
                relay: relay.to_string(),
                expected: request.expected_hash.clone(),
                received: other.unwrap_or(MISSING).to_string(),
            });
        }
    }

    Ok(VerifiedEvent {
        relay: relay.to_string(),
        event_id: event.id.to_hex(),
        pubkey: event.pubkey.to_hex(),
        created_at: event.created_at.as_secs(),
    })
}
