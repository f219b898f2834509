use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use nostr_sdk::prelude::Event;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PublisherConfig;
use crate::connections::{CloseReport, ConnectionSet};
use crate::signer::SignedEvent;
use crate::transport::{RelayConnector, RelayError};
use crate::wait::{wait_bounded, Waited};
use crate::Error;

/// Terminal state of one relay attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Succeeded { relay: String, elapsed: Duration },
    Failed { relay: String, reason: RelayError },
    TimedOut { relay: String, after: Duration },
}

impl RelayOutcome {
    pub fn relay(&self) -> &str {
        match self {
            RelayOutcome::Succeeded { relay, .. }
            | RelayOutcome::Failed { relay, .. }
            | RelayOutcome::TimedOut { relay, .. } => relay,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RelayOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct PublishReport {
    pub event_id: String,
    pub note_id: String,
    pub pubkey: String,
    /// Relays that acknowledged, in relay-list order.
    pub acknowledged: Vec<String>,
    /// One outcome per relay, in relay-list order.
    pub outcomes: Vec<RelayOutcome>,
    pub close: CloseReport,
}

impl PublishReport {
    pub fn success(&self) -> usize {
        self.acknowledged.len()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.acknowledged.len()
    }
}

/// Delivers one signed event to many relays concurrently.
///
/// Every relay gets its own connect and publish windows; a slow relay never
/// delays the others. The run succeeds once at least `min_acks` relays
/// acknowledged, and all opened connections are closed on every path.
#[derive(Clone)]
pub struct RelayPublisher {
    connector: Arc<dyn RelayConnector>,
    config: PublisherConfig,
}

impl RelayPublisher {
    pub fn new(connector: Arc<dyn RelayConnector>, config: PublisherConfig) -> Self {
        Self { connector, config }
    }

    pub async fn publish(
        &self,
        relays: &[String],
        event: &SignedEvent,
    ) -> Result<PublishReport, Error> {
        self.publish_with_cancel(relays, event, &CancellationToken::new())
            .await
    }

    pub async fn publish_with_cancel(
        &self,
        relays: &[String],
        event: &SignedEvent,
        cancel: &CancellationToken,
    ) -> Result<PublishReport, Error> {
        let event_id = event.id_hex();
        let note_id = event.note_id()?;
        info!(event_id = %event_id, relays = relays.len(), "Publishing to relays");

        // Child token: early stop must not cancel the caller's token.
        let run = cancel.child_token();
        let connections = ConnectionSet::new();
        let acks = AtomicUsize::new(0);

        let attempts = relays.iter().enumerate().map(|(index, relay)| {
            self.attempt(index, relay, event.event(), &connections, &acks, &run)
        });
        let outcomes = join_all(attempts).await;

        let close = connections.close_all().await;

        let acknowledged: Vec<String> = outcomes
            .iter()
            .filter(|outcome| outcome.is_success())
            .map(|outcome| outcome.relay().to_string())
            .collect();
        let success = acknowledged.len();
        let failed = outcomes.len() - success;

        if success == 0 {
            warn!(event_id = %event_id, attempted = relays.len(), "No relay acknowledged the event");
            return Err(Error::AllRelaysFailed {
                attempted: relays.len(),
            });
        }

        let required = self.config.required_acks();
        if success < required {
            warn!(event_id = %event_id, success, required, "Publish quorum not reached");
            return Err(Error::Quorum {
                required,
                actual: success,
            });
        }

        info!(event_id = %event_id, success, failed, "Published nostr event");

        Ok(PublishReport {
            event_id,
            note_id,
            pubkey: event.pubkey_hex(),
            acknowledged,
            outcomes,
            close,
        })
    }

    async fn attempt(
        &self,
        index: usize,
        relay: &str,
        event: &Event,
        connections: &ConnectionSet,
        acks: &AtomicUsize,
        cancel: &CancellationToken,
    ) -> RelayOutcome {
        let relay_url = relay.to_string();

        let handle = match wait_bounded(
            self.connector.connect(relay),
            self.config.connect_timeout,
            cancel,
        )
        .await
        {
            Waited::Ready(Ok(handle)) => handle,
            Waited::Ready(Err(reason)) => {
                warn!(relay = %relay, error = %reason, "Relay connection failed");
                return RelayOutcome::Failed {
                    relay: relay_url,
                    reason,
                };
            }
            Waited::TimedOut => {
                warn!(relay = %relay, "Relay connection timed out");
                return RelayOutcome::Failed {
                    relay: relay_url,
                    reason: RelayError::ConnectTimeout(self.config.connect_timeout),
                };
            }
            Waited::Cancelled => {
                return RelayOutcome::Failed {
                    relay: relay_url,
                    reason: RelayError::Cancelled,
                };
            }
        };
        connections.register(index, handle.clone()).await;

        let started = Instant::now();
        match wait_bounded(handle.publish(event), self.config.publish_timeout, cancel).await {
            Waited::Ready(Ok(())) => {
                let elapsed = started.elapsed();
                let total = acks.fetch_add(1, Ordering::SeqCst) + 1;
                info!(relay = %relay, elapsed_ms = elapsed.as_millis() as u64, "Relay acknowledged event");

                if let Some(stop_after) = self.config.stop_after_acks {
                    // Never stop short of the quorum the run is judged by.
                    let target = stop_after.max(self.config.required_acks());
                    if total >= target && !cancel.is_cancelled() {
                        debug!(acks = total, "Ack target reached; cancelling outstanding attempts");
                        cancel.cancel();
                    }
                }

                RelayOutcome::Succeeded {
                    relay: relay_url,
                    elapsed,
                }
            }
            Waited::Ready(Err(reason)) => {
                warn!(relay = %relay, error = %reason, "Relay rejected event");
                RelayOutcome::Failed {
                    relay: relay_url,
                    reason,
                }
            }
            Waited::TimedOut => {
                warn!(relay = %relay, timeout_ms = self.config.publish_timeout.as_millis() as u64, "Relay publish timed out");
                RelayOutcome::TimedOut {
                    relay: relay_url,
                    after: self.config.publish_timeout,
                }
            }
            Waited::Cancelled => {
                debug!(relay = %relay, "Relay publish cancelled");
                RelayOutcome::Failed {
                    relay: relay_url,
                    reason: RelayError::Cancelled,
                }
            }
        }
    }
}
