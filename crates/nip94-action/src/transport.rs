//! Relay capability injected into the publisher and verifier.
//!
//! [`RelayConnector`] opens one [`RelayHandle`] per relay URL. Production code
//! uses [`NostrRelayConnector`]; tests supply in-process doubles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use nostr_sdk::prelude::*;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

pub type SignalStream = BoxStream<'static, SubscriptionSignal>;

/// What a relay reports on an open subscription.
#[derive(Debug, Clone)]
pub enum SubscriptionSignal {
    Event(Box<Event>),
    /// The relay has sent every stored match it has.
    EndOfStoredEvents,
    /// The relay closed the subscription.
    Closed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("connection timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("relay rejected event: {0}")]
    Rejected(String),
    #[error("subscription failed: {0}")]
    Subscribe(String),
    #[error("close failed: {0}")]
    Close(String),
    #[error("attempt cancelled")]
    Cancelled,
}

#[async_trait]
pub trait RelayConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Arc<dyn RelayHandle>, RelayError>;
}

#[async_trait]
pub trait RelayHandle: Send + Sync {
    fn url(&self) -> &str;

    /// Submit `event` and wait for the relay's OK.
    async fn publish(&self, event: &Event) -> Result<(), RelayError>;

    async fn subscribe(&self, filter: Filter) -> Result<SignalStream, RelayError>;

    async fn close(&self) -> Result<(), RelayError>;
}

/// Opens a dedicated `nostr-sdk` client per relay so one relay's state never
/// leaks into another's.
#[derive(Debug, Clone)]
pub struct NostrRelayConnector {
    connect_timeout: Duration,
}

impl NostrRelayConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl RelayConnector for NostrRelayConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn RelayHandle>, RelayError> {
        let client = Client::default();
        client
            .add_relay(url)
            .await
            .map_err(|err| RelayError::Connect(err.to_string()))?;

        if let Err(err) = client.try_connect_relay(url, self.connect_timeout).await {
            client.disconnect().await;
            return Err(RelayError::Connect(err.to_string()));
        }

        debug!(relay = %url, "Connected to relay");
        Ok(Arc::new(NostrRelayHandle {
            url: url.to_string(),
            client,
        }))
    }
}

pub struct NostrRelayHandle {
    url: String,
    client: Client,
}

#[async_trait]
impl RelayHandle for NostrRelayHandle {
    fn url(&self) -> &str {
        &self.url
    }

    async fn publish(&self, event: &Event) -> Result<(), RelayError> {
        let output = self
            .client
            .send_event(event)
            .await
            .map_err(|err| RelayError::Rejected(err.to_string()))?;

        if !output.success.is_empty() {
            return Ok(());
        }

        let reason = output
            .failed
            .into_values()
            .next()
            .unwrap_or_else(|| "no acknowledgement".to_string());
        Err(RelayError::Rejected(reason))
    }

    async fn subscribe(&self, filter: Filter) -> Result<SignalStream, RelayError> {
        // Listen before subscribing so an immediate EOSE is not missed.
        let notifications = self.client.notifications();
        let output = self
            .client
            .subscribe(filter, None)
            .await
            .map_err(|err| RelayError::Subscribe(err.to_string()))?;
        let subscription_id = output.val;

        let signals = stream::unfold(
            (notifications, subscription_id),
            |(mut notifications, subscription_id)| async move {
                loop {
                    match notifications.recv().await {
                        Ok(notification) => {
                            if let Some(signal) = signal_for(&subscription_id, notification) {
                                return Some((signal, (notifications, subscription_id)));
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "Relay notifications lagged");
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            },
        );

        Ok(signals.boxed())
    }

    async fn close(&self) -> Result<(), RelayError> {
        self.client.disconnect().await;
        Ok(())
    }
}

fn signal_for(
    subscription_id: &SubscriptionId,
    notification: RelayPoolNotification,
) -> Option<SubscriptionSignal> {
    match notification {
        RelayPoolNotification::Event {
            subscription_id: id,
            event,
            ..
        } if id == *subscription_id => Some(SubscriptionSignal::Event(event)),
        RelayPoolNotification::Message { message, .. } => match message {
            RelayMessage::EndOfStoredEvents(id) if id.as_ref() == subscription_id => {
                Some(SubscriptionSignal::EndOfStoredEvents)
            }
            RelayMessage::Closed {
                subscription_id: id,
                message,
            } if id.as_ref() == subscription_id => {
                Some(SubscriptionSignal::Closed(message.to_string()))
            }
            _ => None,
        },
        _ => None,
    }
}
