//! In-process relay doubles for publisher and verifier tests.
//!
//! Each [`MockRelay`] scripts how one relay connects, answers a publish,
//! answers a subscription, and closes. [`MockConnector`] counts every
//! connect, publish and close so tests can assert on cleanup.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use nostr_sdk::prelude::{Event, Filter};

use nip94_action::{
    build_metadata_event, sign_event, FileMetadata, RelayConnector, RelayError, RelayHandle,
    SecretKeyBytes, SignalStream, SignedEvent, SubscriptionSignal,
};

pub const FILE_HASH: &str = "3f79bb7b435b05321651daefd374cdc681dc06faa65e374e38337b88ca046dea";

#[derive(Debug, Clone)]
pub enum ConnectBehavior {
    Ok,
    Fail,
    Hang,
}

#[derive(Debug, Clone)]
pub enum PublishBehavior {
    Ack(Duration),
    Reject(&'static str),
    Hang,
}

#[derive(Debug, Clone)]
pub enum SubscribeBehavior {
    /// Emit each signal after its delay, then stay open.
    Script(Vec<(Duration, SubscriptionSignal)>),
    Fail,
}

#[derive(Debug, Clone)]
pub struct MockRelay {
    pub connect: ConnectBehavior,
    pub publish: PublishBehavior,
    pub subscribe: SubscribeBehavior,
    pub fail_close: bool,
}

impl MockRelay {
    fn with_publish(publish: PublishBehavior) -> Self {
        Self {
            connect: ConnectBehavior::Ok,
            publish,
            subscribe: SubscribeBehavior::Script(Vec::new()),
            fail_close: false,
        }
    }

    pub fn acking(delay_ms: u64) -> Self {
        Self::with_publish(PublishBehavior::Ack(Duration::from_millis(delay_ms)))
    }

    pub fn rejecting(reason: &'static str) -> Self {
        Self::with_publish(PublishBehavior::Reject(reason))
    }

    pub fn hanging() -> Self {
        Self::with_publish(PublishBehavior::Hang)
    }

    pub fn unreachable() -> Self {
        Self {
            connect: ConnectBehavior::Fail,
            ..Self::hanging()
        }
    }

    pub fn slow_to_connect() -> Self {
        Self {
            connect: ConnectBehavior::Hang,
            ..Self::hanging()
        }
    }

    pub fn serving(script: Vec<(u64, SubscriptionSignal)>) -> Self {
        Self {
            subscribe: SubscribeBehavior::Script(
                script
                    .into_iter()
                    .map(|(delay_ms, signal)| (Duration::from_millis(delay_ms), signal))
                    .collect(),
            ),
            ..Self::hanging()
        }
    }

    pub fn silent() -> Self {
        Self::serving(Vec::new())
    }

    pub fn refusing_subscriptions() -> Self {
        Self {
            subscribe: SubscribeBehavior::Fail,
            ..Self::hanging()
        }
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

#[derive(Clone, Copy)]
enum Counter {
    Connect,
    Publish,
    Close,
}

#[derive(Debug, Default)]
struct Counters {
    connects: HashMap<String, usize>,
    publishes: HashMap<String, usize>,
    closes: HashMap<String, usize>,
}

#[derive(Clone, Default)]
pub struct MockConnector {
    relays: Arc<HashMap<String, MockRelay>>,
    counters: Arc<Mutex<Counters>>,
}

impl MockConnector {
    pub fn new(relays: Vec<(&str, MockRelay)>) -> Self {
        Self {
            relays: Arc::new(
                relays
                    .into_iter()
                    .map(|(url, relay)| (url.to_string(), relay))
                    .collect(),
            ),
            counters: Arc::default(),
        }
    }

    pub fn connects(&self, url: &str) -> usize {
        *self.counters.lock().unwrap().connects.get(url).unwrap_or(&0)
    }

    pub fn publishes(&self, url: &str) -> usize {
        *self.counters.lock().unwrap().publishes.get(url).unwrap_or(&0)
    }

    pub fn closes(&self, url: &str) -> usize {
        *self.counters.lock().unwrap().closes.get(url).unwrap_or(&0)
    }

    pub fn total_closes(&self) -> usize {
        self.counters.lock().unwrap().closes.values().sum()
    }

    fn bump(&self, counter: Counter, url: &str) {
        let mut counters = self.counters.lock().unwrap();
        let map = match counter {
            Counter::Connect => &mut counters.connects,
            Counter::Publish => &mut counters.publishes,
            Counter::Close => &mut counters.closes,
        };
        *map.entry(url.to_string()).or_default() += 1;
    }
}

#[async_trait]
impl RelayConnector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn RelayHandle>, RelayError> {
        self.bump(Counter::Connect, url);
        let relay = self
            .relays
            .get(url)
            .cloned()
            .ok_or_else(|| RelayError::Connect(format!("unknown relay {url}")))?;

        match relay.connect {
            ConnectBehavior::Ok => Ok(Arc::new(MockHandle {
                url: url.to_string(),
                relay,
                connector: self.clone(),
            })),
            ConnectBehavior::Fail => Err(RelayError::Connect("connection refused".to_string())),
            ConnectBehavior::Hang => std::future::pending().await,
        }
    }
}

struct MockHandle {
    url: String,
    relay: MockRelay,
    connector: MockConnector,
}

#[async_trait]
impl RelayHandle for MockHandle {
    fn url(&self) -> &str {
        &self.url
    }

    async fn publish(&self, _event: &Event) -> Result<(), RelayError> {
        self.connector.bump(Counter::Publish, &self.url);
        match &self.relay.publish {
            PublishBehavior::Ack(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            PublishBehavior::Reject(reason) => Err(RelayError::Rejected(reason.to_string())),
            PublishBehavior::Hang => std::future::pending().await,
        }
    }

    async fn subscribe(&self, _filter: Filter) -> Result<SignalStream, RelayError> {
        match &self.relay.subscribe {
            SubscribeBehavior::Script(script) => {
                let signals = stream::iter(script.clone())
                    .then(|(delay, signal)| async move {
                        tokio::time::sleep(delay).await;
                        signal
                    })
                    .chain(stream::pending());
                Ok(signals.boxed())
            }
            SubscribeBehavior::Fail => Err(RelayError::Subscribe("REQ refused".to_string())),
        }
    }

    async fn close(&self) -> Result<(), RelayError> {
        self.connector.bump(Counter::Close, &self.url);
        if self.relay.fail_close {
            Err(RelayError::Close("socket already gone".to_string()))
        } else {
            Ok(())
        }
    }
}

pub fn urls(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

pub fn sample_file(content: &str) -> FileMetadata {
    FileMetadata {
        url: "https://example.com/releases/app-1.2.0.tar.gz".to_string(),
        mime_type: "application/gzip".to_string(),
        file_hash: FILE_HASH.to_string(),
        original_hash: None,
        size: Some(1024),
        dimensions: None,
        filename: None,
        content: content.to_string(),
        extra_tags: Vec::new(),
    }
}

pub fn signed_event(content: &str) -> SignedEvent {
    let key = SecretKeyBytes::from_slice(&[7u8; 32]).unwrap();
    sign_event(&build_metadata_event(&sample_file(content)), key).unwrap()
}

pub fn event_signal(event: &SignedEvent) -> SubscriptionSignal {
    SubscriptionSignal::Event(Box::new(event.event().clone()))
}
