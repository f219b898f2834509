//! Publish and verify NIP-94 file metadata events (kind 1063) from CI.
//!
//! A release job hands over a file URL, its MIME type and SHA-256 hash; this
//! crate validates the inputs, builds and signs the metadata event, fans it out
//! to every configured relay, and can later confirm that a relay serves the
//! event back unchanged.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         NIP94-ACTION                             │
//! │                                                                  │
//! │  validate ──► events ──► signer ──► ┌─────────────────────┐      │
//! │                                     │   RelayPublisher    │      │
//! │                                     │   (write path)      │      │
//! │                                     │ - connect per relay │      │
//! │                                     │ - publish + timeout │      │
//! │                                     │ - min_acks policy   │      │
//! │                                     └──────────┬──────────┘      │
//! │                                                │                 │
//! │  ┌─────────────────────┐                       ▼                 │
//! │  │   EventVerifier     │ ◄──────────── Nostr Relays              │
//! │  │   (read path)       │                                         │
//! │  │ - match / EOSE      │      RelayConnector (injected)          │
//! │  │ - timeout           │      ConnectionSet (closed once)        │
//! │  └─────────────────────┘                                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Event Tags
//!
//! | Tag | Constant | Required |
//! |-----|----------|----------|
//! | `url` | `TAG_URL` | yes |
//! | `m` | `TAG_MIME_TYPE` | yes |
//! | `x` | `TAG_HASH` | yes |
//! | `ox` | `TAG_ORIGINAL_HASH` | no |
//! | `size` | `TAG_SIZE` | no |
//! | `dim` | `TAG_DIMENSIONS` | no |
//! | `filename` | `TAG_FILENAME` | no |
//!
//! # Example: Publishing
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nip94_action::{
//!     build_metadata_event, sign_event, validate_inputs, NostrRelayConnector,
//!     PublisherConfig, RelayPublisher, ValidationProfile,
//! };
//!
//! let inputs = validate_inputs(&raw, ValidationProfile::Standard)?;
//! let event = sign_event(&build_metadata_event(&inputs.file), inputs.secret_key)?;
//!
//! let config = PublisherConfig::default();
//! let connector = Arc::new(NostrRelayConnector::new(config.connect_timeout));
//! let report = RelayPublisher::new(connector, config)
//!     .publish(&inputs.relays, &event)
//!     .await?;
//! println!("{} relays acknowledged {}", report.success(), report.note_id);
//! ```
//!
//! # Example: Verifying
//!
//! ```rust,ignore
//! use nip94_action::{validate_verify_inputs, EventVerifier, NostrRelayConnector, VerifierConfig};
//!
//! let request = validate_verify_inputs(&raw)?;
//! let config = VerifierConfig::default();
//! let connector = Arc::new(NostrRelayConnector::new(config.connect_timeout));
//! let verified = EventVerifier::new(connector, config).verify(&request).await?;
//! ```

mod config;
mod connections;
mod error;
mod events;
mod output;
mod publish;
mod signer;
mod transport;
mod validate;
mod verify;
mod wait;

pub use config::{
    env_fallback, PublisherConfig, CUSTOM_TAGS_ENV, ValidationProfile, VerifierConfig, DEFAULT_CONNECT_TIMEOUT_SECS,
    DEFAULT_MIN_ACKS, DEFAULT_PUBLISH_TIMEOUT_SECS, DEFAULT_VERIFY_TIMEOUT_SECS,
};
pub use connections::{CloseReport, ConnectionSet};
pub use error::Error;
pub use events::{
    build_metadata_event, build_metadata_event_at, event_tag_value, tag_value, unix_timestamp,
    FileMetadata, MetadataEvent, NostrTag, KIND_FILE_METADATA, RESERVED_TAG_NAMES,
    TAG_DIMENSIONS, TAG_FILENAME, TAG_HASH, TAG_MIME_TYPE, TAG_ORIGINAL_HASH, TAG_SIZE, TAG_URL,
};
pub use output::{error_annotation, viewer_links, ActionOutputs, OUTPUT_FILE_ENV};
pub use publish::{PublishReport, RelayOutcome, RelayPublisher};
pub use signer::{encode_note_id, sign_event, SignedEvent, SigningError};
pub use transport::{
    NostrRelayConnector, NostrRelayHandle, RelayConnector, RelayError, RelayHandle,
    SignalStream, SubscriptionSignal,
};
pub use validate::{
    decode_secret_key, parse_relays, validate_inputs, validate_verify_inputs, RawInputs,
    RawVerifyInputs, SecretKeyBytes, ValidatedInputs, ValidationError, SECRET_KEY_LEN,
    SECURE_RELAY_SCHEME,
};
pub use verify::{check_event, EventVerifier, VerificationError, VerifiedEvent, VerifyRequest};
pub use wait::{wait_bounded, Waited};

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
