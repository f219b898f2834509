//! Signs a [`MetadataEvent`] with caller-supplied key bytes.

use bech32::{Bech32, Hrp};
use nostr_sdk::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::events::{event_tag_value, MetadataEvent, NostrTag};
use crate::validate::SecretKeyBytes;

const SIGNATURE_HEX_LEN: usize = 128;
const NOTE_HRP: &str = "note";

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invalid secret key: {0}")]
    Key(#[from] nostr_sdk::nostr::key::Error),
    #[error("invalid tag: {0}")]
    Tag(#[from] nostr_sdk::nostr::event::tag::Error),
    #[error("signing failed: {0}")]
    Sign(String),
    #[error("signer produced a malformed signature ({0} characters)")]
    MalformedSignature(usize),
    #[error("note encoding failed: {0}")]
    Encoding(String),
}

/// A signed kind 1063 event. Fields are read-only; re-signing produces a new
/// value.
#[derive(Debug, Clone)]
pub struct SignedEvent {
    event: Event,
}

impl SignedEvent {
    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn id_hex(&self) -> String {
        self.event.id.to_hex()
    }

    pub fn pubkey_hex(&self) -> String {
        self.event.pubkey.to_hex()
    }

    pub fn sig_hex(&self) -> String {
        self.event.sig.to_string()
    }

    pub fn created_at(&self) -> u64 {
        self.event.created_at.as_secs()
    }

    pub fn content(&self) -> &str {
        &self.event.content
    }

    pub fn tag_value(&self, name: &str) -> Option<&str> {
        event_tag_value(&self.event, name)
    }

    pub fn tags(&self) -> Vec<NostrTag> {
        self.event.tags.iter().map(NostrTag::from_sdk_tag).collect()
    }

    /// `note1…` display encoding of the id.
    pub fn note_id(&self) -> Result<String, SigningError> {
        encode_note_id(self.event.id.as_bytes())
    }
}

/// Sign `event` with `secret_key`. The key bytes are dropped (and zeroized)
/// before this returns.
pub fn sign_event(
    event: &MetadataEvent,
    secret_key: SecretKeyBytes,
) -> Result<SignedEvent, SigningError> {
    let keys = Keys::new(SecretKey::from_slice(secret_key.expose())?);
    drop(secret_key);

    let tags = event
        .tags
        .iter()
        .map(|tag| tag.to_sdk_tag())
        .collect::<Result<Vec<_>, _>>()?;

    let signed = EventBuilder::new(Kind::from(event.kind), event.content.clone())
        .tags(tags)
        .custom_created_at(Timestamp::from(event.created_at))
        .sign_with_keys(&keys)
        .map_err(|err| SigningError::Sign(err.to_string()))?;

    check_signature_shape(&signed.sig.to_string())?;
    debug!(event_id = %signed.id, pubkey = %signed.pubkey, "Signed metadata event");

    Ok(SignedEvent { event: signed })
}

pub fn encode_note_id(id: &[u8]) -> Result<String, SigningError> {
    let hrp = Hrp::parse(NOTE_HRP).map_err(|err| SigningError::Encoding(err.to_string()))?;
    bech32::encode::<Bech32>(hrp, id).map_err(|err| SigningError::Encoding(err.to_string()))
}

fn check_signature_shape(sig: &str) -> Result<(), SigningError> {
    if sig.len() == SIGNATURE_HEX_LEN && sig.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(SigningError::MalformedSignature(sig.len()))
    }
}
