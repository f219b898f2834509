//! Input validation for the publish and verify entry points.
//!
//! Checks run in a fixed order and the first failure is returned:
//! relays, url, mimeType, fileHash, originalHash, size, dimensions, key.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use secrecy::zeroize::Zeroizing;
use secrecy::{ExposeSecret, SecretBox, SecretString};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::ValidationProfile;
use crate::events::{FileMetadata, RESERVED_TAG_NAMES};
use crate::verify::VerifyRequest;

pub const SECURE_RELAY_SCHEME: &str = "wss://";
pub const SECRET_KEY_LEN: usize = 32;

const NSEC_PREFIX: &str = "nsec1";
const NSEC_HRP: &str = "nsec";
const NOTE_PREFIX: &str = "note1";
const NOTE_HRP: &str = "note";

static MIME_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+/[a-z0-9.+-]+$").expect("valid mime regex"));
static HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-f0-9]{64}$").expect("valid hash regex"));
static DIMENSIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+x[0-9]+$").expect("valid dimensions regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no valid relay URLs provided")]
    NoRelays,
    #[error("invalid url {value:?}: {reason}")]
    Url { value: String, reason: String },
    #[error("invalid mimeType {0:?}: expected type/subtype")]
    MimeType(String),
    #[error("invalid {field} {value:?}: expected 64 hex characters")]
    Hash { field: &'static str, value: String },
    #[error("originalHash is required")]
    MissingOriginalHash,
    #[error("invalid size {0:?}: expected a non-negative integer")]
    Size(String),
    #[error("invalid dimensions {0:?}: expected WIDTHxHEIGHT")]
    Dimensions(String),
    #[error("nsec input is required")]
    MissingKey,
    #[error("invalid private key format: expected nsec1 bech32 or 64 hex characters")]
    KeyFormat,
    #[error("invalid private key length: expected 32 bytes, got {0}")]
    KeyLength(usize),
    #[error("invalid event id {0:?}: expected 64 hex characters or note1 encoding")]
    EventId(String),
}

/// Raw publish inputs as received from flags or the action environment.
///
/// Empty strings in optional fields are treated as unset.
#[derive(Debug)]
pub struct RawInputs {
    pub relays: String,
    pub url: String,
    pub mime_type: String,
    pub file_hash: String,
    pub content: Option<String>,
    pub original_hash: Option<String>,
    pub size: Option<String>,
    pub dimensions: Option<String>,
    pub filename: Option<String>,
    pub custom_tags_json: Option<String>,
    pub nsec: SecretString,
}

/// Raw verify inputs.
#[derive(Debug, Clone)]
pub struct RawVerifyInputs {
    pub relays: String,
    pub event_id: String,
    pub expected_content: String,
    pub file_hash: String,
}

#[derive(Debug)]
pub struct ValidatedInputs {
    pub relays: Vec<String>,
    pub file: FileMetadata,
    pub secret_key: SecretKeyBytes,
}

/// Exactly 32 bytes of private key material, zeroized on drop.
pub struct SecretKeyBytes(SecretBox<[u8; SECRET_KEY_LEN]>);

impl SecretKeyBytes {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(ValidationError::KeyLength(bytes.len()));
        }
        let mut key = Box::new([0u8; SECRET_KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self(SecretBox::new(key)))
    }

    pub(crate) fn expose(&self) -> &[u8; SECRET_KEY_LEN] {
        self.0.expose_secret()
    }
}

impl fmt::Debug for SecretKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKeyBytes([REDACTED])")
    }
}

pub fn validate_inputs(
    raw: &RawInputs,
    profile: ValidationProfile,
) -> Result<ValidatedInputs, ValidationError> {
    let relays = require_relays(&raw.relays)?;
    let url = validate_url(&raw.url)?;
    let mime_type = normalize_mime_type(&raw.mime_type)?;
    let file_hash = normalize_hash("fileHash", &raw.file_hash)?;

    let original_hash = match non_empty(raw.original_hash.as_deref()) {
        Some(value) => Some(normalize_hash("originalHash", value)?),
        None if profile == ValidationProfile::Strict => {
            return Err(ValidationError::MissingOriginalHash)
        }
        None => None,
    };

    let size = non_empty(raw.size.as_deref()).map(parse_size).transpose()?;
    let dimensions = non_empty(raw.dimensions.as_deref())
        .map(validate_dimensions)
        .transpose()?;
    let filename = non_empty(raw.filename.as_deref()).map(|v| v.trim().to_string());
    let extra_tags = parse_custom_tags(non_empty(raw.custom_tags_json.as_deref()));

    let secret_key = decode_secret_key(&raw.nsec)?;

    Ok(ValidatedInputs {
        relays,
        file: FileMetadata {
            url,
            mime_type,
            file_hash,
            original_hash,
            size,
            dimensions,
            filename,
            content: raw.content.clone().unwrap_or_default(),
            extra_tags,
        },
        secret_key,
    })
}

pub fn validate_verify_inputs(raw: &RawVerifyInputs) -> Result<VerifyRequest, ValidationError> {
    let relays = require_relays(&raw.relays)?;
    let event_id = normalize_event_id(&raw.event_id)?;
    let expected_hash = normalize_hash("fileHash", &raw.file_hash)?;

    Ok(VerifyRequest {
        relays,
        event_id,
        expected_content: raw.expected_content.clone(),
        expected_hash,
    })
}

/// Split a comma separated relay list, keeping `wss://` entries only.
///
/// Trailing slashes are stripped and duplicates collapse onto their first
/// occurrence, so each relay is attempted once.
pub fn parse_relays(input: &str) -> Vec<String> {
    let mut relays: Vec<String> = Vec::new();

    for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if !entry.starts_with(SECURE_RELAY_SCHEME) {
            warn!(relay = %entry, "Dropping relay without {} scheme", SECURE_RELAY_SCHEME);
            continue;
        }

        let normalized = entry.trim_end_matches('/');
        if normalized.len() <= SECURE_RELAY_SCHEME.len() {
            warn!(relay = %entry, "Dropping relay without host");
            continue;
        }

        if relays.iter().any(|existing| existing == normalized) {
            debug!(relay = %normalized, "Skipping duplicate relay");
            continue;
        }

        relays.push(normalized.to_string());
    }

    relays
}

pub fn decode_secret_key(input: &SecretString) -> Result<SecretKeyBytes, ValidationError> {
    let trimmed = input.expose_secret().trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingKey);
    }

    let bytes = if trimmed.starts_with(NSEC_PREFIX) {
        let (hrp, data) = bech32::decode(trimmed).map_err(|_| ValidationError::KeyFormat)?;
        let data = Zeroizing::new(data);
        if hrp.as_str() != NSEC_HRP {
            return Err(ValidationError::KeyFormat);
        }
        data
    } else {
        let hex_value = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        Zeroizing::new(hex::decode(hex_value).map_err(|_| ValidationError::KeyFormat)?)
    };

    SecretKeyBytes::from_slice(&bytes)
}

fn require_relays(input: &str) -> Result<Vec<String>, ValidationError> {
    let relays = parse_relays(input);
    if relays.is_empty() {
        return Err(ValidationError::NoRelays);
    }
    Ok(relays)
}

fn validate_url(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    Url::parse(trimmed).map_err(|err| ValidationError::Url {
        value: trimmed.to_string(),
        reason: err.to_string(),
    })?;
    Ok(trimmed.to_string())
}

fn normalize_mime_type(value: &str) -> Result<String, ValidationError> {
    let lowered = value.trim().to_ascii_lowercase();
    if MIME_TYPE_RE.is_match(&lowered) {
        Ok(lowered)
    } else {
        Err(ValidationError::MimeType(value.to_string()))
    }
}

fn normalize_hash(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let lowered = value.trim().to_ascii_lowercase();
    if HASH_RE.is_match(&lowered) {
        Ok(lowered)
    } else {
        Err(ValidationError::Hash {
            field,
            value: value.to_string(),
        })
    }
}

fn normalize_event_id(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.starts_with(NOTE_PREFIX) {
        let invalid = || ValidationError::EventId(trimmed.to_string());
        let (hrp, data) = bech32::decode(trimmed).map_err(|_| invalid())?;
        if hrp.as_str() != NOTE_HRP || data.len() != 32 {
            return Err(invalid());
        }
        return Ok(hex::encode(data));
    }

    let lowered = trimmed.to_ascii_lowercase();
    if HASH_RE.is_match(&lowered) {
        Ok(lowered)
    } else {
        Err(ValidationError::EventId(trimmed.to_string()))
    }
}

fn parse_size(value: &str) -> Result<u64, ValidationError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ValidationError::Size(value.to_string()))
}

fn validate_dimensions(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if DIMENSIONS_RE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::Dimensions(value.to_string()))
    }
}

/// Parse the optional custom tag object. Malformed input is ignored with a
/// warning rather than failing the run.
fn parse_custom_tags(json: Option<&str>) -> Vec<(String, String)> {
    let Some(json) = json else {
        return Vec::new();
    };

    let object = match serde_json::from_str::<serde_json::Value>(json) {
        Ok(serde_json::Value::Object(object)) => object,
        Ok(_) => {
            warn!("Custom tags are not a JSON object; ignoring");
            return Vec::new();
        }
        Err(err) => {
            warn!(error = %err, "Failed to parse custom tags JSON; ignoring");
            return Vec::new();
        }
    };

    let mut tags: Vec<(String, String)> = object
        .into_iter()
        .filter_map(|(key, value)| {
            if RESERVED_TAG_NAMES.contains(&key.as_str()) {
                warn!(tag = %key, "Custom tag collides with a metadata tag; skipping");
                return None;
            }
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => {
                    warn!(tag = %key, "Custom tag value must be a scalar; skipping");
                    return None;
                }
            };
            Some((key, value))
        })
        .collect();
    tags.sort_by(|a, b| a.0.cmp(&b.0));
    tags
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
