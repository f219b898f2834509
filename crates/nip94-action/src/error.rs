use thiserror::Error;

use crate::signer::SigningError;
use crate::validate::ValidationError;
use crate::verify::VerificationError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error("failed to publish to any relay ({attempted} attempted)")]
    AllRelaysFailed { attempted: usize },
    #[error("publish quorum failed: required {required}, got {actual}")]
    Quorum { required: usize, actual: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
