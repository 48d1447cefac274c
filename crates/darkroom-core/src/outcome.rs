use time::Duration;

use crate::request::ImageBlob;

/// Classified result of one attempt with one key. Produced by the remote
/// adapter; consumed within a single orchestration pass, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(ImageBlob),
    /// The key is bad (unauthorized/forbidden). Terminal for the key.
    AuthFailure,
    /// Quota exhausted for the key; eligible again after the cooldown.
    QuotaFailure { retry_after: Option<Duration> },
    /// Anything not attributable to the key: network fault, malformed
    /// request, server error. Aborts the pass.
    OtherFailure(String),
}

/// Result of a standalone key validation probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Valid,
    Invalid,
    /// The probe never got a verdict; the key's validity stays as it was.
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSuccess {
    pub image: ImageBlob,
    /// The key that produced the image (now preferred).
    pub secret: String,
}

/// Terminal failure of a whole orchestration pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationFailure {
    #[error("no usable key in the pool")]
    NoUsableCredential,
    #[error("every usable key is over quota; retry after the cooldown")]
    AllQuotaExhausted,
    #[error("generation failed: {0}")]
    Hard(String),
    #[error("a generation is already in progress")]
    InFlight,
}
