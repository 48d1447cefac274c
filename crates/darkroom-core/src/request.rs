use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;

use darkroom_prompt::{Instruction, ModeSettings};

/// An opaque image plus its MIME type. The orchestrator never inspects the
/// pixels; bytes flow through to the remote service as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub bytes: Bytes,
    pub mime_type: String,
}

impl ImageBlob {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn from_base64(data: &str, mime_type: impl Into<String>) -> Result<Self, base64::DecodeError> {
        Ok(Self {
            bytes: Bytes::from(BASE64.decode(data)?),
            mime_type: mime_type.into(),
        })
    }
}

/// One user-initiated generation call. Immutable once built; consumed by a
/// single orchestration pass.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub source: ImageBlob,
    pub settings: ModeSettings,
    pub instruction: Instruction,
    pub mask: Option<ImageBlob>,
    pub reference: Option<ImageBlob>,
    pub background: Option<ImageBlob>,
}

impl GenerationRequest {
    pub fn new(source: ImageBlob, settings: ModeSettings, instruction: Instruction) -> Self {
        Self {
            source,
            settings,
            instruction,
            mask: None,
            reference: None,
            background: None,
        }
    }

    pub fn with_mask(mut self, mask: ImageBlob) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_reference(mut self, reference: ImageBlob) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_background(mut self, background: ImageBlob) -> Self {
        self.background = Some(background);
        self
    }
}
