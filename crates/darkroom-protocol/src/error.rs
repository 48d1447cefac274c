use serde::{Deserialize, Serialize};

/// Error envelope returned by the Generative Language API on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    /// gRPC status name, e.g. RESOURCE_EXHAUSTED or PERMISSION_DENIED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ErrorEnvelope {
    /// Best-effort extraction of a human-readable message from an error body.
    /// Falls back to the raw payload when it does not match the envelope shape.
    pub fn message_from_bytes(bytes: &[u8]) -> String {
        match serde_json::from_slice::<ErrorEnvelope>(bytes) {
            Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
            _ => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_message_from_envelope() {
        let body = br#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            ErrorEnvelope::message_from_bytes(body),
            "Resource has been exhausted"
        );
    }

    #[test]
    fn falls_back_to_raw_body() {
        assert_eq!(ErrorEnvelope::message_from_bytes(b"bad gateway"), "bad gateway");
    }
}
