use async_trait::async_trait;

use crate::outcome::{AttemptOutcome, ProbeOutcome};
use crate::request::ImageBlob;

/// One slot of the outgoing payload, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadPart {
    Image(ImageBlob),
    Text(String),
}

/// Everything the remote service needs for one attempt, minus the key.
/// Part order is significant and already final.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptPayload {
    pub parts: Vec<PayloadPart>,
}

/// Performs exactly one remote call per invocation and folds every transport
/// result into a classified [`AttemptOutcome`]. No error may escape this
/// boundary as anything other than one of the three failure kinds.
#[async_trait]
pub trait RemoteAdapter: Send + Sync {
    async fn attempt(&self, secret: &str, payload: &AttemptPayload) -> AttemptOutcome;

    /// Cheap validity check for a key, independent of any generation.
    async fn probe(&self, secret: &str) -> ProbeOutcome;
}

/// Offline stand-in: returns the first image of the payload unchanged. Used
/// when no real service is reachable, so the rest of the pipeline can be
/// exercised end to end.
#[derive(Debug, Default)]
pub struct EchoAdapter;

#[async_trait]
impl RemoteAdapter for EchoAdapter {
    async fn attempt(&self, _secret: &str, payload: &AttemptPayload) -> AttemptOutcome {
        let image = payload.parts.iter().find_map(|part| match part {
            PayloadPart::Image(image) => Some(image.clone()),
            PayloadPart::Text(_) => None,
        });
        match image {
            Some(image) => AttemptOutcome::Success(image),
            None => AttemptOutcome::OtherFailure("payload contains no image".to_owned()),
        }
    }

    async fn probe(&self, _secret: &str) -> ProbeOutcome {
        ProbeOutcome::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn echo_returns_the_source_image() {
        let source = ImageBlob::new(Bytes::from_static(b"pixels"), "image/png");
        let payload = AttemptPayload {
            parts: vec![
                PayloadPart::Image(source.clone()),
                PayloadPart::Text("prompt".into()),
            ],
        };
        let outcome = EchoAdapter.attempt("unused", &payload).await;
        assert_eq!(outcome, AttemptOutcome::Success(source));
    }

    #[tokio::test]
    async fn echo_rejects_imageless_payloads() {
        let payload = AttemptPayload {
            parts: vec![PayloadPart::Text("prompt".into())],
        };
        assert!(matches!(
            EchoAdapter.attempt("unused", &payload).await,
            AttemptOutcome::OtherFailure(_)
        ));
    }
}
