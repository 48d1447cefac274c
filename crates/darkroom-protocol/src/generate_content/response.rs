use serde::{Deserialize, Serialize};

use crate::generate_content::types::{Candidate, PromptFeedback};
use crate::types::Blob;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

impl GenerateContentResponse {
    /// First inline image of the first candidate, if the model returned one.
    pub fn first_inline_image(&self) -> Option<&Blob> {
        self.candidates
            .first()?
            .content
            .parts
            .iter()
            .find_map(|part| part.inline_data.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_inline_image_skips_text_parts() {
        let json = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Here is the edit." },
                        { "inlineData": { "mimeType": "image/png", "data": "QUJD" } }
                    ],
                    "role": "model"
                },
                "finishReason": "STOP"
            }],
            "modelVersion": "gemini-2.5-flash-image"
        });
        let resp: GenerateContentResponse =
            serde_json::from_value(json).expect("response should parse");
        let blob = resp.first_inline_image().expect("inline image expected");
        assert_eq!(blob.mime_type, "image/png");
        assert_eq!(blob.data, "QUJD");
    }

    #[test]
    fn empty_response_has_no_image() {
        let resp: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({})).expect("response should parse");
        assert!(resp.first_inline_image().is_none());
    }
}
