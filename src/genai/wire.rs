//! Gemini REST wire types.
//!
//! Request types serialize to the `generateContent` JSON body; response types
//! are deserialized leniently and then narrowed by the `into_*` helpers, which
//! are the only way a response leaves this module.

use super::GenAiError;
use crate::core::dish::InlineImage;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    #[serde(default, skip_serializing)]
    pub thought: Option<bool>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn image(image: &InlineImage) -> Self {
        Self::inline(&image.mime_type, &image.data)
    }

    pub fn inline(mime_type: &str, data: &[u8]) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data: STANDARD.encode(data),
            }),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: &str, parts: Vec<Part>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

impl SpeechConfig {
    pub fn voice(name: &str) -> Self {
        Self {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: name.to_string(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

const BAD_FINISH_REASONS: [&str; 5] = [
    "SAFETY",
    "PROHIBITED_CONTENT",
    "IMAGE_SAFETY",
    "BLOCKLIST",
    "RECITATION",
];

impl GenerateContentResponse {
    fn parts(&self) -> Result<&[Part], GenAiError> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(GenAiError::Blocked(reason.to_string()));
        }

        let candidate = self
            .candidates
            .first()
            .ok_or_else(|| GenAiError::InvalidResponse("no candidates returned".to_string()))?;

        if let Some(reason) = candidate.finish_reason.as_deref()
            && BAD_FINISH_REASONS.contains(&reason)
        {
            return Err(GenAiError::Blocked(reason.to_string()));
        }

        Ok(candidate
            .content
            .as_ref()
            .map(|c| c.parts.as_slice())
            .unwrap_or_default())
    }

    /// Concatenated non-thought text of the first candidate; may be empty for stream chunks.
    pub fn text_lossy(&self) -> Result<String, GenAiError> {
        Ok(self
            .parts()?
            .iter()
            .filter(|p| p.thought != Some(true))
            .filter_map(|p| p.text.as_deref())
            .collect())
    }

    /// Non-empty text of the first candidate.
    pub fn into_text(self) -> Result<String, GenAiError> {
        let text = self.text_lossy()?;
        if text.trim().is_empty() {
            return Err(GenAiError::InvalidResponse(
                "response contained no text".to_string(),
            ));
        }
        Ok(text)
    }

    /// First inline image of the first candidate.
    pub fn into_image(self) -> Result<InlineImage, GenAiError> {
        let parts = self.parts()?;
        let data = parts
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| d.mime_type.starts_with("image/"));

        let Some(data) = data else {
            let refusal: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
            return Err(if refusal.trim().is_empty() {
                GenAiError::InvalidResponse("response contained no image".to_string())
            } else {
                GenAiError::Blocked(refusal.trim().to_string())
            });
        };

        let bytes = STANDARD
            .decode(&data.data)
            .map_err(|e| GenAiError::InvalidResponse(format!("invalid image data: {e}")))?;
        Ok(InlineImage::new(data.mime_type.clone(), bytes))
    }

    /// Concatenated raw audio bytes of the first candidate.
    pub fn into_audio(self) -> Result<Vec<u8>, GenAiError> {
        let mut audio = Vec::new();
        for data in self.parts()?.iter().filter_map(|p| p.inline_data.as_ref()) {
            if !data.mime_type.starts_with("audio/") {
                continue;
            }
            let bytes = STANDARD
                .decode(&data.data)
                .map_err(|e| GenAiError::InvalidResponse(format!("invalid audio data: {e}")))?;
            audio.extend_from_slice(&bytes);
        }
        if audio.is_empty() {
            return Err(GenAiError::InvalidResponse(
                "response contained no audio".to_string(),
            ));
        }
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn parse(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_into_text_skips_thoughts() {
        let response = parse(
            r#"{"candidates":[{"content":{"role":"model","parts":[
                {"text":"thinking...","thought":true},
                {"text":"Hello "},{"text":"chef"}]},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(response.into_text().unwrap(), "Hello chef");
    }

    #[test]
    fn test_into_image_decodes_inline_data() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"Here you go"},
                {"inlineData":{"mimeType":"image/png","data":"iVBORw=="}}]}}]}"#,
        );
        let image = response.into_image().unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, vec![0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn test_into_image_text_only_is_blocked() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"I can't create that image."}]}}]}"#,
        );
        assert!(matches!(
            response.into_image(),
            Err(GenAiError::Blocked(_))
        ));
    }

    #[test]
    fn test_prompt_feedback_block() {
        let response = parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
        assert!(matches!(response.into_text(), Err(GenAiError::Blocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn test_no_candidates_is_invalid() {
        let response = parse("{}");
        assert!(matches!(
            response.into_audio(),
            Err(GenAiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_into_audio_concatenates_parts() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[
                {"inlineData":{"mimeType":"audio/L16;codec=pcm;rate=24000","data":"AAE="}},
                {"inlineData":{"mimeType":"audio/L16;codec=pcm;rate=24000","data":"AgM="}}]}}]}"#,
        );
        assert_eq!(response.into_audio().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = GenerateContentRequest {
            contents: vec![Content::new("user", vec![Part::text("hi")])],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["IMAGE".to_string()]),
                image_config: Some(ImageConfig {
                    aspect_ratio: "4:3".to_string(),
                    image_size: None,
                }),
                ..GenerationConfig::default()
            }),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(
            json["generationConfig"]["imageConfig"]["aspectRatio"],
            "4:3"
        );
        assert!(json["generationConfig"].get("speechConfig").is_none());
        assert!(json.get("systemInstruction").is_none());
    }
}
