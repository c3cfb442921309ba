//! Gemini REST implementation of [`GenAiClient`].

use super::{
    ChatTurn, ExtractedDish, GenAiClient, GenAiError, ImageRequest, TokenStream,
    sse::SseDecoder,
    wire::{
        ApiErrorBody, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
        ImageConfig, Part, SpeechConfig,
    },
};
use crate::{config::settings::GenAiSettings, core::dish::InlineImage};
use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const EXTRACTION_PROMPT: &str = "Extract every dish from this restaurant menu. \
For each dish return its name and its description or ingredients exactly as written. \
Use an empty description when the menu gives none. Ignore prices, section headings \
and opening hours.";

const TRANSCRIPTION_PROMPT: &str = "Transcribe this recording of a restaurant owner \
reading out their menu. Return only the spoken words, one dish per line.";

#[derive(Deserialize)]
struct ExtractionEnvelope {
    #[serde(default)]
    dishes: Vec<ExtractedDish>,
}

/// Client for the Gemini `generateContent` family of endpoints.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    settings: GenAiSettings,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.settings.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Builds a client with the configured request timeout.
    pub fn new(settings: GenAiSettings, api_key: impl Into<String>) -> Result<Self, GenAiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            settings,
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1beta/models/{model}:{method}",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    async fn post(
        &self,
        model: &str,
        method: &str,
        request: &GenerateContentRequest,
    ) -> Result<reqwest::Response, GenAiError> {
        let url = self.endpoint(model, method);
        debug!("POST {url}");
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Gemini {method} on {model} failed with {status}");
        Err(error_from_body(status.as_u16(), &body))
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenAiError> {
        let response = self.post(model, "generateContent", request).await?;
        Ok(response.json().await?)
    }

    fn image_config(request: &ImageRequest) -> GenerationConfig {
        GenerationConfig {
            response_modalities: Some(vec!["IMAGE".to_string()]),
            image_config: Some(ImageConfig {
                aspect_ratio: request.aspect_ratio.clone(),
                image_size: request.image_size.clone(),
            }),
            ..GenerationConfig::default()
        }
    }
}

/// Maps a non-success response body to a [`GenAiError`].
fn error_from_body(status: u16, body: &str) -> GenAiError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => GenAiError::from_status(
            status,
            parsed.error.status.as_deref(),
            parsed.error.message,
        ),
        Err(_) => GenAiError::from_status(status, None, body.trim().to_string()),
    }
}

fn extraction_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "dishes": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "description": { "type": "STRING" }
                    },
                    "required": ["name", "description"]
                }
            }
        },
        "required": ["dishes"]
    })
}

/// Parses the JSON text returned by structured extraction, dropping nameless rows.
fn parse_extraction(text: &str) -> Result<Vec<ExtractedDish>, GenAiError> {
    let trimmed = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let envelope: ExtractionEnvelope = serde_json::from_str(trimmed)?;
    Ok(envelope
        .dishes
        .into_iter()
        .map(|d| ExtractedDish {
            name: d.name.trim().to_string(),
            description: d.description.trim().to_string(),
        })
        .filter(|d| !d.name.is_empty())
        .collect())
}

fn chat_contents(history: &[ChatTurn], message: &str) -> Vec<Content> {
    history
        .iter()
        .map(|turn| Content::new(turn.role.as_str(), vec![Part::text(turn.text.clone())]))
        .chain(std::iter::once(Content::new(
            "user",
            vec![Part::text(message)],
        )))
        .collect()
}

/// Decodes one SSE payload into the text it carries.
fn chunk_text(payload: &str) -> Result<String, GenAiError> {
    let chunk: GenerateContentResponse = serde_json::from_str(payload)?;
    if chunk.candidates.is_empty() && chunk.prompt_feedback.is_none() {
        return Ok(String::new());
    }
    chunk.text_lossy()
}

#[async_trait]
impl GenAiClient for GeminiClient {
    #[instrument(skip_all, fields(chars = menu_text.len()))]
    async fn extract_dishes(&self, menu_text: &str) -> Result<Vec<ExtractedDish>, GenAiError> {
        let request = GenerateContentRequest {
            contents: vec![Content::new(
                "user",
                vec![Part::text(EXTRACTION_PROMPT), Part::text(menu_text)],
            )],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(extraction_schema()),
                ..GenerationConfig::default()
            }),
        };
        let text = self
            .generate(&self.settings.text_model, &request)
            .await?
            .into_text()?;
        parse_extraction(&text)
    }

    #[instrument(skip_all, fields(attachments = request.attachments.len()))]
    async fn generate_image(&self, request: &ImageRequest) -> Result<InlineImage, GenAiError> {
        let mut parts = Vec::with_capacity(1 + request.attachments.len() * 2);
        for attachment in &request.attachments {
            parts.push(Part::text(format!("{}:", attachment.label)));
            parts.push(Part::image(&attachment.image));
        }
        parts.push(Part::text(request.prompt.clone()));

        let body = GenerateContentRequest {
            contents: vec![Content::new("user", parts)],
            system_instruction: None,
            generation_config: Some(Self::image_config(request)),
        };
        self.generate(&self.settings.image_model, &body)
            .await?
            .into_image()
    }

    #[instrument(skip_all)]
    async fn edit_image(
        &self,
        image: &InlineImage,
        instruction: &str,
    ) -> Result<InlineImage, GenAiError> {
        let body = GenerateContentRequest {
            contents: vec![Content::new(
                "user",
                vec![Part::image(image), Part::text(instruction)],
            )],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["IMAGE".to_string()]),
                ..GenerationConfig::default()
            }),
        };
        self.generate(&self.settings.image_model, &body)
            .await?
            .into_image()
    }

    #[instrument(skip_all)]
    async fn analyze_image(
        &self,
        image: &InlineImage,
        prompt: &str,
    ) -> Result<String, GenAiError> {
        let body = GenerateContentRequest {
            contents: vec![Content::new(
                "user",
                vec![Part::image(image), Part::text(prompt)],
            )],
            system_instruction: None,
            generation_config: None,
        };
        self.generate(&self.settings.text_model, &body)
            .await?
            .into_text()
    }

    #[instrument(skip_all, fields(history = history.len()))]
    async fn stream_chat(
        &self,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<TokenStream, GenAiError> {
        let body = GenerateContentRequest {
            contents: chat_contents(history, message),
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(self.settings.assistant_instruction.clone())],
            }),
            generation_config: None,
        };
        let response = self
            .post(
                &self.settings.text_model,
                "streamGenerateContent?alt=sse",
                &body,
            )
            .await?;

        let bytes = response.bytes_stream().boxed();
        let tokens = stream::unfold(
            (bytes, SseDecoder::new(), false),
            |(mut bytes, mut decoder, done)| async move {
                if done {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        let items: Vec<Result<String, GenAiError>> = decoder
                            .push(&chunk)
                            .iter()
                            .map(|payload| chunk_text(payload))
                            .collect();
                        Some((stream::iter(items), (bytes, decoder, false)))
                    }
                    Some(Err(e)) => Some((
                        stream::iter(vec![Err(GenAiError::from(e))]),
                        (bytes, decoder, true),
                    )),
                    None => {
                        let items: Vec<Result<String, GenAiError>> =
                            decoder.finish().iter().map(|p| chunk_text(p)).collect();
                        Some((stream::iter(items), (bytes, decoder, true)))
                    }
                }
            },
        )
        .flatten()
        .filter(|item| {
            let keep = !matches!(item, Ok(text) if text.is_empty());
            async move { keep }
        });

        Ok(tokens.boxed())
    }

    #[instrument(skip_all, fields(chars = text.len()))]
    async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>, GenAiError> {
        let body = GenerateContentRequest {
            contents: vec![Content::new("user", vec![Part::text(text)])],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig::voice(&self.settings.voice)),
                ..GenerationConfig::default()
            }),
        };
        self.generate(&self.settings.tts_model, &body)
            .await?
            .into_audio()
    }

    #[instrument(skip_all, fields(bytes = wav.len()))]
    async fn transcribe_audio(&self, wav: &[u8]) -> Result<String, GenAiError> {
        let body = GenerateContentRequest {
            contents: vec![Content::new(
                "user",
                vec![Part::inline("audio/wav", wav), Part::text(TRANSCRIPTION_PROMPT)],
            )],
            system_instruction: None,
            generation_config: None,
        };
        self.generate(&self.settings.text_model, &body)
            .await?
            .into_text()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_extraction_drops_blank_names() {
        let text = r#"{"dishes":[
            {"name":" Pizza Diavola ","description":"Spicy salami, mozzarella"},
            {"name":"","description":"orphan"},
            {"name":"Tiramisu"}
        ]}"#;
        let dishes = parse_extraction(text).unwrap();
        assert_eq!(dishes.len(), 2);
        assert_eq!(dishes[0].name, "Pizza Diavola");
        assert_eq!(dishes[1].description, "");
    }

    #[test]
    fn test_parse_extraction_accepts_fenced_json() {
        let text = "```json\n{\"dishes\":[{\"name\":\"Soup\",\"description\":\"\"}]}\n```";
        assert_eq!(parse_extraction(text).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_extraction_rejects_garbage() {
        assert!(matches!(
            parse_extraction("not json"),
            Err(GenAiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_error_from_body_reads_api_status() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(error_from_body(429, body), GenAiError::Quota(_)));

        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            error_from_body(400, body),
            GenAiError::Api { status: 400, message } if message == "API key not valid"
        ));

        assert!(matches!(
            error_from_body(502, "<html>bad gateway</html>"),
            GenAiError::Api { status: 502, .. }
        ));
    }

    #[test]
    fn test_chunk_text() {
        let payload = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Bon"}]}}]}"#;
        assert_eq!(chunk_text(payload).unwrap(), "Bon");
        assert_eq!(chunk_text(r#"{"usageMetadata":{}}"#).unwrap(), "");
    }

    #[test]
    fn test_chat_contents_appends_message() {
        let history = vec![ChatTurn::user("hi"), ChatTurn::model("hello")];
        let contents = chat_contents(&history, "describe my risotto");
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1].role.as_deref(), Some("model"));
        assert_eq!(
            contents[2].parts[0].text.as_deref(),
            Some("describe my risotto")
        );
    }

    #[test]
    fn test_endpoint_format() {
        let client = GeminiClient::new(GenAiSettings::default(), "key").unwrap();
        assert_eq!(
            client.endpoint("gemini-2.5-flash", "generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
