use std::time::Duration;

use super::types::{
    ApiErrorEnvelope, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    InlineData, InlineImage, Part, VisionClient,
};
use super::VisionError;

/// Replies are a single medicine name; a short cap keeps the model from rambling.
const MAX_OUTPUT_TOKENS: u32 = 64;

/// Size of the image behind a padded base64 payload.
fn decoded_len(data: &str) -> usize {
    let padding = data.bytes().rev().take_while(|&b| b == b'=').count();
    (data.len() / 4 * 3).saturating_sub(padding)
}

fn check_inline_size(image: &InlineImage) -> Result<(), VisionError> {
    let size = decoded_len(&image.data);
    if size > super::MAX_INLINE_IMAGE_BYTES {
        return Err(VisionError::ImageTooLarge(size));
    }
    Ok(())
}

/// Gemini REST client for multimodal `generateContent` calls.
pub struct GeminiClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    /// Create a client. A missing key is not an error here: calls fail with
    /// `MissingApiKey` without touching the network.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, VisionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| VisionError::Network(format!("HTTP client init failed: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            timeout_secs,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

impl VisionClient for GeminiClient {
    fn generate_with_image(
        &self,
        model: &str,
        prompt: &str,
        image: &InlineImage,
    ) -> Result<String, VisionError> {
        let api_key = self.api_key.as_deref().ok_or(VisionError::MissingApiKey)?;

        check_inline_size(image)?;

        let body = build_request(prompt, image);

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    VisionError::Timeout(self.timeout_secs)
                } else {
                    VisionError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| VisionError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &text));
        }

        parse_reply(&text)
    }
}

/// Build the request: instruction text first, then the image, temperature 0.
pub fn build_request(prompt: &str, image: &InlineImage) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![
                Part {
                    text: Some(prompt.to_string()),
                    inline_data: None,
                },
                Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: image.mime_type.clone(),
                        data: image.data.clone(),
                    }),
                },
            ],
        }],
        generation_config: Some(GenerationConfig {
            temperature: 0.0,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        }),
    }
}

/// Map a non-2xx response to a failure kind.
///
/// Gemini answers an invalid key with HTTP 400 `INVALID_ARGUMENT`, so the
/// message is inspected as well as the status.
pub fn classify_error(status: u16, body: &str) -> VisionError {
    let (message, api_status) = match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.trim().to_string(), String::new()),
    };

    match status {
        401 | 403 => VisionError::Auth { status, message },
        429 => VisionError::Quota(message),
        400 if message.contains("API key") || api_status == "UNAUTHENTICATED" => {
            VisionError::Auth { status, message }
        }
        _ if api_status == "RESOURCE_EXHAUSTED" => VisionError::Quota(message),
        _ => VisionError::ApiError { status, message },
    }
}

/// Concatenate the text parts of the first candidate.
pub fn parse_reply(body: &str) -> Result<String, VisionError> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| VisionError::ResponseParsing(e.to_string()))?;

    let candidate = match parsed.candidates.into_iter().next() {
        Some(c) => c,
        None => {
            let reason = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "none given".to_string());
            return Err(VisionError::ResponseParsing(format!(
                "no candidates in response (block reason: {reason})"
            )));
        }
    };

    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    if text.is_empty() {
        tracing::debug!(finish_reason = ?candidate.finish_reason, "Vision reply has no text parts");
    }

    Ok(text)
}

/// Mock vision client for testing. Returns a configurable reply or error.
pub struct MockVisionClient {
    reply: Result<String, VisionError>,
}

impl MockVisionClient {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
        }
    }

    pub fn failing(error: VisionError) -> Self {
        Self { reply: Err(error) }
    }
}

impl VisionClient for MockVisionClient {
    fn generate_with_image(
        &self,
        _model: &str,
        _prompt: &str,
        _image: &InlineImage,
    ) -> Result<String, VisionError> {
        self.reply.clone()
    }
}
