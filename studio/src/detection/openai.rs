use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

use super::{AnalysisError, RawSuggestions, VisionService};
use crate::config::VisionConfig;

const DETECT_PROMPT: &str = "You are an interior design assistant. List every distinct piece of \
furniture or decor visible in this room photo. Reply with a JSON array of short English names \
(for example [\"Sofa\", \"Floor Lamp\"]) and nothing else.";

const SUGGEST_PROMPT: &str = "Suggest shopping search phrases for the furniture item below. \
Reply with a JSON object {\"amazon\": [two phrases], \"etsy\": [two phrases]} ordered by \
relevance, Etsy phrases leaning towards handmade or vintage. Item: ";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// `VisionService` backed by an OpenAI-compatible chat completions API.
#[derive(Clone)]
pub struct OpenAiVisionService {
    http_client: HttpClient,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiVisionService {
    pub fn new(config: &VisionConfig) -> Result<Self, AnalysisError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AnalysisError::NotConfigured("VISION_API_KEY is missing".into()))?;

        let http_client = HttpClient::builder()
            .timeout(config.timeout)
            .user_agent(concat!("studio/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AnalysisError::Request(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/chat/completions", config.base_url.as_str().trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
        })
    }

    async fn complete(&self, content: serde_json::Value) -> Result<String, AnalysisError> {
        let body = json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [{ "role": "user", "content": content }],
        });

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                log::error!("Vision request to {} failed: {}", self.endpoint, e);
                AnalysisError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Vision service returned {}: {}", status, body);
            return Err(AnalysisError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Unparseable(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AnalysisError::Unparseable("response has no message content".into()))
    }
}

#[async_trait]
impl VisionService for OpenAiVisionService {
    async fn detect_elements(&self, image: &[u8], mime_type: &str) -> Result<Vec<String>, AnalysisError> {
        let data_url = format!("data:{};base64,{}", mime_type, STANDARD.encode(image));
        let content = json!([
            { "type": "text", "text": DETECT_PROMPT },
            { "type": "image_url", "image_url": { "url": data_url } },
        ]);
        let text = self.complete(content).await?;
        parse_element_list(&text)
    }

    async fn suggest_queries(&self, element: &str) -> Result<RawSuggestions, AnalysisError> {
        let content = json!(format!("{}{}", SUGGEST_PROMPT, element));
        let text = self.complete(content).await?;
        parse_suggestions(&text)
    }
}

/// Strips markdown fences and anything outside the outermost `open`/`close` pair.
fn extract_json(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

pub(crate) fn parse_element_list(text: &str) -> Result<Vec<String>, AnalysisError> {
    let json = extract_json(text, '[', ']')
        .ok_or_else(|| AnalysisError::Unparseable(format!("no JSON array in: {}", text)))?;
    serde_json::from_str::<Vec<String>>(json).map_err(|e| AnalysisError::Unparseable(e.to_string()))
}

pub(crate) fn parse_suggestions(text: &str) -> Result<RawSuggestions, AnalysisError> {
    let json = extract_json(text, '{', '}')
        .ok_or_else(|| AnalysisError::Unparseable(format!("no JSON object in: {}", text)))?;
    serde_json::from_str::<RawSuggestions>(json).map_err(|e| AnalysisError::Unparseable(e.to_string()))
}
