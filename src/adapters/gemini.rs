//! Google Gemini lesson-plan generator.
//!
//! Sends the template (inline text or base64 data) followed by the
//! instruction prompt to `generateContent`, with Google Search grounding
//! enabled, and returns the text of the first candidate.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use super::{GenerationError, LessonGenerator, LessonRequest};
use crate::config::GeminiSettings;
use crate::library::codec::{media_type_for, DEFAULT_MEDIA_TYPE};
use crate::library::BinaryFile;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini-backed generator
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            client,
            api_key,
            base_url,
            model,
        }
    }

    /// Build from resolved settings; fails when no API key is configured
    pub fn from_settings(settings: &GeminiSettings) -> Result<Self, GenerationError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(GenerationError::Unauthorized)?;

        Ok(Self::new(
            api_key,
            settings.base_url.clone(),
            settings.model.clone(),
            Duration::from_secs(settings.timeout_seconds),
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The key travels in a header so it never appears in URLs or errors
    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// JSON body for `generateContent`
    pub fn build_request_body(
        template: &BinaryFile,
        request: &LessonRequest,
    ) -> Result<Value, GenerationError> {
        let template_part = template_part(template)?;

        Ok(json!({
            "contents": [{
                "role": "user",
                "parts": [template_part, {"text": build_prompt(request)}]
            }],
            "tools": [{"google_search": {}}]
        }))
    }

    /// Concatenated text of the first candidate
    pub fn parse_response(body: &Value) -> Result<String, GenerationError> {
        let Some(candidate) = body
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
        else {
            if let Some(reason) = body
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
            {
                return Err(GenerationError::Api(format!("request blocked: {}", reason)));
            }
            return Err(GenerationError::EmptyResponse);
        };

        let parts = candidate
            .pointer("/content/parts")
            .and_then(|p| p.as_array())
            .ok_or(GenerationError::EmptyResponse)?;

        let text: String = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .collect();

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        Ok(text)
    }
}

/// Turn the template into a request part based on its extension
pub fn template_part(template: &BinaryFile) -> Result<Value, GenerationError> {
    let ext = template.extension().unwrap_or_default();

    match ext.as_str() {
        "docx" => Err(GenerationError::UnsupportedTemplate(
            "Word (.docx) templates cannot be read directly. Please try converting it to PDF."
                .to_string(),
        )),
        "txt" | "html" | "htm" => {
            let text = String::from_utf8_lossy(&template.bytes);
            Ok(json!({
                "text": format!("[TEMPLATE CONTENT ({})]\n{}", ext.to_uppercase(), text)
            }))
        }
        _ => {
            let mime_type = if template.media_type.is_empty()
                || template.media_type == DEFAULT_MEDIA_TYPE
            {
                media_type_for(&template.name).unwrap_or("application/pdf")
            } else {
                template.media_type.as_str()
            };

            Ok(json!({
                "inlineData": {
                    "mimeType": mime_type,
                    "data": STANDARD.encode(&template.bytes),
                }
            }))
        }
    }
}

/// Instruction prompt sent after the template part
pub fn build_prompt(request: &LessonRequest) -> String {
    let unit = request
        .unit
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or("N/A");
    let instructions = request
        .additional_instructions
        .as_deref()
        .filter(|i| !i.trim().is_empty())
        .unwrap_or("None");

    format!(
        "You are an expert curriculum developer and teacher.

TASK:
Write a complete lesson plan by filling out the lesson plan template provided above.

DETAILS:
- Subject: {subject}
- Unit/Module: {unit}
- Lesson Topic: {topic}
- Grade Level: {grade}
- Resources to Use: {resources}
- Additional Instructions: {instructions}

INSTRUCTIONS:
1. Study the template's structure: its tables, headings and sections.
2. Reproduce that structure exactly. Where the template has a table, output an HTML <table>.
3. Fill every section with strong, classroom-ready content drawn from the topic and resources.
4. Output HTML only:
   - No Markdown.
   - Use <h2> and <h3> for headings.
   - Use <table border=\"1\" cellspacing=\"0\" cellpadding=\"5\"> for tables.
   - Use <ul>/<ol> for lists.
   - Do not include <html>, <head> or <body> tags.
5. Skip any introduction; begin directly with the lesson plan.",
        subject = request.subject,
        unit = unit,
        topic = request.topic,
        grade = request.grade_level,
        resources = request.resources,
        instructions = instructions,
    )
}

#[async_trait]
impl LessonGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        template: &BinaryFile,
        request: &LessonRequest,
    ) -> Result<String, GenerationError> {
        request.validate()?;
        let body = Self::build_request_body(template, request)?;

        tracing::info!(model = %self.model, template = %template.name, "Requesting lesson plan");

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.without_url().to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::RateLimited);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(GenerationError::Unauthorized);
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Gemini API error");
            return Err(GenerationError::Api(format!("{}: {}", status, error_body)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.without_url().to_string()))?;

        let html = Self::parse_response(&body)?;
        tracing::debug!(bytes = html.len(), "Received lesson plan");
        Ok(html)
    }
}
