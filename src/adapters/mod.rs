//! Adapter interfaces for external systems.
//!
//! Lesson-plan generation is an opaque remote call: template file plus a
//! structured request in, an HTML fragment out.

pub mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::library::BinaryFile;

pub use gemini::GeminiGenerator;

/// Errors from a generation backend
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Invalid lesson request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    UnsupportedTemplate(String),

    #[error("Unauthorized: check GEMINI_API_KEY")]
    Unauthorized,

    #[error("Rate limited by the model provider; try again shortly")]
    RateLimited,

    #[error("Model API error: {0}")]
    Api(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No content generated.")]
    EmptyResponse,
}

/// What the lesson plan should cover
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonRequest {
    pub topic: String,
    pub grade_level: String,
    pub subject: String,

    /// Unit or module, also used for the export file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// URLs or free text to draw from
    #[serde(default)]
    pub resources: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_instructions: Option<String>,
}

impl LessonRequest {
    pub fn new(
        topic: impl Into<String>,
        grade_level: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            grade_level: grade_level.into(),
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_resources(mut self, resources: impl Into<String>) -> Self {
        self.resources = resources.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.additional_instructions = Some(instructions.into());
        self
    }

    /// Topic, grade level and subject are required
    pub fn validate(&self) -> Result<(), GenerationError> {
        for (field, value) in [
            ("topic", &self.topic),
            ("grade level", &self.grade_level),
            ("subject", &self.subject),
        ] {
            if value.trim().is_empty() {
                return Err(GenerationError::InvalidRequest(format!("{} is required", field)));
            }
        }
        Ok(())
    }
}

/// Trait for lesson-plan generators
#[async_trait]
pub trait LessonGenerator: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Produce an HTML fragment (no `<html>`/`<body>` wrapper)
    async fn generate(
        &self,
        template: &BinaryFile,
        request: &LessonRequest,
    ) -> Result<String, GenerationError>;
}
