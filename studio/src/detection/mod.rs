mod client;
mod openai;

pub use client::{ElementDetectionClient, complete_suggestions};
pub use openai::OpenAiVisionService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::upload::ImageError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Invalid image: {0}")]
    InvalidImage(#[from] ImageError),
    #[error("Vision request failed: {0}")]
    Request(String),
    #[error("Vision service returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Could not parse vision response: {0}")]
    Unparseable(String),
    #[error("No furniture or decor was detected in the image")]
    NothingDetected,
    #[error("Vision service is not configured: {0}")]
    NotConfigured(String),
}

impl AnalysisError {
    /// Message shown in the upload panel.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::InvalidImage(e) => e.to_string(),
            AnalysisError::NothingDetected => self.to_string(),
            _ => "Failed to analyze image. Please try again with another photo.".to_string(),
        }
    }
}

/// Query lists as returned by the generator, before normalisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSuggestions {
    #[serde(default, alias = "amazonQueries")]
    pub amazon: Vec<String>,
    #[serde(default, alias = "etsyQueries")]
    pub etsy: Vec<String>,
}

/// The generative image-analysis backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisionService: Send + Sync {
    async fn detect_elements(&self, image: &[u8], mime_type: &str) -> Result<Vec<String>, AnalysisError>;

    async fn suggest_queries(&self, element: &str) -> Result<RawSuggestions, AnalysisError>;
}

#[async_trait]
impl<T: VisionService + ?Sized> VisionService for std::sync::Arc<T> {
    async fn detect_elements(&self, image: &[u8], mime_type: &str) -> Result<Vec<String>, AnalysisError> {
        (**self).detect_elements(image, mime_type).await
    }

    async fn suggest_queries(&self, element: &str) -> Result<RawSuggestions, AnalysisError> {
        (**self).suggest_queries(element).await
    }
}
