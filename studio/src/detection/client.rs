use futures::future::join_all;
use shared::{DetectedElement, QuerySuggestions};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{AnalysisError, RawSuggestions, VisionService};
use crate::upload::ImageFile;

const AMAZON_STYLES: [&str; 3] = ["modern", "minimalist", "contemporary"];
const ETSY_STYLES: [&str; 3] = ["handmade", "vintage", "boho"];

/// Normalises vision output: element names, and exactly two non-empty
/// queries per marketplace for every element.
pub struct ElementDetectionClient<V> {
    service: V,
    cache: Mutex<HashMap<String, QuerySuggestions>>,
}

impl<V: VisionService> ElementDetectionClient<V> {
    pub fn new(service: V) -> Self {
        Self {
            service,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Drops suggestions memoised for the previous image.
    pub fn begin_session(&self) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub async fn detect_elements(&self, image: &ImageFile) -> Result<Vec<String>, AnalysisError> {
        log::info!("Detecting elements in {}", image.name());
        let names: Vec<String> = self
            .service
            .detect_elements(image.bytes(), image.mime_type())
            .await?
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        if names.is_empty() {
            return Err(AnalysisError::NothingDetected);
        }
        log::debug!("Detected elements: {:?}", names);
        Ok(names)
    }

    pub async fn suggest_queries(&self, name: &str) -> Result<QuerySuggestions, AnalysisError> {
        let key = name.trim();
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        if let Some(hit) = cached {
            log::debug!("Using memoised queries for {}", key);
            return Ok(hit);
        }

        let raw = self.service.suggest_queries(key).await?;
        let suggestions = complete_suggestions(key, raw);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), suggestions.clone());
        Ok(suggestions)
    }

    /// Detection followed by suggestions for each distinct name. Duplicate
    /// names stay as separate elements sharing the same suggestions.
    pub async fn analyze(&self, image: &ImageFile) -> Result<Vec<DetectedElement>, AnalysisError> {
        self.begin_session();
        let names = self.detect_elements(image).await?;

        let mut distinct: Vec<&str> = Vec::new();
        for name in &names {
            if !distinct.contains(&name.as_str()) {
                distinct.push(name);
            }
        }

        let results = join_all(distinct.iter().map(|name| self.suggest_queries(name))).await;
        let mut by_name = HashMap::with_capacity(distinct.len());
        for (name, result) in distinct.into_iter().zip(results) {
            by_name.insert(name, result?);
        }

        let elements = names
            .iter()
            .filter_map(|name| {
                by_name
                    .get(name.as_str())
                    .map(|suggestions| DetectedElement::new(name.clone(), suggestions.clone()))
            })
            .collect();
        Ok(elements)
    }
}

/// Trims, dedupes and pads generator output to exactly two queries per
/// marketplace. Padding phrases are `"<style> <element>"`.
pub fn complete_suggestions(name: &str, raw: RawSuggestions) -> QuerySuggestions {
    let subject = match name.trim() {
        "" => "furniture".to_string(),
        trimmed => trimmed.to_lowercase(),
    };
    QuerySuggestions {
        amazon_queries: pick_two(raw.amazon, &subject, &AMAZON_STYLES),
        etsy_queries: pick_two(raw.etsy, &subject, &ETSY_STYLES),
    }
}

fn pick_two(found: Vec<String>, subject: &str, styles: &[&str]) -> [String; 2] {
    let fallbacks = styles
        .iter()
        .map(|style| format!("{} {}", style, subject))
        .chain(std::iter::once(subject.to_string()));

    let mut picked: Vec<String> = Vec::with_capacity(2);
    for candidate in found.into_iter().chain(fallbacks) {
        let candidate = candidate.trim();
        if candidate.is_empty() || picked.iter().any(|p| p.eq_ignore_ascii_case(candidate)) {
            continue;
        }
        picked.push(candidate.to_string());
        if picked.len() == 2 {
            break;
        }
    }
    if picked.len() < 2 {
        log::warn!("Generator returned too few queries for {}", subject);
    }
    std::array::from_fn(|i| picked.get(i).cloned().unwrap_or_else(|| subject.to_string()))
}
