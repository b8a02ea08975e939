use serde::{Deserialize, Serialize};

use crate::Marketplace;

/// Search phrases for one element, two per marketplace, ranked by relevance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySuggestions {
    pub amazon_queries: [String; 2],
    pub etsy_queries: [String; 2],
}

impl QuerySuggestions {
    pub fn for_marketplace(&self, marketplace: Marketplace) -> &[String; 2] {
        match marketplace {
            Marketplace::Amazon => &self.amazon_queries,
            Marketplace::Etsy => &self.etsy_queries,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementStatus {
    #[default]
    Idle,
    Searching,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedElement {
    pub name: String,
    #[serde(flatten)]
    pub suggestions: QuerySuggestions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_amazon_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_etsy_query: Option<String>,
    #[serde(default)]
    pub status: ElementStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl DetectedElement {
    pub fn new(name: impl Into<String>, suggestions: QuerySuggestions) -> Self {
        Self {
            name: name.into(),
            suggestions,
            selected_amazon_query: None,
            selected_etsy_query: None,
            status: ElementStatus::Idle,
            error_message: None,
        }
    }

    pub fn queries(&self, marketplace: Marketplace) -> &[String; 2] {
        self.suggestions.for_marketplace(marketplace)
    }

    pub fn selected(&self, marketplace: Marketplace) -> Option<&str> {
        match marketplace {
            Marketplace::Amazon => self.selected_amazon_query.as_deref(),
            Marketplace::Etsy => self.selected_etsy_query.as_deref(),
        }
    }

    /// Replaces whatever was selected for `marketplace`; one slot per marketplace.
    pub fn set_selected(&mut self, marketplace: Marketplace, query: Option<String>) {
        let slot = match marketplace {
            Marketplace::Amazon => &mut self.selected_amazon_query,
            Marketplace::Etsy => &mut self.selected_etsy_query,
        };
        *slot = query.filter(|q| !q.trim().is_empty());
    }

    pub fn has_selection(&self) -> bool {
        self.selected_amazon_query.is_some() || self.selected_etsy_query.is_some()
    }

    pub fn set_status(&mut self, status: ElementStatus) {
        self.status = status;
        if status != ElementStatus::Error {
            self.error_message = None;
        }
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.status = ElementStatus::Error;
        self.error_message = Some(message.into());
    }
}

/// One entry of a project-creation payload. `index` is the element's
/// position in the analysis, names may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSearch {
    pub index: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amazon_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etsy_query: Option<String>,
}

impl ElementSearch {
    pub fn query(&self, marketplace: Marketplace) -> Option<&str> {
        match marketplace {
            Marketplace::Amazon => self.amazon_query.as_deref(),
            Marketplace::Etsy => self.etsy_query.as_deref(),
        }
    }
}
