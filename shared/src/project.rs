use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::Marketplace;

const TEMP_PREFIX: &str = "temp-";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn temporary(at: DateTime<Utc>) -> Self {
        Self(format!("{}{}", TEMP_PREFIX, at.timestamp_millis()))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Analyzing,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub image_url: Option<String>,
    #[serde(default, rename = "isTemporary")]
    pub is_temporary: bool,
}

impl Project {
    /// Placeholder shown while the creation request is in flight.
    pub fn temporary(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: ProjectId::temporary(now),
            name: name.into(),
            status: ProjectStatus::Analyzing,
            created_at: now,
            image_url: None,
            is_temporary: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub project_id: ProjectId,
    pub marketplace: Marketplace,
    pub element_name: String,
    pub query: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub name: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
}
