//! Boundary to the project backend. The core never talks to storage
//! directly; everything goes through `ProjectService`.

mod memory;

pub use memory::InMemoryProjectService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{ElementSearch, Product, Project, ProjectId, ProjectMeta, ProjectPatch};
use thiserror::Error;

use crate::upload::ImageFile;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Project not found: {0}")]
    NotFound(ProjectId),
    /// A marketplace search failed. `element_index` points at the offending
    /// element when the backend can tell which one it was.
    #[error("Search failed for {element}: {message}")]
    Search {
        element_index: Option<usize>,
        element: String,
        message: String,
    },
    #[error("Project backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedProject {
    pub project: Project,
    pub products: Vec<Product>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectService: Send + Sync {
    /// Persists the project and image, then runs the marketplace searches.
    async fn create_project_with_search(
        &self,
        meta: ProjectMeta,
        image: ImageFile,
        elements: Vec<ElementSearch>,
    ) -> Result<CreatedProject, ServiceError>;

    async fn update_project(&self, id: &ProjectId, patch: ProjectPatch) -> Result<Project, ServiceError>;

    async fn delete_project(&self, id: &ProjectId) -> Result<(), ServiceError>;

    /// Newest first.
    async fn list_projects(&self) -> Result<Vec<Project>, ServiceError>;
}

#[async_trait]
impl<T: ProjectService + ?Sized> ProjectService for std::sync::Arc<T> {
    async fn create_project_with_search(
        &self,
        meta: ProjectMeta,
        image: ImageFile,
        elements: Vec<ElementSearch>,
    ) -> Result<CreatedProject, ServiceError> {
        (**self).create_project_with_search(meta, image, elements).await
    }

    async fn update_project(&self, id: &ProjectId, patch: ProjectPatch) -> Result<Project, ServiceError> {
        (**self).update_project(id, patch).await
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<(), ServiceError> {
        (**self).delete_project(id).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>, ServiceError> {
        (**self).list_projects().await
    }
}
