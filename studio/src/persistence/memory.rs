use async_trait::async_trait;
use chrono::Utc;
use shared::{
    ElementSearch, Marketplace, Product, Project, ProjectId, ProjectMeta, ProjectPatch, ProjectStatus,
};
use std::sync::{Mutex, PoisonError};
use strum::IntoEnumIterator;
use url::Url;
use uuid::Uuid;

use super::{CreatedProject, ProjectService, ServiceError};
use crate::upload::ImageFile;

struct StoredProject {
    project: Project,
    owner: String,
    image: ImageFile,
    products: Vec<Product>,
}

/// Process-local `ProjectService`. Searches are not executed; each selected
/// query becomes one product linking to the marketplace search page.
#[derive(Default)]
pub struct InMemoryProjectService {
    projects: Mutex<Vec<StoredProject>>,
}

impl InMemoryProjectService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn products_for(&self, id: &ProjectId) -> Vec<Product> {
        self.projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|stored| &stored.project.id == id)
            .map(|stored| stored.products.clone())
            .unwrap_or_default()
    }

    pub fn image_for(&self, id: &ProjectId) -> Option<ImageFile> {
        self.projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|stored| &stored.project.id == id)
            .map(|stored| stored.image.clone())
    }

    pub fn owner_of(&self, id: &ProjectId) -> Option<String> {
        self.projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|stored| &stored.project.id == id)
            .map(|stored| stored.owner.clone())
    }
}

pub(crate) fn search_url(marketplace: Marketplace, query: &str) -> Result<Url, url::ParseError> {
    match marketplace {
        Marketplace::Amazon => Url::parse_with_params("https://www.amazon.com/s", &[("k", query)]),
        Marketplace::Etsy => Url::parse_with_params("https://www.etsy.com/search", &[("q", query)]),
    }
}

fn build_products(project_id: &ProjectId, elements: &[ElementSearch]) -> Result<Vec<Product>, ServiceError> {
    let mut products = Vec::new();
    for element in elements {
        for marketplace in Marketplace::iter() {
            let Some(query) = element.query(marketplace) else {
                continue;
            };
            let url = search_url(marketplace, query).map_err(|e| ServiceError::Search {
                element_index: Some(element.index),
                element: element.name.clone(),
                message: e.to_string(),
            })?;
            products.push(Product {
                id: Uuid::new_v4().to_string(),
                project_id: project_id.clone(),
                marketplace,
                element_name: element.name.clone(),
                query: query.to_string(),
                title: format!("{} on {}", query, marketplace),
                url: url.to_string(),
                image_url: None,
                price: None,
            });
        }
    }
    Ok(products)
}

#[async_trait]
impl ProjectService for InMemoryProjectService {
    async fn create_project_with_search(
        &self,
        meta: ProjectMeta,
        image: ImageFile,
        elements: Vec<ElementSearch>,
    ) -> Result<CreatedProject, ServiceError> {
        if elements.is_empty() {
            return Err(ServiceError::Backend("No elements to search".into()));
        }

        let id = ProjectId::from(Uuid::new_v4().to_string());
        let products = build_products(&id, &elements)?;
        let project = Project {
            id: id.clone(),
            name: meta.name,
            status: ProjectStatus::Complete,
            created_at: Utc::now(),
            image_url: Some(format!("memory://projects/{}/{}", id, image.name())),
            is_temporary: false,
        };
        log::info!(
            "Stored project {} with {} products for {}",
            id,
            products.len(),
            meta.user_id
        );

        self.projects.lock().unwrap_or_else(PoisonError::into_inner).insert(
            0,
            StoredProject {
                project: project.clone(),
                owner: meta.user_id,
                image,
                products: products.clone(),
            },
        );
        Ok(CreatedProject { project, products })
    }

    async fn update_project(&self, id: &ProjectId, patch: ProjectPatch) -> Result<Project, ServiceError> {
        let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        let stored = projects
            .iter_mut()
            .find(|stored| &stored.project.id == id)
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        if let Some(name) = patch.name {
            stored.project.name = name;
        }
        if let Some(status) = patch.status {
            stored.project.status = status;
        }
        Ok(stored.project.clone())
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<(), ServiceError> {
        let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        let before = projects.len();
        projects.retain(|stored| &stored.project.id != id);
        if projects.len() == before {
            return Err(ServiceError::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, ServiceError> {
        Ok(self
            .projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|stored| stored.project.clone())
            .collect())
    }
}
