//! Glue between the upload workflow, the project list and the backend.
//!
//! All local state sits behind one mutex so every transition is applied as
//! a unit. The lock is never held across a backend call.

use chrono::Utc;
use serde::Serialize;
use shared::{Limit, Marketplace, Product, Project, ProjectId, ProjectMeta, ProjectPatch};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::config::StudioConfig;
use crate::detection::{ElementDetectionClient, VisionService};
use crate::persistence::{ProjectService, ServiceError};
use crate::quota::{self, SubscriptionSnapshot};
use crate::store::ProjectStore;
use crate::upload::{
    ImageFile, PreviewBackend, SelectionChange, SelectionError, UploadSnapshot, UploadStatus, UploadTicket,
    UploadWorkflow,
};

const UNTITLED_PROJECT: &str = "Untitled project";

/// Who is acting. Authentication itself happens elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    user_id: Option<String>,
}

impl AuthContext {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

/// Preconditions that stop a creation attempt before anything changes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CreationError {
    #[error("You must be signed in to create a project")]
    NotAuthenticated,
    #[error("A project is already being created")]
    AlreadyInFlight,
    #[error("Upload and analyze a photo first")]
    NoUpload,
    #[error("Select at least one search query")]
    NothingSelected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreationOutcome {
    Created { project: Project, products: Vec<Product> },
    /// The caller should offer an upgrade.
    QuotaExceeded { limit: Limit },
    /// Rolled back. The upload is kept so the selection can be retried.
    Failed { message: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectError {
    #[error("Project not found: {0}")]
    NotFound(ProjectId),
    #[error("Project {0} is still being created")]
    Temporary(ProjectId),
    #[error("Project name cannot be empty")]
    EmptyName,
    #[error(transparent)]
    Service(#[from] ServiceError),
}

struct WorkspaceState {
    projects: ProjectStore,
    upload: UploadWorkflow,
}

/// Clears the in-flight flag when the attempt ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Undoes the optimistic insert when a creation attempt is dropped before
/// the backend answers, for example by a caller-side timeout.
struct PendingCreation<'a> {
    state: &'a Mutex<WorkspaceState>,
    temp_id: ProjectId,
    ticket: UploadTicket,
    participating: Vec<usize>,
    armed: bool,
}

impl PendingCreation<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingCreation<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        log::warn!("Creation of {} abandoned, rolling back", self.temp_id);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.projects.rollback(&self.temp_id);
        if state.upload.ticket() == self.ticket {
            state.upload.mark_idle(&self.participating);
        }
    }
}

pub struct Studio<V, P> {
    detection: ElementDetectionClient<V>,
    service: P,
    state: Mutex<WorkspaceState>,
    creating: AtomicBool,
    max_upload_bytes: usize,
}

impl<V: VisionService, P: ProjectService> Studio<V, P> {
    pub fn new(config: &StudioConfig, vision: V, service: P, previews: Arc<dyn PreviewBackend>) -> Self {
        Self {
            detection: ElementDetectionClient::new(vision),
            service,
            state: Mutex::new(WorkspaceState {
                projects: ProjectStore::new(),
                upload: UploadWorkflow::new(previews),
            }),
            creating: AtomicBool::new(false),
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorkspaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn projects(&self) -> Vec<Project> {
        self.lock().projects.projects().to_vec()
    }

    pub fn upload_snapshot(&self) -> UploadSnapshot {
        self.lock().upload.snapshot()
    }

    pub fn is_creating(&self) -> bool {
        self.creating.load(Ordering::Acquire)
    }

    pub fn can_create_project(&self, subscription: &SubscriptionSnapshot) -> bool {
        quota::can_create_project(self.lock().projects.committed_count(), &subscription.limits)
    }

    /// Validates, previews and analyzes a photo. Replaces any earlier upload.
    /// The type sniffed from the content wins over the declared one.
    pub async fn upload(&self, file: ImageFile) -> UploadStatus {
        let file = match file.validate(self.max_upload_bytes) {
            Ok(mime_type) => file.with_mime_type(mime_type),
            Err(e) => {
                let mut state = self.lock();
                state.upload.reject(e.to_string());
                return state.upload.status();
            }
        };

        let ticket = {
            let mut state = self.lock();
            let ticket = state.upload.begin(file.clone());
            state.upload.preview_ready(ticket);
            ticket
        };

        let result = self.detection.analyze(&file).await;

        let mut state = self.lock();
        match result {
            Ok(elements) => {
                state.upload.complete(ticket, elements);
            }
            Err(e) => {
                log::warn!("Analysis of {} failed: {}", file.name(), e);
                state.upload.fail(ticket, e.user_message());
            }
        }
        state.upload.status()
    }

    pub fn clear_upload(&self) {
        self.lock().upload.clear();
    }

    pub fn toggle_element(&self, index: usize) -> bool {
        self.lock().upload.toggle_expanded(index)
    }

    pub fn collapse_element(&self, index: usize) {
        self.lock().upload.collapse(index);
    }

    pub fn select_query(
        &self,
        index: usize,
        marketplace: Marketplace,
        query: &str,
        subscription: &SubscriptionSnapshot,
    ) -> Result<SelectionChange, SelectionError> {
        self.lock()
            .upload
            .select_query(index, marketplace, query, subscription.available_marketplaces())
    }

    pub fn select_all(&self, subscription: &SubscriptionSnapshot) -> usize {
        self.lock().upload.select_all(subscription.available_marketplaces())
    }

    pub fn clear_selections(&self) {
        self.lock().upload.clear_selections();
    }

    /// Creates a project from the current selection.
    ///
    /// A temporary project is shown immediately and replaced by the persisted
    /// one on success. On failure it is removed again, the elements that took
    /// part are flagged, and the upload stays put for a retry.
    pub async fn create_project(
        &self,
        auth: &AuthContext,
        subscription: &SubscriptionSnapshot,
        name: Option<&str>,
    ) -> Result<CreationOutcome, CreationError> {
        let user_id = auth.user_id().ok_or(CreationError::NotAuthenticated)?.to_string();
        let _guard = InFlightGuard::acquire(&self.creating).ok_or(CreationError::AlreadyInFlight)?;

        let (temp_id, ticket, participating, meta, image, searches) = {
            let mut state = self.lock();
            if state.upload.status() != UploadStatus::Complete {
                return Err(CreationError::NoUpload);
            }

            let current = state.projects.committed_count();
            if !quota::can_create_project(current, &subscription.limits) {
                log::info!(
                    "Project limit reached for tier {} ({} of {:?})",
                    subscription.tier,
                    current,
                    subscription.limits.projects
                );
                return Ok(CreationOutcome::QuotaExceeded {
                    limit: subscription.limits.projects,
                });
            }

            let searches = state.upload.selected_searches(subscription.available_marketplaces());
            if searches.is_empty() {
                return Err(CreationError::NothingSelected);
            }
            let image = state.upload.file().cloned().ok_or(CreationError::NoUpload)?;
            let name = resolve_name(name, &image);

            let temp = Project::temporary(name.clone(), Utc::now());
            let temp_id = temp.id.clone();
            state.projects.insert_optimistic(temp);

            let participating: Vec<usize> = searches.iter().map(|s| s.index).collect();
            state.upload.mark_searching(&participating);

            (
                temp_id,
                state.upload.ticket(),
                participating,
                ProjectMeta { name, user_id },
                image,
                searches,
            )
        };

        let mut pending = PendingCreation {
            state: &self.state,
            temp_id,
            ticket,
            participating,
            armed: true,
        };

        log::info!("Creating project with {} elements", searches.len());
        let result = self.service.create_project_with_search(meta, image, searches).await;
        pending.disarm();

        let mut state = self.lock();
        let same_upload = state.upload.ticket() == pending.ticket;
        match result {
            Ok(created) => {
                state.projects.commit(&pending.temp_id, created.project.clone());
                if same_upload {
                    state.upload.clear();
                }
                log::info!("Project {} created", created.project.id);
                Ok(CreationOutcome::Created {
                    project: created.project,
                    products: created.products,
                })
            }
            Err(e) => {
                let message = e.to_string();
                log::error!("Project creation failed: {}", message);
                state.projects.rollback(&pending.temp_id);
                if same_upload {
                    let participating = &pending.participating;
                    match e {
                        ServiceError::Search {
                            element_index: Some(index),
                            ..
                        } if participating.contains(&index) => {
                            let others: Vec<usize> =
                                participating.iter().copied().filter(|&i| i != index).collect();
                            state.upload.mark_failed(&[index], &message);
                            state.upload.mark_idle(&others);
                        }
                        _ => state.upload.mark_failed(participating, &message),
                    }
                }
                Ok(CreationOutcome::Failed { message })
            }
        }
    }

    /// Replaces the project list with the backend's. Temporary entries stay.
    pub async fn refresh_projects(&self) -> Result<usize, ProjectError> {
        let projects = self.service.list_projects().await?;
        let count = projects.len();
        self.lock().projects.replace_all(projects);
        log::debug!("Loaded {} projects", count);
        Ok(count)
    }

    /// Renames on the backend first; the local list changes only on success.
    pub async fn rename_project(&self, id: &ProjectId, name: &str) -> Result<Project, ProjectError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProjectError::EmptyName);
        }
        self.ensure_persisted(id)?;

        let patch = ProjectPatch {
            name: Some(name.to_string()),
            status: None,
        };
        let project = self.service.update_project(id, patch).await?;
        self.lock().projects.apply_update(project.clone());
        Ok(project)
    }

    /// Deletes on the backend first. Temporary projects only exist locally
    /// and are dropped without a backend call.
    pub async fn delete_project(&self, id: &ProjectId) -> Result<(), ProjectError> {
        {
            let mut state = self.lock();
            let project = state.projects.get(id).ok_or_else(|| ProjectError::NotFound(id.clone()))?;
            if project.is_temporary {
                state.projects.apply_remove(id);
                return Ok(());
            }
        }

        self.service.delete_project(id).await?;
        self.lock().projects.apply_remove(id);
        log::info!("Project {} deleted", id);
        Ok(())
    }

    fn ensure_persisted(&self, id: &ProjectId) -> Result<(), ProjectError> {
        let state = self.lock();
        match state.projects.get(id) {
            None => Err(ProjectError::NotFound(id.clone())),
            Some(project) if project.is_temporary => Err(ProjectError::Temporary(id.clone())),
            Some(_) => Ok(()),
        }
    }
}

fn resolve_name(requested: Option<&str>, image: &ImageFile) -> String {
    requested
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| image.stem())
        .unwrap_or(UNTITLED_PROJECT)
        .to_string()
}
