//! The single in-progress upload: file, preview, detected elements and the
//! per-element query selection.
//!
//! ```text
//! idle -> uploading -> analyzing -> complete
//!                          \-----> error
//! idle -> error            (file rejected before upload)
//! any  -> idle             (clear, releases the preview)
//! ```
//!
//! A new upload replaces the current one wholesale. Every upload gets a
//! generation number so results of a superseded analysis are dropped.

mod file;
mod preview;

pub use file::{ImageError, ImageFile};
pub use preview::{DataUrlPreviews, Preview, PreviewBackend};

#[cfg(test)]
pub(crate) use file::fixtures as image_fixtures;
#[cfg(test)]
pub(crate) use preview::fixtures as preview_fixtures;

use serde::Serialize;
use shared::{DetectedElement, ElementSearch, ElementStatus, Marketplace, MarketplaceSet};
use std::sync::Arc;
use strum::IntoEnumIterator;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Idle,
    Uploading,
    Analyzing,
    Complete,
    Error,
}

/// Identifies one upload; stale tickets are ignored by every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTicket(u64);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Queries can only be selected once analysis is complete")]
    NotReady,
    #[error("No detected element at position {0}")]
    UnknownElement(usize),
    #[error("{0} searches are not available on your plan")]
    MarketplaceUnavailable(Marketplace),
    #[error("\"{query}\" is not a suggested {marketplace} query")]
    UnknownQuery { marketplace: Marketplace, query: String },
}

/// Result of a query toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
    pub selected: Option<String>,
    /// Every available marketplace now has a query for this element. A UI
    /// may collapse the element shortly afterwards.
    pub pair_complete: bool,
}

/// Read-only copy of the workflow for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadSnapshot {
    pub status: UploadStatus,
    pub file_name: Option<String>,
    pub preview: Option<String>,
    pub detected_elements: Vec<DetectedElement>,
    pub expanded: Option<usize>,
    pub error: Option<String>,
}

pub struct UploadWorkflow {
    status: UploadStatus,
    file: Option<ImageFile>,
    preview: Option<Preview>,
    detected_elements: Vec<DetectedElement>,
    expanded: Option<usize>,
    error: Option<String>,
    generation: u64,
    previews: Arc<dyn PreviewBackend>,
}

impl UploadWorkflow {
    pub fn new(previews: Arc<dyn PreviewBackend>) -> Self {
        Self {
            status: UploadStatus::Idle,
            file: None,
            preview: None,
            detected_elements: Vec::new(),
            expanded: None,
            error: None,
            generation: 0,
            previews,
        }
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    pub fn file(&self) -> Option<&ImageFile> {
        self.file.as_ref()
    }

    pub fn preview(&self) -> Option<&str> {
        self.preview.as_ref().map(Preview::handle)
    }

    pub fn detected_elements(&self) -> &[DetectedElement] {
        &self.detected_elements
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn expanded(&self) -> Option<usize> {
        self.expanded
    }

    pub fn ticket(&self) -> UploadTicket {
        UploadTicket(self.generation)
    }

    pub fn snapshot(&self) -> UploadSnapshot {
        UploadSnapshot {
            status: self.status,
            file_name: self.file.as_ref().map(|f| f.name().to_string()),
            preview: self.preview().map(str::to_string),
            detected_elements: self.detected_elements.clone(),
            expanded: self.expanded,
            error: self.error.clone(),
        }
    }

    /// Starts a new upload, replacing whatever was there.
    pub fn begin(&mut self, file: ImageFile) -> UploadTicket {
        self.reset();
        log::info!("Upload started: {} ({} bytes)", file.name(), file.len());
        self.preview = Some(Preview::allocate(&self.previews, &file));
        self.file = Some(file);
        self.status = UploadStatus::Uploading;
        self.ticket()
    }

    /// The file was refused before any upload started.
    pub fn reject(&mut self, message: impl Into<String>) {
        self.reset();
        let message = message.into();
        log::warn!("Upload rejected: {}", message);
        self.error = Some(message);
        self.status = UploadStatus::Error;
    }

    pub fn preview_ready(&mut self, ticket: UploadTicket) -> bool {
        if !self.accepts(ticket, &[UploadStatus::Uploading]) {
            return false;
        }
        self.status = UploadStatus::Analyzing;
        true
    }

    pub fn complete(&mut self, ticket: UploadTicket, elements: Vec<DetectedElement>) -> bool {
        if !self.accepts(ticket, &[UploadStatus::Analyzing]) {
            return false;
        }
        log::info!("Analysis complete: {} elements detected", elements.len());
        self.detected_elements = elements;
        self.expanded = None;
        self.error = None;
        self.status = UploadStatus::Complete;
        true
    }

    pub fn fail(&mut self, ticket: UploadTicket, message: impl Into<String>) -> bool {
        if !self.accepts(ticket, &[UploadStatus::Uploading, UploadStatus::Analyzing]) {
            return false;
        }
        let message = message.into();
        log::error!("Analysis failed: {}", message);
        self.detected_elements.clear();
        self.expanded = None;
        self.error = Some(message);
        self.status = UploadStatus::Error;
        true
    }

    /// Back to idle from any state. Releases the preview.
    pub fn clear(&mut self) {
        self.reset();
        log::debug!("Upload cleared");
    }

    fn reset(&mut self) {
        if let Some(mut preview) = self.preview.take() {
            preview.release();
        }
        self.file = None;
        self.detected_elements.clear();
        self.expanded = None;
        self.error = None;
        self.status = UploadStatus::Idle;
        self.generation += 1;
    }

    fn accepts(&self, ticket: UploadTicket, from: &[UploadStatus]) -> bool {
        if ticket != self.ticket() {
            log::debug!("Ignoring result for superseded upload");
            return false;
        }
        if !from.contains(&self.status) {
            log::warn!("Ignoring transition from {:?}", self.status);
            return false;
        }
        true
    }

    /// Single-open accordion: opening one element closes the others.
    pub fn toggle_expanded(&mut self, index: usize) -> bool {
        if index >= self.detected_elements.len() {
            return false;
        }
        self.expanded = if self.expanded == Some(index) { None } else { Some(index) };
        true
    }

    pub fn collapse(&mut self, index: usize) {
        if self.expanded == Some(index) {
            self.expanded = None;
        }
    }

    /// Selecting the query that is already selected clears the slot.
    pub fn select_query(
        &mut self,
        index: usize,
        marketplace: Marketplace,
        query: &str,
        available: MarketplaceSet,
    ) -> Result<SelectionChange, SelectionError> {
        if self.status != UploadStatus::Complete {
            return Err(SelectionError::NotReady);
        }
        if !available.contains(marketplace) {
            return Err(SelectionError::MarketplaceUnavailable(marketplace));
        }
        let element = self
            .detected_elements
            .get_mut(index)
            .ok_or(SelectionError::UnknownElement(index))?;
        if !element.queries(marketplace).iter().any(|q| q == query) {
            return Err(SelectionError::UnknownQuery {
                marketplace,
                query: query.to_string(),
            });
        }

        let next = if element.selected(marketplace) == Some(query) {
            None
        } else {
            Some(query.to_string())
        };
        element.set_selected(marketplace, next.clone());

        let pair_complete = available.iter().all(|m| element.selected(m).is_some());
        Ok(SelectionChange {
            selected: next,
            pair_complete,
        })
    }

    /// Fills every empty slot with the top suggestion, for available
    /// marketplaces only. Returns how many slots were filled.
    pub fn select_all(&mut self, available: MarketplaceSet) -> usize {
        if self.status != UploadStatus::Complete {
            return 0;
        }
        let mut filled = 0;
        for element in &mut self.detected_elements {
            for marketplace in available.iter() {
                if element.selected(marketplace).is_none() {
                    let top = element.queries(marketplace)[0].clone();
                    element.set_selected(marketplace, Some(top));
                    filled += 1;
                }
            }
        }
        log::debug!("Select all filled {} slots", filled);
        filled
    }

    pub fn clear_selections(&mut self) {
        for element in &mut self.detected_elements {
            for marketplace in Marketplace::iter() {
                element.set_selected(marketplace, None);
            }
        }
    }

    /// Payload for project creation. Elements without a selection on an
    /// available marketplace are left out entirely.
    pub fn selected_searches(&self, available: MarketplaceSet) -> Vec<ElementSearch> {
        self.detected_elements
            .iter()
            .enumerate()
            .filter_map(|(index, element)| {
                let pick = |m: Marketplace| {
                    available
                        .contains(m)
                        .then(|| element.selected(m).map(str::to_string))
                        .flatten()
                };
                let amazon_query = pick(Marketplace::Amazon);
                let etsy_query = pick(Marketplace::Etsy);
                if amazon_query.is_none() && etsy_query.is_none() {
                    return None;
                }
                Some(ElementSearch {
                    index,
                    name: element.name.clone(),
                    amazon_query,
                    etsy_query,
                })
            })
            .collect()
    }

    pub fn mark_searching(&mut self, indices: &[usize]) {
        for &index in indices {
            if let Some(element) = self.detected_elements.get_mut(index) {
                element.set_status(ElementStatus::Searching);
            }
        }
    }

    pub fn mark_failed(&mut self, indices: &[usize], message: &str) {
        for &index in indices {
            if let Some(element) = self.detected_elements.get_mut(index) {
                element.set_error(message);
            }
        }
    }

    pub fn mark_idle(&mut self, indices: &[usize]) {
        for &index in indices {
            if let Some(element) = self.detected_elements.get_mut(index) {
                element.set_status(ElementStatus::Idle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::image_fixtures::png;
    use super::preview_fixtures::CountingPreviews;
    use super::*;
    use shared::QuerySuggestions;

    fn element(name: &str) -> DetectedElement {
        let lower = name.to_lowercase();
        DetectedElement::new(
            name,
            QuerySuggestions {
                amazon_queries: [format!("modern {}", lower), format!("{} set", lower)],
                etsy_queries: [format!("handmade {}", lower), format!("vintage {}", lower)],
            },
        )
    }

    fn workflow() -> (UploadWorkflow, Arc<CountingPreviews>) {
        let counting = Arc::new(CountingPreviews::default());
        (UploadWorkflow::new(counting.clone()), counting)
    }

    fn completed(names: &[&str]) -> (UploadWorkflow, Arc<CountingPreviews>) {
        let (mut wf, counting) = workflow();
        let ticket = wf.begin(png("room.png"));
        assert!(wf.preview_ready(ticket));
        assert!(wf.complete(ticket, names.iter().map(|n| element(n)).collect()));
        (wf, counting)
    }

    #[test]
    fn walks_the_happy_path() {
        let (mut wf, _) = workflow();
        assert_eq!(wf.status(), UploadStatus::Idle);
        assert!(wf.detected_elements().is_empty());

        let ticket = wf.begin(png("room.png"));
        assert_eq!(wf.status(), UploadStatus::Uploading);
        assert_eq!(wf.preview(), Some("blob:preview-1"));

        assert!(wf.preview_ready(ticket));
        assert_eq!(wf.status(), UploadStatus::Analyzing);

        assert!(wf.complete(ticket, vec![element("Sofa")]));
        assert_eq!(wf.status(), UploadStatus::Complete);
        assert_eq!(wf.detected_elements().len(), 1);
    }

    #[test]
    fn cannot_skip_analyzing() {
        let (mut wf, _) = workflow();
        let ticket = wf.begin(png("room.png"));
        assert!(!wf.complete(ticket, vec![element("Sofa")]));
        assert_eq!(wf.status(), UploadStatus::Uploading);
        assert!(wf.detected_elements().is_empty());
    }

    #[test]
    fn failure_empties_elements() {
        let (mut wf, _) = workflow();
        let ticket = wf.begin(png("room.png"));
        wf.preview_ready(ticket);
        assert!(wf.fail(ticket, "boom"));
        assert_eq!(wf.status(), UploadStatus::Error);
        assert_eq!(wf.error(), Some("boom"));
        assert!(wf.detected_elements().is_empty());
    }

    #[test]
    fn rejection_goes_straight_to_error() {
        let (mut wf, counting) = workflow();
        wf.reject("not an image");
        assert_eq!(wf.status(), UploadStatus::Error);
        assert!(wf.preview().is_none());
        assert!(counting.revoked().is_empty());
    }

    #[test]
    fn clear_releases_preview_once() {
        let (mut wf, counting) = completed(&["Sofa"]);
        wf.clear();
        wf.clear();
        assert_eq!(wf.status(), UploadStatus::Idle);
        assert!(wf.detected_elements().is_empty());
        assert!(wf.preview().is_none());
        assert_eq!(counting.revoked(), vec!["blob:preview-1".to_string()]);
    }

    #[test]
    fn new_upload_releases_previous_preview_and_ignores_stale_results() {
        let (mut wf, counting) = workflow();
        let first = wf.begin(png("a.png"));
        wf.preview_ready(first);
        let second = wf.begin(png("b.png"));
        assert_eq!(counting.revoked(), vec!["blob:preview-1".to_string()]);

        assert!(!wf.complete(first, vec![element("Lamp")]));
        assert!(!wf.fail(first, "late failure"));
        assert_eq!(wf.status(), UploadStatus::Uploading);
        assert_eq!(wf.preview(), Some("blob:preview-2"));
        assert_eq!(wf.ticket(), second);
    }

    #[test]
    fn accordion_keeps_one_open() {
        let (mut wf, _) = completed(&["Sofa", "Lamp", "Rug"]);
        assert!(wf.toggle_expanded(0));
        assert!(wf.toggle_expanded(2));
        assert_eq!(wf.expanded(), Some(2));
        assert!(wf.toggle_expanded(2));
        assert_eq!(wf.expanded(), None);
        wf.collapse(2);
        assert_eq!(wf.expanded(), None);
        assert!(!wf.toggle_expanded(9));
    }

    #[test]
    fn selection_is_single_choice_per_marketplace() {
        let (mut wf, _) = completed(&["Sofa"]);
        let all = MarketplaceSet::all();
        let steps = [
            ("modern sofa", Some("modern sofa")),
            ("sofa set", Some("sofa set")),
            ("modern sofa", Some("modern sofa")),
            ("modern sofa", None),
            ("sofa set", Some("sofa set")),
        ];
        for (query, expected) in steps {
            let change = wf.select_query(0, Marketplace::Amazon, query, all).unwrap();
            assert_eq!(change.selected.as_deref(), expected);
            assert_eq!(wf.detected_elements()[0].selected(Marketplace::Amazon), expected);
        }
        assert_eq!(wf.detected_elements()[0].selected(Marketplace::Etsy), None);
    }

    #[test]
    fn pair_completion_counts_available_marketplaces_only() {
        let (mut wf, _) = completed(&["Sofa"]);
        let all = MarketplaceSet::all();
        let change = wf.select_query(0, Marketplace::Amazon, "modern sofa", all).unwrap();
        assert!(!change.pair_complete);
        let change = wf.select_query(0, Marketplace::Etsy, "vintage sofa", all).unwrap();
        assert!(change.pair_complete);

        let (mut wf, _) = completed(&["Sofa"]);
        let amazon_only = MarketplaceSet::none().with(Marketplace::Amazon);
        let change = wf.select_query(0, Marketplace::Amazon, "modern sofa", amazon_only).unwrap();
        assert!(change.pair_complete);
    }

    #[test]
    fn selection_errors() {
        let (mut wf, _) = workflow();
        assert_eq!(
            wf.select_query(0, Marketplace::Amazon, "x", MarketplaceSet::all()),
            Err(SelectionError::NotReady)
        );

        let (mut wf, _) = completed(&["Sofa"]);
        assert_eq!(
            wf.select_query(3, Marketplace::Amazon, "modern sofa", MarketplaceSet::all()),
            Err(SelectionError::UnknownElement(3))
        );
        assert_eq!(
            wf.select_query(0, Marketplace::Etsy, "handmade sofa", MarketplaceSet::none().with(Marketplace::Amazon)),
            Err(SelectionError::MarketplaceUnavailable(Marketplace::Etsy))
        );
        assert!(matches!(
            wf.select_query(0, Marketplace::Amazon, "leather chair", MarketplaceSet::all()),
            Err(SelectionError::UnknownQuery { .. })
        ));
    }

    #[test]
    fn select_all_fills_only_empty_available_slots() {
        let (mut wf, _) = completed(&["Sofa", "Lamp"]);
        let all = MarketplaceSet::all();
        wf.select_query(0, Marketplace::Amazon, "sofa set", all).unwrap();

        let amazon_only = MarketplaceSet::none().with(Marketplace::Amazon);
        assert_eq!(wf.select_all(amazon_only), 1);

        let sofa = &wf.detected_elements()[0];
        assert_eq!(sofa.selected(Marketplace::Amazon), Some("sofa set"));
        assert_eq!(sofa.selected(Marketplace::Etsy), None);
        let lamp = &wf.detected_elements()[1];
        assert_eq!(lamp.selected(Marketplace::Amazon), Some("modern lamp"));
        assert_eq!(lamp.selected(Marketplace::Etsy), None);
    }

    #[test]
    fn clear_selections_empties_every_marketplace() {
        let (mut wf, _) = completed(&["Sofa", "Lamp"]);
        assert_eq!(wf.select_all(MarketplaceSet::all()), 4);
        wf.clear_selections();
        for element in wf.detected_elements() {
            assert!(Marketplace::iter().all(|m| element.selected(m).is_none()));
        }
        assert!(wf.selected_searches(MarketplaceSet::all()).is_empty());
    }

    #[test]
    fn duplicates_are_independent() {
        let (mut wf, _) = completed(&["Lamp", "Lamp"]);
        wf.select_query(1, Marketplace::Etsy, "vintage lamp", MarketplaceSet::all()).unwrap();
        assert_eq!(wf.detected_elements()[0].selected(Marketplace::Etsy), None);
        assert_eq!(wf.detected_elements()[1].selected(Marketplace::Etsy), Some("vintage lamp"));
    }

    #[test]
    fn searches_skip_unselected_and_unavailable() {
        let (mut wf, _) = completed(&["Sofa", "Lamp", "Rug"]);
        let all = MarketplaceSet::all();
        wf.select_query(0, Marketplace::Amazon, "modern sofa", all).unwrap();
        wf.select_query(2, Marketplace::Etsy, "vintage rug", all).unwrap();

        let searches = wf.selected_searches(all);
        assert_eq!(searches.len(), 2);
        assert_eq!(searches[0].index, 0);
        assert_eq!(searches[0].amazon_query.as_deref(), Some("modern sofa"));
        assert_eq!(searches[1].index, 2);
        assert_eq!(searches[1].etsy_query.as_deref(), Some("vintage rug"));

        let amazon_only = MarketplaceSet::none().with(Marketplace::Amazon);
        let searches = wf.selected_searches(amazon_only);
        assert_eq!(searches.len(), 1);
        assert_eq!(searches[0].name, "Sofa");
    }

    #[test]
    fn element_status_marks() {
        let (mut wf, _) = completed(&["Sofa", "Lamp"]);
        wf.mark_searching(&[0, 1]);
        wf.mark_failed(&[1], "no results");
        wf.mark_idle(&[0]);
        assert_eq!(wf.detected_elements()[0].status, ElementStatus::Idle);
        assert_eq!(wf.detected_elements()[1].status, ElementStatus::Error);
        assert_eq!(wf.detected_elements()[1].error_message.as_deref(), Some("no results"));
        assert_eq!(wf.status(), UploadStatus::Complete);
    }
}
