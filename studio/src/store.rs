//! Client-side project list with two-phase optimistic inserts: a temporary
//! entry goes in first and is later either replaced in place by the
//! persisted project or removed again.

use serde::Serialize;
use shared::{Project, ProjectId};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectStore {
    projects: Vec<Project>,
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest first.
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn get(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| &p.id == id)
    }

    /// Projects that exist on the backend. Temporary entries do not count
    /// against the quota.
    pub fn committed_count(&self) -> usize {
        self.projects.iter().filter(|p| !p.is_temporary).count()
    }

    pub fn insert_optimistic(&mut self, project: Project) {
        log::debug!("Optimistic insert of {}", project.id);
        self.projects.insert(0, project);
    }

    /// Swaps the temporary entry for the persisted one, keeping its position.
    /// If a refresh already brought the persisted project in, the temporary
    /// entry is dropped and the listed copy updated instead.
    pub fn commit(&mut self, temp_id: &ProjectId, project: Project) -> bool {
        let Some(temp_pos) = self.projects.iter().position(|p| &p.id == temp_id) else {
            log::warn!("Commit for unknown temporary project {}", temp_id);
            return false;
        };
        if let Some(listed) = self.projects.iter_mut().find(|p| p.id == project.id) {
            log::debug!("{} already listed, dropping {}", project.id, temp_id);
            *listed = project;
            self.projects.remove(temp_pos);
            return true;
        }
        log::debug!("Committed {} as {}", temp_id, project.id);
        self.projects[temp_pos] = project;
        true
    }

    pub fn rollback(&mut self, temp_id: &ProjectId) -> bool {
        let before = self.projects.len();
        self.projects.retain(|p| &p.id != temp_id);
        let removed = self.projects.len() != before;
        if removed {
            log::debug!("Rolled back {}", temp_id);
        }
        removed
    }

    /// Replaces the list with a fresh listing. In-flight temporary entries
    /// stay at the front.
    pub fn replace_all(&mut self, projects: Vec<Project>) {
        let mut next: Vec<Project> = self.projects.drain(..).filter(|p| p.is_temporary).collect();
        next.extend(projects.into_iter().filter(|p| !p.is_temporary));
        self.projects = next;
    }

    pub fn apply_update(&mut self, project: Project) -> bool {
        match self.projects.iter_mut().find(|p| p.id == project.id) {
            Some(slot) => {
                *slot = project;
                true
            }
            None => false,
        }
    }

    pub fn apply_remove(&mut self, id: &ProjectId) -> bool {
        self.rollback(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use shared::ProjectStatus;

    fn persisted(id: &str, name: &str) -> Project {
        Project {
            id: ProjectId::from(id),
            name: name.into(),
            status: ProjectStatus::Complete,
            created_at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            image_url: Some(format!("https://cdn.example/{}.jpg", id)),
            is_temporary: false,
        }
    }

    fn ids(store: &ProjectStore) -> Vec<&str> {
        store.projects().iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn commit_replaces_in_place() {
        let mut store = ProjectStore::new();
        store.replace_all(vec![persisted("b", "Bedroom")]);
        let temp = Project::temporary("Den", Utc::now());
        let temp_id = temp.id.clone();
        store.insert_optimistic(temp);
        assert_eq!(store.committed_count(), 1);
        assert_eq!(store.len(), 2);

        assert!(store.commit(&temp_id, persisted("a", "Den")));
        assert_eq!(ids(&store), vec!["a", "b"]);
        assert_eq!(store.committed_count(), 2);
        assert!(store.get(&temp_id).is_none());
    }

    #[test]
    fn commit_of_missing_entry_is_a_no_op() {
        let mut store = ProjectStore::new();
        store.replace_all(vec![persisted("b", "Bedroom")]);
        let before = store.clone();
        assert!(!store.commit(&ProjectId::from("temp-1"), persisted("a", "Den")));
        assert_eq!(store, before);
    }

    #[test]
    fn commit_after_refresh_does_not_duplicate() {
        let mut store = ProjectStore::new();
        store.replace_all(vec![persisted("b", "Bedroom")]);
        let temp = Project::temporary("Den", Utc::now());
        let temp_id = temp.id.clone();
        store.insert_optimistic(temp);

        store.replace_all(vec![persisted("a", "Den"), persisted("b", "Bedroom")]);
        assert_eq!(store.len(), 3);

        assert!(store.commit(&temp_id, persisted("a", "Den")));
        assert_eq!(ids(&store), vec!["a", "b"]);
        assert_eq!(store.committed_count(), 2);
    }

    #[test]
    fn rollback_restores_previous_list() {
        let mut store = ProjectStore::new();
        store.replace_all(vec![persisted("b", "Bedroom"), persisted("c", "Kitchen")]);
        let before = store.clone();

        let temp = Project::temporary("Den", Utc::now());
        let temp_id = temp.id.clone();
        store.insert_optimistic(temp);
        assert!(store.rollback(&temp_id));
        assert_eq!(store, before);
        assert!(!store.rollback(&temp_id));
    }

    #[test]
    fn refresh_keeps_in_flight_entries() {
        let mut store = ProjectStore::new();
        let now = Utc::now();
        store.insert_optimistic(Project::temporary("Den", now));
        store.insert_optimistic(Project::temporary("Hall", now + Duration::milliseconds(5)));
        store.replace_all(vec![persisted("x", "Office"), persisted("y", "Porch")]);

        assert_eq!(store.len(), 4);
        assert!(store.projects()[0].is_temporary);
        assert!(store.projects()[1].is_temporary);
        assert_eq!(store.committed_count(), 2);
    }

    #[test]
    fn local_mutations() {
        let mut store = ProjectStore::new();
        store.replace_all(vec![persisted("a", "Den"), persisted("b", "Bedroom")]);

        assert!(store.apply_update(persisted("a", "Study")));
        assert_eq!(store.get(&ProjectId::from("a")).map(|p| p.name.as_str()), Some("Study"));
        assert!(!store.apply_update(persisted("zzz", "Nope")));

        let mut errored = persisted("b", "Bedroom");
        errored.status = ProjectStatus::Error;
        assert!(store.apply_update(errored));
        assert_eq!(store.projects()[1].status, ProjectStatus::Error);

        assert!(store.apply_remove(&ProjectId::from("a")));
        assert_eq!(ids(&store), vec!["b"]);
    }
}
