//! Project Registry - Named Projects
//!
//! Same allocator discipline as the market registry (ids from 1, strictly
//! increasing, never reused) with an independent lifecycle.

use std::collections::BTreeMap;

use parking_lot::{Mutex, RwLock};

use crate::domain::{EngineError, Project, ProjectId, ProjectRegistered};

/// Registry of all projects.
pub struct ProjectRegistry {
  next_id: Mutex<ProjectId>,
  projects: RwLock<BTreeMap<ProjectId, Project>>,
}

impl Default for ProjectRegistry {
  fn default() -> Self {
    Self::new()
  }
}

impl ProjectRegistry {
  /// Empty registry; the first project gets id 1.
  #[must_use]
  pub fn new() -> Self {
    Self {
      next_id: Mutex::new(1),
      projects: RwLock::new(BTreeMap::new()),
    }
  }

  /// Rebuild from persisted projects, keeping the allocator ahead of
  /// every restored id.
  #[must_use]
  pub fn restore(next_id: ProjectId, projects: Vec<Project>) -> Self {
    let highest = projects.iter().map(|p| p.id).max().unwrap_or(0);
    Self {
      next_id: Mutex::new(next_id.max(highest + 1)),
      projects: RwLock::new(projects.into_iter().map(|p| (p.id, p)).collect()),
    }
  }

  /// Register a project and return its registration event.
  pub fn register_project(&self, name: &str, description: &str, owner: &str) -> ProjectRegistered {
    let mut next_id = self.next_id.lock();
    let project = Project::new(*next_id, name, description, owner);
    self.projects.write().insert(project.id, project.clone());
    *next_id += 1;
    ProjectRegistered { project }
  }

  /// Look up a project.
  pub fn get_project(&self, id: ProjectId) -> Result<Project, EngineError> {
    self
      .projects
      .read()
      .get(&id)
      .cloned()
      .ok_or_else(|| EngineError::project_not_found(id))
  }

  /// Whether `id` was ever allocated.
  #[must_use]
  pub fn project_exists(&self, id: ProjectId) -> bool {
    self.projects.read().contains_key(&id)
  }

  /// Every project in id order.
  #[must_use]
  pub fn list_projects(&self) -> Vec<Project> {
    self.projects.read().values().cloned().collect()
  }

  /// Allocator position and every project, for persistence.
  #[must_use]
  pub fn export(&self) -> (ProjectId, Vec<Project>) {
    let next_id = self.next_id.lock();
    (*next_id, self.list_projects())
  }
}
