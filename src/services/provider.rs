use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::profile::BusinessProfileSnapshot;
use crate::store::postgres::PgStore;

/// Sanitized view of a project, as the token subsystem sees it. The rest of
/// the product (project CRUD, billing, admin UI) lives behind this interface.
#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub owner_id: Uuid,
    pub profile: BusinessProfileSnapshot,
}

/// Collaborator interface: returns the business-profile record for a
/// project, or None when the project does not exist.
#[async_trait]
pub trait ProjectDataProvider: Send + Sync {
    async fn snapshot(&self, project_id: Uuid) -> anyhow::Result<Option<ProjectRecord>>;
}

/// Production provider backed by the projects table.
pub struct PgProjectProvider {
    db: PgStore,
}

impl PgProjectProvider {
    pub fn new(db: PgStore) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProjectDataProvider for PgProjectProvider {
    async fn snapshot(&self, project_id: Uuid) -> anyhow::Result<Option<ProjectRecord>> {
        let row = self.db.get_project(project_id).await?;
        Ok(row.map(|row| ProjectRecord {
            owner_id: row.owner_id,
            profile: row.snapshot().sanitized(),
        }))
    }
}

/// Fixed-content provider for tests and local demos.
#[derive(Default)]
pub struct StaticProjectProvider {
    projects: DashMap<Uuid, ProjectRecord>,
}

impl StaticProjectProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(self, project_id: Uuid, record: ProjectRecord) -> Self {
        self.projects.insert(project_id, record);
        self
    }

    /// Replace a project's record. Lets tests verify that issued snapshots
    /// are copies, not live references.
    pub fn upsert(&self, project_id: Uuid, record: ProjectRecord) {
        self.projects.insert(project_id, record);
    }
}

#[async_trait]
impl ProjectDataProvider for StaticProjectProvider {
    async fn snapshot(&self, project_id: Uuid) -> anyhow::Result<Option<ProjectRecord>> {
        Ok(self.projects.get(&project_id).map(|r| ProjectRecord {
            owner_id: r.owner_id,
            profile: r.profile.clone().sanitized(),
        }))
    }
}
