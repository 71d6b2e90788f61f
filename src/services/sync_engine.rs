//! One-shot sync driver.
//!
//! Four sequential stages with no branching back:
//! 1. Init - ensure the backup destination exists
//! 2. Users - fetch the user catalog, persist snapshot
//! 3. Projects - fetch the project catalog, persist snapshot
//! 4. Per-project - mirror the repository and persist pipeline history,
//!    on a bounded concurrent worker pool
//!
//! Catalog fetch or snapshot failures in stages 2-3 abort the run; a single
//! project's failure in stage 4 is recorded and the loop continues. Reruns
//! are idempotent: mirrors fast-forward, snapshot inserts no-op on conflict.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::Config;
use crate::error::BackupError;
use crate::models::Project;
use crate::services::gitlab_client::GitLabClient;
use crate::services::mirror::{self, MirrorOutcome};
use crate::services::snapshot::SnapshotSink;

/// A recorded per-project failure. Never aborts the run.
#[derive(Debug)]
pub struct ProjectFailure {
    /// `namespace/name` label of the project.
    pub project: String,

    /// Which step failed: `path`, `mirror`, `pipelines` or `persist`.
    pub stage: &'static str,

    pub message: String,
}

/// Result of a full sync run.
#[derive(Debug)]
pub struct SyncSummary {
    /// Users in the fetched catalog.
    pub users: usize,

    /// Projects in the fetched catalog.
    pub projects: usize,

    /// Projects whose mirror step succeeded.
    pub mirrored: usize,

    /// Pipeline records persisted across all projects.
    pub pipelines: usize,

    /// Per-project failures, in completion order.
    pub failures: Vec<ProjectFailure>,

    pub duration_ms: i64,

    pub finished_at: DateTime<Utc>,
}

impl SyncSummary {
    /// True when every project mirrored and synced cleanly.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of one project's stage-4 processing.
struct ProjectOutcome {
    mirror: Option<MirrorOutcome>,
    pipelines: usize,
    failures: Vec<ProjectFailure>,
}

/// Drives a full backup run against one GitLab instance.
pub struct SyncEngine {
    client: GitLabClient,
    sink: Box<dyn SnapshotSink>,
    backup_dir: PathBuf,
    token: String,
    concurrency: usize,
}

impl SyncEngine {
    /// Create a new engine. The sink strategy is injected; the engine does
    /// not know whether it writes files, database rows, or both.
    pub fn new(client: GitLabClient, sink: Box<dyn SnapshotSink>, config: &Config) -> Self {
        Self {
            client,
            sink,
            backup_dir: config.backup_dir(),
            token: config.gitlab.token.clone(),
            concurrency: config.backup.concurrency,
        }
    }

    /// Run one full sync.
    pub async fn run(&self) -> Result<SyncSummary, BackupError> {
        let start = Instant::now();

        // Stage 1: Init
        std::fs::create_dir_all(&self.backup_dir).map_err(|e| {
            BackupError::persistence_for(
                format!("failed to create backup directory: {}", e),
                self.backup_dir.display().to_string(),
            )
        })?;
        self.sink.init().await?;

        // Stage 2: Users
        let users = self.client.fetch_users().await?;
        eprintln!("[sync] Fetched {} user(s)", users.len());
        self.sink.persist_users(&users).await?;

        // Stage 3: Projects
        let projects = self.client.fetch_projects().await?;
        eprintln!("[sync] Fetched {} project(s)", projects.len());
        self.sink.persist_projects(&projects).await?;
        let total_projects = projects.len();

        // Stage 4: Per-project, in fetch order, on a bounded worker pool
        let (work, mut failures) = assign_mirror_paths(&self.backup_dir, projects);

        let outcomes: Vec<ProjectOutcome> = stream::iter(work)
            .map(|(project, path)| self.process_project(project, path))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut mirrored = 0;
        let mut pipelines = 0;
        for outcome in outcomes {
            if outcome.mirror.is_some() {
                mirrored += 1;
            }
            pipelines += outcome.pipelines;
            failures.extend(outcome.failures);
        }

        Ok(SyncSummary {
            users: users.len(),
            projects: total_projects,
            mirrored,
            pipelines,
            failures,
            duration_ms: start.elapsed().as_millis() as i64,
            finished_at: Utc::now(),
        })
    }

    /// Mirror one project's repository, then fetch and persist its pipeline
    /// history. Each step fails independently; both are recorded.
    async fn process_project(&self, project: Project, path: PathBuf) -> ProjectOutcome {
        let slug = project.slug();
        let mut outcome = ProjectOutcome {
            mirror: None,
            pipelines: 0,
            failures: Vec::new(),
        };

        eprintln!("[sync] {}: mirroring into {}", slug, path.display());

        // git2 repositories are not Send; the whole git operation runs on
        // the blocking pool and only the outcome crosses back.
        let url = mirror::authenticated_url(&project.http_url_to_repo, &self.token);
        let mirror_result =
            tokio::task::spawn_blocking(move || mirror::mirror(&url, &path)).await;

        match mirror_result {
            Ok(Ok(result)) => {
                outcome.mirror = Some(result);
            }
            Ok(Err(e)) => {
                log::warn!("mirror failed for {}: {}", slug, e);
                outcome.failures.push(ProjectFailure {
                    project: slug.clone(),
                    stage: "mirror",
                    message: e.to_string(),
                });
            }
            Err(e) => {
                outcome.failures.push(ProjectFailure {
                    project: slug.clone(),
                    stage: "mirror",
                    message: format!("mirror task panicked: {}", e),
                });
            }
        }

        // Pipeline history is fetched even when the mirror failed; the two
        // steps have no data dependency.
        match self.client.fetch_pipelines(project.id).await {
            Ok(pipelines) => {
                eprintln!("[sync] {}: {} pipeline(s)", slug, pipelines.len());
                match self.sink.persist_pipelines(&project, &pipelines).await {
                    Ok(()) => outcome.pipelines = pipelines.len(),
                    Err(e) => {
                        log::warn!("pipeline snapshot failed for {}: {}", slug, e);
                        outcome.failures.push(ProjectFailure {
                            project: slug.clone(),
                            stage: "persist",
                            message: e.to_string(),
                        });
                    }
                }
            }
            Err(e) => {
                log::warn!("pipeline fetch failed for {}: {}", slug, e);
                outcome.failures.push(ProjectFailure {
                    project: slug,
                    stage: "pipelines",
                    message: e.to_string(),
                });
            }
        }

        outcome
    }
}

/// Resolve each project's mirror path and flag collisions.
///
/// The path is a pure function of (namespace, name), so two distinct remote
/// projects can resolve to the same directory. The first project (in fetch
/// order) keeps the path; later ones are failed up front instead of
/// silently corrupting the first one's mirror.
fn assign_mirror_paths(
    backup_dir: &std::path::Path,
    projects: Vec<Project>,
) -> (Vec<(Project, PathBuf)>, Vec<ProjectFailure>) {
    let mut claimed: HashMap<PathBuf, i64> = HashMap::new();
    let mut work = Vec::new();
    let mut failures = Vec::new();

    for project in projects {
        let path = mirror::compute_local_path(backup_dir, project.namespace_path(), &project.name);
        match claimed.get(&path) {
            Some(owner_id) => {
                failures.push(ProjectFailure {
                    project: project.slug(),
                    stage: "path",
                    message: format!(
                        "mirror path {} already claimed by project id {}",
                        path.display(),
                        owner_id
                    ),
                });
            }
            None => {
                claimed.insert(path.clone(), project.id);
                work.push((project, path));
            }
        }
    }

    (work, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::Namespace;
    use std::path::Path;

    fn project(id: i64, namespace: &str, name: &str) -> Project {
        Project {
            id,
            name: name.to_string(),
            namespace: Namespace {
                full_path: namespace.to_string(),
            },
            http_url_to_repo: format!("https://gitlab.example.com/{}/{}.git", namespace, name),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_assign_mirror_paths_keeps_fetch_order() {
        let projects = vec![project(1, "a", "x"), project(2, "a", "y")];
        let (work, failures) = assign_mirror_paths(Path::new("/b"), projects);

        assert_eq!(work.len(), 2);
        assert!(failures.is_empty());
        assert_eq!(work[0].0.id, 1);
        assert_eq!(work[1].0.id, 2);
    }

    #[test]
    fn test_assign_mirror_paths_flags_collisions() {
        // Two distinct remote projects resolving to one local directory.
        let projects = vec![project(1, "team", "api"), project(2, "team", "api")];
        let (work, failures) = assign_mirror_paths(Path::new("/b"), projects);

        assert_eq!(work.len(), 1);
        assert_eq!(work[0].0.id, 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, "path");
        assert!(failures[0].message.contains("project id 1"));
    }
}
