// Remote store abstraction.
// - The orchestrators only talk to these traits. `api::GitHubClient`
//   implements them over the GitHub REST API; tests substitute mocks or the
//   in-memory fake from `tests/`.

use crate::error::StoreError;

/// A file as known by the remote store after a create, update or read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileRef {
    pub repository: String,
    pub path: String,
    /// Opaque version token. Required to update the file.
    pub sha: String,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub reference: RemoteFileRef,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirEntry {
    File(RemoteFileRef),
    Directory { path: String },
}

impl DirEntry {
    pub fn path(&self) -> &str {
        match self {
            DirEntry::File(file) => &file.path,
            DirEntry::Directory { path } => path,
        }
    }
}

/// Repository metadata needed to build and normalize URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
}

impl RepoInfo {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait RemoteStore {
    /// Fails with [`StoreError::Conflict`] when `path` already exists.
    fn create_file(
        &self,
        path: &str,
        message: &str,
        content: &[u8],
    ) -> Result<RemoteFileRef, StoreError>;

    /// Fails with [`StoreError::Conflict`] when `sha` is stale.
    fn update_file(
        &self,
        path: &str,
        message: &str,
        content: &[u8],
        sha: &str,
    ) -> Result<RemoteFileRef, StoreError>;

    /// Fails with [`StoreError::IsDirectory`] when `path` is a directory.
    fn read_file(&self, path: &str) -> Result<RemoteFile, StoreError>;

    fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
}

impl RunStatus {
    /// GitHub also reports `waiting`, `requested` and `pending`; all of them
    /// mean the run has not started yet.
    pub fn parse(status: &str) -> Self {
        match status {
            "in_progress" => RunStatus::InProgress,
            "completed" => RunStatus::Completed,
            _ => RunStatus::Queued,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    pub id: u64,
    pub status: RunStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: u64,
    pub status: RunStatus,
    pub html_url: String,
}

/// Workflow operations used by `shbin run`.
#[cfg_attr(test, mockall::automock)]
pub trait WorkflowRunner {
    /// Start the workflow for the script at `path`. `identity` names the
    /// folder the workflow commits its output under.
    fn dispatch(
        &self,
        git_ref: &str,
        path: &str,
        command: &str,
        identity: &str,
    ) -> Result<(), StoreError>;

    /// Most recent run of the configured workflow, if any.
    fn latest_run(&self) -> Result<Option<WorkflowRun>, StoreError>;

    fn first_job(&self, run_id: u64) -> Result<Option<Job>, StoreError>;

    fn job(&self, job_id: u64) -> Result<Job, StoreError>;

    /// Full log text of the job so far.
    fn job_logs(&self, job_id: u64) -> Result<String, StoreError>;
}
