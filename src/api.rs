// GitHub API client: a small blocking HTTP client over the REST API.
// - Implements `RemoteStore` over the contents endpoints and
//   `WorkflowRunner` over the Actions endpoints.
// - Its only job besides transport is translating HTTP status codes into
//   `StoreError` variants (404 -> NotFound, 409/422 -> Conflict).

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Settings;
use crate::error::StoreError;
use crate::store::{
    DirEntry, Job, RemoteFile, RemoteFileRef, RemoteStore, RepoInfo, RunStatus, WorkflowRun,
    WorkflowRunner,
};

/// Client bound to one repository and one access token.
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    api_url: Url,
    repo: String,
    workflow: String,
}

/// `PUT /contents` request body.
#[derive(Serialize, Debug)]
struct PutContents<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct PutContentsResponse {
    content: ContentItem,
}

/// One entry of the contents API, either a file with inline content or a
/// directory listing item.
#[derive(Deserialize, Debug)]
struct ContentItem {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    sha: String,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum ContentsResponse {
    Directory(Vec<ContentItem>),
    File(ContentItem),
}

#[derive(Deserialize, Debug)]
struct UserResponse {
    login: String,
}

#[derive(Deserialize, Debug)]
struct RepoResponse {
    name: String,
    owner: UserResponse,
    default_branch: String,
}

#[derive(Deserialize, Debug)]
struct RunsResponse {
    workflow_runs: Vec<RunItem>,
}

#[derive(Deserialize, Debug)]
struct RunItem {
    id: u64,
    status: String,
}

#[derive(Deserialize, Debug)]
struct JobsResponse {
    jobs: Vec<JobItem>,
}

#[derive(Deserialize, Debug)]
struct JobItem {
    id: u64,
    status: String,
    #[serde(default)]
    html_url: String,
}

impl From<JobItem> for Job {
    fn from(job: JobItem) -> Self {
        Job {
            id: job.id,
            status: RunStatus::parse(&job.status),
            html_url: job.html_url,
        }
    }
}

#[derive(Deserialize, Debug)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

impl GitHubClient {
    /// Build a client from resolved settings.
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .default_headers(default_headers(&settings.token)?)
            .build()
            .context("Failed to build HTTP client")?;
        let api_url = Url::parse(&settings.api_url)
            .with_context(|| format!("Invalid API URL {}", settings.api_url))?;
        if api_url.cannot_be_a_base() {
            anyhow::bail!("Invalid API URL {}", settings.api_url);
        }
        Ok(GitHubClient {
            client,
            api_url,
            repo: settings.repo.clone(),
            workflow: settings.workflow.clone(),
        })
    }

    /// `owner/name` of the bound repository.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Login of the account owning the token.
    pub fn authenticated_user(&self) -> Result<String, StoreError> {
        let url = self.endpoint(["user"]);
        let user: UserResponse = send(self.client.get(url), "user")?.json()?;
        Ok(user.login)
    }

    pub fn repository(&self) -> Result<RepoInfo, StoreError> {
        let url = self.repo_endpoint(&[]);
        let repo: RepoResponse = send(self.client.get(url), &self.repo)?.json()?;
        Ok(RepoInfo {
            owner: repo.owner.login,
            name: repo.name,
            default_branch: repo.default_branch,
        })
    }

    /// `api_url` extended with `segments`, each one percent-encoded.
    fn endpoint<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Url {
        let mut url = self.api_url.clone();
        // Checked in `new`: the base URL can take path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `repos/<owner>/<name>/...` under the API root.
    fn repo_endpoint(&self, rest: &[&str]) -> Url {
        let segments = ["repos"]
            .into_iter()
            .chain(self.repo.split('/'))
            .chain(rest.iter().copied());
        self.endpoint(segments)
    }

    /// Contents endpoint for a repository path. `#`, `?`, `%` and spaces in
    /// file names are escaped so they stay part of the path.
    fn contents_url(&self, path: &str) -> Url {
        let mut segments = vec!["contents"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        self.repo_endpoint(&segments)
    }

    fn actions_url(&self, rest: &[&str]) -> Url {
        let mut segments = vec!["actions"];
        segments.extend_from_slice(rest);
        self.repo_endpoint(&segments)
    }

    fn put_contents(
        &self,
        path: &str,
        message: &str,
        content: &[u8],
        sha: Option<&str>,
    ) -> Result<RemoteFileRef, StoreError> {
        let fallback;
        let message = if message.is_empty() {
            fallback = format!("shbin: {path}");
            fallback.as_str()
        } else {
            message
        };
        let body = PutContents {
            message,
            content: STANDARD.encode(content),
            sha,
        };
        tracing::debug!(path, update = sha.is_some(), "PUT contents");
        let res = send(self.client.put(self.contents_url(path)).json(&body), path)?;
        let created: PutContentsResponse = res.json()?;
        Ok(self.file_ref(created.content))
    }

    fn file_ref(&self, item: ContentItem) -> RemoteFileRef {
        RemoteFileRef {
            repository: self.repo.clone(),
            path: item.path,
            sha: item.sha,
            html_url: item.html_url.unwrap_or_default(),
        }
    }

    fn get_contents(&self, path: &str) -> Result<ContentsResponse, StoreError> {
        tracing::debug!(path, "GET contents");
        let res = send(self.client.get(self.contents_url(path)), path)?;
        Ok(res.json()?)
    }
}

/// Headers sent with every request: token, API version and user agent.
fn default_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
        .context("Access token contains invalid characters")?;
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(
        "X-GitHub-Api-Version",
        HeaderValue::from_static("2022-11-28"),
    );
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("shbin/", env!("CARGO_PKG_VERSION"))),
    );
    Ok(headers)
}

/// Send a request and translate error statuses.
fn send(request: RequestBuilder, subject: &str) -> Result<Response, StoreError> {
    let res = request.send()?;
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let message = res
        .json::<ApiMessage>()
        .map(|m| m.message)
        .unwrap_or_default();
    Err(classify(status, subject, message))
}

/// Map an unsuccessful status onto the store error taxonomy.
pub fn classify(status: StatusCode, subject: &str, message: String) -> StoreError {
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(subject.to_string()),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            StoreError::Conflict(subject.to_string())
        }
        _ => StoreError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Decode the line-wrapped base64 the contents API returns.
pub fn decode_content(path: &str, encoded: &str) -> Result<Vec<u8>, StoreError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).map_err(|e| StoreError::Decode {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

impl RemoteStore for GitHubClient {
    fn create_file(
        &self,
        path: &str,
        message: &str,
        content: &[u8],
    ) -> Result<RemoteFileRef, StoreError> {
        self.put_contents(path, message, content, None)
    }

    fn update_file(
        &self,
        path: &str,
        message: &str,
        content: &[u8],
        sha: &str,
    ) -> Result<RemoteFileRef, StoreError> {
        self.put_contents(path, message, content, Some(sha))
    }

    fn read_file(&self, path: &str) -> Result<RemoteFile, StoreError> {
        let item = match self.get_contents(path)? {
            ContentsResponse::Directory(_) => {
                return Err(StoreError::IsDirectory(path.to_string()))
            }
            ContentsResponse::File(item) if item.kind == "dir" => {
                return Err(StoreError::IsDirectory(path.to_string()))
            }
            ContentsResponse::File(item) => item,
        };

        let inline = item
            .content
            .as_deref()
            .filter(|c| !c.is_empty() && item.encoding.as_deref() == Some("base64"));
        let content = match (inline, item.download_url.as_deref()) {
            (Some(encoded), _) => decode_content(path, encoded)?,
            // Files above 1MB come without inline content.
            (None, Some(raw_url)) => {
                tracing::debug!(path, "fetching raw content");
                send(self.client.get(raw_url), path)?.bytes()?.to_vec()
            }
            (None, None) => Vec::new(),
        };
        Ok(RemoteFile {
            reference: self.file_ref(item),
            content,
        })
    }

    fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, StoreError> {
        let items = match self.get_contents(path)? {
            ContentsResponse::Directory(items) => items,
            ContentsResponse::File(item) => vec![item],
        };
        Ok(items
            .into_iter()
            .map(|item| match item.kind.as_str() {
                "dir" => DirEntry::Directory { path: item.path },
                _ => DirEntry::File(self.file_ref(item)),
            })
            .collect())
    }
}

impl WorkflowRunner for GitHubClient {
    fn dispatch(
        &self,
        git_ref: &str,
        path: &str,
        command: &str,
        identity: &str,
    ) -> Result<(), StoreError> {
        let url = self.actions_url(&["workflows", &self.workflow, "dispatches"]);
        let body = json!({
            "ref": git_ref,
            "inputs": { "path": path, "command": command, "identity": identity },
        });
        tracing::debug!(path, command, identity, workflow = %self.workflow, "dispatching workflow");
        send(self.client.post(url).json(&body), &self.workflow)?;
        Ok(())
    }

    fn latest_run(&self) -> Result<Option<WorkflowRun>, StoreError> {
        let url = self.actions_url(&["workflows", &self.workflow, "runs"]);
        let request = self
            .client
            .get(url)
            .query(&[("event", "workflow_dispatch"), ("per_page", "1")]);
        let runs: RunsResponse = send(request, &self.workflow)?.json()?;
        Ok(runs.workflow_runs.into_iter().next().map(|run| WorkflowRun {
            id: run.id,
            status: RunStatus::parse(&run.status),
        }))
    }

    fn first_job(&self, run_id: u64) -> Result<Option<Job>, StoreError> {
        let subject = format!("run {run_id}");
        let url = self.actions_url(&["runs", &run_id.to_string(), "jobs"]);
        let jobs: JobsResponse = send(self.client.get(url), &subject)?.json()?;
        Ok(jobs.jobs.into_iter().next().map(Job::from))
    }

    fn job(&self, job_id: u64) -> Result<Job, StoreError> {
        let subject = format!("job {job_id}");
        let url = self.actions_url(&["jobs", &job_id.to_string()]);
        let job: JobItem = send(self.client.get(url), &subject)?.json()?;
        Ok(job.into())
    }

    fn job_logs(&self, job_id: u64) -> Result<String, StoreError> {
        let subject = format!("job {job_id} logs");
        let url = self.actions_url(&["jobs", &job_id.to_string(), "logs"]);
        Ok(send(self.client.get(url), &subject)?.text()?)
    }
}
