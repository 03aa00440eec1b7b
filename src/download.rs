// Download orchestration for `shbin download`.
// - Directories are downloaded recursively but flattened: every file lands
//   in `dest` under its own name, so equal names in different
//   subdirectories overwrite each other.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::StoreError;
use crate::store::{RemoteStore, RepoInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded(Vec<PathBuf>),
    NotFound,
}

/// Strip the web URL prefix (`<web>/<owner>/<repo>/blob|tree/<branch>/`)
/// and any trailing slash, leaving a repository relative path.
pub fn normalize_path(url_or_path: &str, web_url: &str, repo: &RepoInfo) -> String {
    let base = format!("{}/{}/", web_url.trim_end_matches('/'), repo.full_name());
    let stripped = url_or_path
        .strip_prefix(&base)
        .and_then(|rest| {
            ["blob", "tree"]
                .iter()
                .find_map(|kind| rest.strip_prefix(&format!("{kind}/{}/", repo.default_branch)))
        })
        .unwrap_or(url_or_path);
    stripped.trim_end_matches('/').to_string()
}

fn within_identity(path: &str, identity: &str) -> bool {
    path == identity || path.starts_with(&format!("{identity}/"))
}

fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<StoreError>(), Some(StoreError::NotFound(_)))
}

/// Download `path` into `dest`. A missing path outside the caller's own
/// namespace is retried once under `<identity>/<path>`.
pub fn download(
    store: &dyn RemoteStore,
    path: &str,
    identity: &str,
    dest: &Path,
) -> Result<DownloadOutcome> {
    let mut written = Vec::new();
    match fetch(store, path, dest, &mut written) {
        Ok(()) => return Ok(DownloadOutcome::Downloaded(written)),
        Err(e) if !is_not_found(&e) => {
            return Err(e.context(format!("Failed to download {path}")))
        }
        Err(_) if within_identity(path, identity) => return Ok(DownloadOutcome::NotFound),
        Err(_) => {}
    }

    let namespaced = format!("{identity}/{path}");
    tracing::info!(path, retry = %namespaced, "not found, retrying inside own namespace");
    match fetch(store, &namespaced, dest, &mut written) {
        Ok(()) => Ok(DownloadOutcome::Downloaded(written)),
        Err(e) if is_not_found(&e) => Ok(DownloadOutcome::NotFound),
        Err(e) => Err(e.context(format!("Failed to download {namespaced}"))),
    }
}

fn fetch(
    store: &dyn RemoteStore,
    path: &str,
    dest: &Path,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    match store.read_file(path) {
        Ok(file) => {
            let target = dest.join(file_name(path));
            fs::write(&target, &file.content)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            written.push(target);
            Ok(())
        }
        Err(StoreError::IsDirectory(_)) => {
            for entry in store.list_directory(path)? {
                fetch(store, entry.path(), dest, written)?;
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
