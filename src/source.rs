// Upload input resolution.
// - Turns paths, clipboard or stdin into `UploadItem`s.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

use crate::clipboard::Clipboard;
use crate::error::UsageError;

/// Where the upload content comes from. Exactly one per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    Paths(Vec<String>),
    Clipboard,
    Stdin,
}

/// A named piece of content to upload. Filesystem items are read lazily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadItem {
    Filesystem { path: PathBuf },
    InMemory { name: String, content: Vec<u8> },
}

impl UploadItem {
    pub fn in_memory(name: impl Into<String>, content: Vec<u8>) -> Self {
        UploadItem::InMemory {
            name: name.into(),
            content,
        }
    }

    pub fn name(&self) -> String {
        match self {
            UploadItem::Filesystem { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            UploadItem::InMemory { name, .. } => name.clone(),
        }
    }

    /// File name without its last extension.
    pub fn stem(&self) -> String {
        let name = self.name();
        Path::new(&name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(name)
    }

    /// Last extension including the dot, or an empty string.
    pub fn extension(&self) -> String {
        Path::new(&self.name())
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default()
    }

    pub fn read_bytes(&self) -> io::Result<Vec<u8>> {
        match self {
            UploadItem::Filesystem { path } => fs::read(path),
            UploadItem::InMemory { content, .. } => Ok(content.clone()),
        }
    }
}

/// Random URL-safe name built from 8 bytes of entropy.
pub fn url_safe_token() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Guesses a file extension (with dot) from the content's magic number.
/// Valid UTF-8 without a known signature is treated as text.
pub fn sniff_extension(content: &[u8]) -> String {
    if let Some(kind) = infer::get(content) {
        return format!(".{}", kind.extension());
    }
    if std::str::from_utf8(content).is_ok() {
        return ".txt".to_string();
    }
    String::new()
}

/// Expands absolute paths verbatim and everything else as a glob pattern
/// relative to `cwd`. Patterns matching nothing contribute nothing.
pub fn expand_paths(patterns: &[String], cwd: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        if Path::new(pattern).is_absolute() {
            paths.push(PathBuf::from(pattern));
            continue;
        }
        let full = format!(
            "{}/{}",
            glob::Pattern::escape(&cwd.to_string_lossy()),
            pattern
        );
        let matches = glob::glob(&full)
            .map_err(|e| UsageError::new(format!("invalid pattern '{pattern}': {e}")))?;
        for entry in matches {
            let path = entry.with_context(|| format!("Failed to expand '{pattern}'"))?;
            if path.is_file() {
                paths.push(path);
            }
        }
    }
    Ok(paths)
}

/// Everything needed to read upload content, injected so tests can fake the
/// clipboard, stdin and random names.
pub struct Sources<'a> {
    pub cwd: PathBuf,
    pub clipboard: &'a dyn Clipboard,
    pub stdin: &'a mut dyn Read,
    pub token: &'a mut dyn FnMut() -> String,
}

impl Sources<'_> {
    pub fn resolve(
        &mut self,
        source: &UploadSource,
        file_name: Option<&str>,
    ) -> Result<Vec<UploadItem>> {
        match source {
            UploadSource::Paths(patterns) => {
                let paths = expand_paths(patterns, &self.cwd)?;
                tracing::debug!(count = paths.len(), "expanded paths");
                match (file_name, paths.first()) {
                    (Some(name), Some(first)) => {
                        let content = fs::read(first)
                            .with_context(|| format!("Failed to read {}", first.display()))?;
                        Ok(vec![UploadItem::in_memory(name, content)])
                    }
                    (Some(_), None) => Ok(Vec::new()),
                    (None, _) => Ok(paths
                        .into_iter()
                        .map(|path| UploadItem::Filesystem { path })
                        .collect()),
                }
            }
            UploadSource::Clipboard => {
                let content = self
                    .clipboard
                    .paste()
                    .map_err(|e| UsageError::new(e.to_string()))?;
                Ok(vec![self.named(file_name, content)])
            }
            UploadSource::Stdin => {
                let mut content = Vec::new();
                self.stdin
                    .read_to_end(&mut content)
                    .context("Failed to read standard input")?;
                Ok(vec![self.named(file_name, content)])
            }
        }
    }

    fn named(&mut self, file_name: Option<&str>, content: Vec<u8>) -> UploadItem {
        let name = match file_name {
            Some(name) => name.to_string(),
            None => format!("{}{}", (self.token)(), sniff_extension(&content)),
        };
        UploadItem::in_memory(name, content)
    }
}
