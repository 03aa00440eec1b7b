// Upload orchestration.
// - Creates each item, resolving conflicts by renaming (`--new`) or by
//   updating the existing file in place.
// - Reports the resulting URL, optionally as a Pages link and copied to
//   the clipboard.

use anyhow::{Context, Result};

use crate::clipboard::Clipboard;
use crate::error::StoreError;
use crate::namespace;
use crate::source::UploadItem;
use crate::store::{RemoteFileRef, RemoteStore, RepoInfo};
use crate::ui;

#[derive(Debug, Clone)]
pub struct UploadOptions<'a> {
    pub namespace: &'a str,
    pub message: &'a str,
    pub force_new: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// No input matched; nothing was sent.
    Nothing,
    Uploaded {
        url: String,
        files: Vec<RemoteFileRef>,
    },
}

/// Upload every item in order and compute the URL to report.
pub fn upload_all(
    store: &dyn RemoteStore,
    items: &[UploadItem],
    options: &UploadOptions<'_>,
    suffix: &mut dyn FnMut() -> String,
) -> Result<UploadOutcome> {
    let mut files = Vec::with_capacity(items.len());
    for item in items {
        files.push(create_or_update(store, item, options, suffix)?);
    }
    Ok(match reportable_url(&files) {
        Some(url) => UploadOutcome::Uploaded { url, files },
        None => UploadOutcome::Nothing,
    })
}

/// Create `item` under the namespace. On conflict either create it again
/// under a suffixed name, or update the existing file with its current sha.
/// A second conflict in either branch is returned as an error.
pub fn create_or_update(
    store: &dyn RemoteStore,
    item: &UploadItem,
    options: &UploadOptions<'_>,
    suffix: &mut dyn FnMut() -> String,
) -> Result<RemoteFileRef> {
    let name = item.name();
    let content = item
        .read_bytes()
        .with_context(|| format!("Failed to read {name}"))?;
    let path = namespace::join(options.namespace, &name);

    match store.create_file(&path, options.message, &content) {
        Ok(created) => {
            tracing::info!(path = %created.path, "created");
            Ok(created)
        }
        Err(StoreError::Conflict(_)) if options.force_new => {
            let renamed = format!("{}_{}{}", item.stem(), suffix(), item.extension());
            ui::warn(&format!("{name} already exists. Creating as {renamed}."));
            let path = namespace::join(options.namespace, &renamed);
            store
                .create_file(&path, options.message, &content)
                .with_context(|| format!("Failed to create {path}"))
        }
        Err(StoreError::Conflict(_)) => {
            let current = store
                .read_file(&path)
                .with_context(|| format!("Failed to fetch {path}"))?;
            ui::warn(&format!("{name} already exists. Updating it."));
            store
                .update_file(&path, options.message, &content, &current.reference.sha)
                .with_context(|| format!("Failed to update {path}"))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to create {path}")),
    }
}

/// One file reports its own URL, several report their common parent.
pub fn reportable_url(files: &[RemoteFileRef]) -> Option<String> {
    let last = files.last()?;
    if files.len() == 1 {
        return Some(last.html_url.clone());
    }
    let parent = last
        .html_url
        .rsplit_once('/')
        .map(|(parent, _)| parent)
        .unwrap_or("");
    Some(parent.to_string())
}

/// Rewrite a blob/tree URL to the repository's GitHub Pages site.
pub fn pages_url(url: &str, repo: &RepoInfo) -> String {
    let content = ["blob", "tree"]
        .iter()
        .find_map(|kind| {
            let marker = format!("/{kind}/{}", repo.default_branch);
            let (_, rest) = url.split_once(&marker)?;
            if rest.is_empty() {
                Some(rest)
            } else {
                rest.strip_prefix('/')
            }
        })
        .unwrap_or("");
    format!(
        "https://{}.github.io/{}/{}",
        repo.owner.to_lowercase(),
        repo.name,
        content
    )
}

/// Final status line of an upload. The URL is rewritten to the Pages site
/// when `pages` is given and copied to the clipboard when `copy_url` is set.
/// A failed copy only drops the clipboard marker.
pub fn report(
    outcome: &UploadOutcome,
    clipboard: &dyn Clipboard,
    copy_url: bool,
    pages: Option<&RepoInfo>,
) -> String {
    let url = match (outcome, pages) {
        (UploadOutcome::Nothing, _) => return ui::nothing_uploaded_line(),
        (UploadOutcome::Uploaded { url, .. }, Some(repo)) => pages_url(url, repo),
        (UploadOutcome::Uploaded { url, .. }, None) => url.clone(),
    };
    let copied = copy_url
        && match clipboard.copy(&url) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "URL not copied");
                false
            }
        };
    ui::uploaded_line(&url, copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::ClipboardUnavailable;
    use crate::store::{MockRemoteStore, RemoteFile};
    use mockall::Sequence;
    use std::cell::RefCell;

    /// Remembers the last copied text; `None` makes every copy fail.
    struct RecordingClipboard(Option<RefCell<Vec<String>>>);

    impl RecordingClipboard {
        fn working() -> Self {
            RecordingClipboard(Some(RefCell::new(Vec::new())))
        }

        fn copied(&self) -> Vec<String> {
            self.0.as_ref().map(|c| c.borrow().clone()).unwrap_or_default()
        }
    }

    impl Clipboard for RecordingClipboard {
        fn paste(&self) -> Result<Vec<u8>, ClipboardUnavailable> {
            Err(ClipboardUnavailable("write only".into()))
        }

        fn copy(&self, text: &str) -> Result<(), ClipboardUnavailable> {
            match &self.0 {
                Some(copied) => {
                    copied.borrow_mut().push(text.to_string());
                    Ok(())
                }
                None => Err(ClipboardUnavailable("no display".into())),
            }
        }
    }

    fn uploaded(url: &str) -> UploadOutcome {
        UploadOutcome::Uploaded {
            url: url.into(),
            files: vec![file_ref("messi/hello.md", url)],
        }
    }

    fn shiphero() -> RepoInfo {
        RepoInfo {
            owner: "Shiphero".into(),
            name: "pastebin".into(),
            default_branch: "main".into(),
        }
    }

    fn file_ref(path: &str, url: &str) -> RemoteFileRef {
        RemoteFileRef {
            repository: "messi/pastebin".into(),
            path: path.into(),
            sha: "sha".into(),
            html_url: url.into(),
        }
    }

    fn options(force_new: bool) -> UploadOptions<'static> {
        UploadOptions {
            namespace: "messi",
            message: "",
            force_new,
        }
    }

    fn no_suffix() -> String {
        panic!("suffix must not be generated without a conflict")
    }

    #[test]
    fn single_file_reports_its_url() {
        let mut store = MockRemoteStore::new();
        store
            .expect_create_file()
            .withf(|path, message, content| {
                path == "messi/hello.py" && message.is_empty() && content == b"print(\"hi\")"
            })
            .times(1)
            .returning(|path, _, _| Ok(file_ref(path, "https://the-url")));

        let items = [UploadItem::in_memory("hello.py", b"print(\"hi\")".to_vec())];
        let outcome = upload_all(&store, &items, &options(false), &mut no_suffix).unwrap();

        match outcome {
            UploadOutcome::Uploaded { url, files } => {
                assert_eq!(url, "https://the-url");
                assert_eq!(files.len(), 1);
            }
            UploadOutcome::Nothing => panic!("expected an upload"),
        }
    }

    #[test]
    fn conflict_reads_sha_once_then_updates() {
        let mut store = MockRemoteStore::new();
        let mut seq = Sequence::new();
        store
            .expect_create_file()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|path, _, _| Err(StoreError::Conflict(path.to_string())));
        store
            .expect_read_file()
            .withf(|path| path == "messi/hello.py")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|path| {
                Ok(RemoteFile {
                    reference: RemoteFileRef {
                        sha: "abc123".into(),
                        ..file_ref(path, "https://the-url")
                    },
                    content: b"old".to_vec(),
                })
            });
        store
            .expect_update_file()
            .withf(|path, message, content, sha| {
                path == "messi/hello.py" && message.is_empty() && content == b"hello" && sha == "abc123"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|path, _, _, _| Ok(file_ref(path, "https://the-url-updated")));

        let item = UploadItem::in_memory("hello.py", b"hello".to_vec());
        let updated = create_or_update(&store, &item, &options(false), &mut no_suffix).unwrap();
        assert_eq!(updated.html_url, "https://the-url-updated");
    }

    #[test]
    fn stale_sha_on_update_is_fatal() {
        let mut store = MockRemoteStore::new();
        store
            .expect_create_file()
            .returning(|path, _, _| Err(StoreError::Conflict(path.to_string())));
        store.expect_read_file().times(1).returning(|path| {
            Ok(RemoteFile {
                reference: file_ref(path, ""),
                content: Vec::new(),
            })
        });
        store
            .expect_update_file()
            .times(1)
            .returning(|path, _, _, _| Err(StoreError::Conflict(path.to_string())));

        let item = UploadItem::in_memory("hello.py", b"hello".to_vec());
        let err = create_or_update(&store, &item, &options(false), &mut no_suffix).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn force_new_renames_after_conflict() {
        let mut store = MockRemoteStore::new();
        store
            .expect_create_file()
            .withf(|path, _, _| path == "messi/hello.md")
            .times(1)
            .returning(|path, _, _| Err(StoreError::Conflict(path.to_string())));
        store
            .expect_create_file()
            .withf(|path, _, content| path == "messi/hello_abc.md" && content == b"hello")
            .times(1)
            .returning(|path, _, _| Ok(file_ref(path, "https://the-url-2")));
        store.expect_read_file().never();
        store.expect_update_file().never();

        let mut generated = 0;
        let mut suffix = || {
            generated += 1;
            "abc".to_string()
        };
        let item = UploadItem::in_memory("hello.md", b"hello".to_vec());
        let created = create_or_update(&store, &item, &options(true), &mut suffix).unwrap();

        assert_eq!(created.html_url, "https://the-url-2");
        assert_eq!(generated, 1);
    }

    #[test]
    fn force_new_second_conflict_propagates() {
        let mut store = MockRemoteStore::new();
        store
            .expect_create_file()
            .times(2)
            .returning(|path, _, _| Err(StoreError::Conflict(path.to_string())));

        let item = UploadItem::in_memory("hello.md", b"hello".to_vec());
        let result = create_or_update(&store, &item, &options(true), &mut || "abc".to_string());
        assert!(result.is_err());
    }

    #[test]
    fn other_errors_are_not_treated_as_conflicts() {
        let mut store = MockRemoteStore::new();
        store.expect_create_file().times(1).returning(|_, _, _| {
            Err(StoreError::Api {
                status: 401,
                message: "Bad credentials".into(),
            })
        });
        store.expect_read_file().never();

        let item = UploadItem::in_memory("hello.md", b"hello".to_vec());
        let err = create_or_update(&store, &item, &options(false), &mut no_suffix).unwrap_err();
        assert!(format!("{err:#}").contains("Bad credentials"));
    }

    #[test]
    fn nothing_to_upload_is_a_no_op() {
        let store = MockRemoteStore::new();
        let outcome = upload_all(&store, &[], &options(false), &mut no_suffix).unwrap();
        assert_eq!(outcome, UploadOutcome::Nothing);
    }

    #[test]
    fn several_files_report_the_parent_url() {
        let mut store = MockRemoteStore::new();
        store.expect_create_file().times(2).returning(|path, message, _| {
            assert_eq!(message, "hello and bye");
            Ok(file_ref(
                path,
                &format!("https://github.com/messi/pastebin/blob/main/{path}"),
            ))
        });

        let items = [
            UploadItem::in_memory("hello.md", b"hello".to_vec()),
            UploadItem::in_memory("bye.md", b"bye".to_vec()),
        ];
        let opts = UploadOptions {
            message: "hello and bye",
            ..options(false)
        };
        let outcome = upload_all(&store, &items, &opts, &mut no_suffix).unwrap();
        match outcome {
            UploadOutcome::Uploaded { url, .. } => {
                assert_eq!(url, "https://github.com/messi/pastebin/blob/main/messi")
            }
            UploadOutcome::Nothing => panic!("expected an upload"),
        }
    }

    #[test]
    fn pages_link_rewrites_host_and_branch() {
        assert_eq!(
            pages_url(
                "https://github.com/Shiphero/pastebin/blob/main/messi/report.html",
                &shiphero()
            ),
            "https://shiphero.github.io/pastebin/messi/report.html"
        );
    }

    #[test]
    fn pages_link_ignores_branch_name_inside_repo_name() {
        let repo = RepoInfo {
            owner: "acme".into(),
            name: "domain".into(),
            default_branch: "main".into(),
        };
        assert_eq!(
            pages_url("https://github.com/acme/domain/blob/main/messi/a.html", &repo),
            "https://acme.github.io/domain/messi/a.html"
        );
        assert_eq!(
            pages_url("https://github.com/acme/domain/tree/main/messi", &repo),
            "https://acme.github.io/domain/messi"
        );
    }

    #[test]
    fn report_copies_the_url_when_enabled() {
        let clipboard = RecordingClipboard::working();
        let line = report(&uploaded("https://the-url"), &clipboard, true, None);
        assert_eq!(line, "🔗📋 https://the-url");
        assert_eq!(clipboard.copied(), vec!["https://the-url"]);
    }

    #[test]
    fn report_leaves_the_clipboard_alone_when_disabled() {
        let clipboard = RecordingClipboard::working();
        let line = report(&uploaded("https://the-url"), &clipboard, false, None);
        assert_eq!(line, "🔗 https://the-url");
        assert!(clipboard.copied().is_empty());
    }

    #[test]
    fn report_ignores_a_failed_copy() {
        let clipboard = RecordingClipboard(None);
        let line = report(&uploaded("https://the-url"), &clipboard, true, None);
        assert_eq!(line, "🔗 https://the-url");
    }

    #[test]
    fn report_copies_the_pages_link() {
        let clipboard = RecordingClipboard::working();
        let outcome = uploaded("https://github.com/Shiphero/pastebin/blob/main/messi/report.html");
        let line = report(&outcome, &clipboard, true, Some(&shiphero()));
        assert_eq!(line, "🔗📋 https://shiphero.github.io/pastebin/messi/report.html");
        assert_eq!(
            clipboard.copied(),
            vec!["https://shiphero.github.io/pastebin/messi/report.html"]
        );
    }

    #[test]
    fn report_says_when_nothing_was_uploaded() {
        let clipboard = RecordingClipboard::working();
        let line = report(&UploadOutcome::Nothing, &clipboard, true, Some(&shiphero()));
        assert!(line.contains("no file was uploaded"));
        assert!(clipboard.copied().is_empty());
    }
}
