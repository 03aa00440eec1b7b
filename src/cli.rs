// Command line definition.
// - Subcommands and flags via clap derive; `UploadArgs::source` turns the
//   parsed upload input into an `UploadSource`.

use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};

use crate::config::ENV_NAMESPACE;
use crate::error::UsageError;
use crate::run::AUTO_COMMAND;
use crate::source::UploadSource;

/// Marker for reading the content from standard input.
pub const STDIN_MARKER: &str = "-";

/// Turn a GitHub repository into a personal pastebin.
///
/// Uploads files, clipboard content or standard input to the repository
/// configured with SHBIN_REPO and prints (and copies) the resulting URL.
#[derive(Parser, Debug)]
#[command(name = "shbin", version, about, long_about)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). SHBIN_LOG overrides it.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload files, clipboard content or stdin.
    #[command(visible_alias = "up")]
    Upload(UploadArgs),

    /// Download a file or a whole directory.
    #[command(visible_alias = "dl")]
    Download(DownloadArgs),

    /// Run an uploaded script on GitHub Actions and print its output.
    Run(RunArgs),

    /// Get a token through the GitHub device flow and choose the repository.
    Auth,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
#[command(group(ArgGroup::new("input").required(true).args(["paths", "from_clipboard"])))]
pub struct UploadArgs {
    /// Files or glob patterns to upload, or `-` for stdin.
    pub paths: Vec<String>,

    /// Paste content from the clipboard instead of files.
    #[arg(short = 'x', long)]
    pub from_clipboard: bool,

    /// Name for the uploaded content.
    #[arg(short = 'f', long, value_name = "FILE_NAME")]
    pub file_name: Option<String>,

    /// Create a new file if the given one already exists.
    #[arg(short = 'n', long)]
    pub new: bool,

    /// Commit message.
    #[arg(short = 'm', long, default_value = "")]
    pub message: String,

    /// Optional (sub)directory to upload file/s to.
    #[arg(short = 'd', long, value_name = "TARGET_DIR")]
    pub target_dir: Option<String>,

    /// Base namespace to upload to; `{user}` is replaced by your login.
    #[arg(long, env = ENV_NAMESPACE, value_name = "NAMESPACE")]
    pub namespace: Option<String>,

    /// Reformat the URL to link to GitHub Pages.
    #[arg(short = 'p', long = "url-link-to-pages", visible_alias = "link-to-pages")]
    pub link_to_pages: bool,
}

impl UploadArgs {
    /// Which single input this invocation reads from.
    pub fn source(&self) -> Result<UploadSource, UsageError> {
        match (self.from_clipboard, self.paths.as_slice()) {
            (true, []) => Ok(UploadSource::Clipboard),
            (true, _) => Err(UsageError::new(
                "--from-clipboard cannot be combined with paths",
            )),
            (false, []) => Err(UsageError::new(
                "nothing to upload: pass paths, `-` or --from-clipboard",
            )),
            (false, [only]) if only == STDIN_MARKER => Ok(UploadSource::Stdin),
            (false, paths) if paths.iter().any(|p| p == STDIN_MARKER) => Err(UsageError::new(
                "`-` (stdin) cannot be combined with other paths",
            )),
            (false, paths) => Ok(UploadSource::Paths(paths.to_vec())),
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DownloadArgs {
    /// GitHub URL or repository path.
    pub url_or_path: String,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    /// GitHub URL or repository path of the script.
    pub url_or_path: String,

    /// Stream the job log while it runs.
    #[arg(short, long)]
    pub logs: bool,

    /// Interpreter command; `auto` picks one from the file extension.
    #[arg(short, long, default_value = AUTO_COMMAND)]
    pub command: String,

    /// Give up after this many seconds. Waits indefinitely when omitted.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("shbin").chain(args.iter().copied()))
    }

    fn upload(args: &[&str]) -> UploadArgs {
        match parse(args).unwrap().command {
            Command::Upload(upload) => upload,
            other => panic!("expected upload, got {other:?}"),
        }
    }

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn clipboard_and_paths_are_exclusive() {
        let err = parse(&["upload", "-x", "file1.py"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn upload_requires_an_input() {
        let err = parse(&["upload"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn sources_are_selected() {
        assert_eq!(upload(&["up", "-x"]).source().unwrap(), UploadSource::Clipboard);
        assert_eq!(upload(&["upload", "-"]).source().unwrap(), UploadSource::Stdin);
        assert_eq!(
            upload(&["upload", "*.md", "a.py"]).source().unwrap(),
            UploadSource::Paths(vec!["*.md".into(), "a.py".into()])
        );
        assert!(upload(&["upload", "-", "a.py"]).source().is_err());
    }

    #[test]
    fn upload_options() {
        let args = upload(&[
            "upload", "a.md", "-f", "b.md", "-n", "-m", "msg", "-d", "dir/", "--namespace", "goat/{user}", "-p",
        ]);
        assert_eq!(args.file_name.as_deref(), Some("b.md"));
        assert!(args.new);
        assert_eq!(args.message, "msg");
        assert_eq!(args.target_dir.as_deref(), Some("dir/"));
        assert_eq!(args.namespace.as_deref(), Some("goat/{user}"));
        assert!(args.link_to_pages);
    }

    #[test]
    fn download_alias() {
        match parse(&["dl", "https://github.com/a/b/blob/main/x.py"]).unwrap().command {
            Command::Download(args) => {
                assert_eq!(args.url_or_path, "https://github.com/a/b/blob/main/x.py")
            }
            other => panic!("expected download, got {other:?}"),
        }
    }

    #[test]
    fn run_defaults_to_auto() {
        match parse(&["run", "messi/hello.py", "--logs"]).unwrap().command {
            Command::Run(args) => {
                assert_eq!(args.command, "auto");
                assert!(args.logs);
                assert_eq!(args.timeout, None);
            }
            other => panic!("expected run, got {other:?}"),
        }
    }
}
