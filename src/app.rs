// Command wiring: builds the real clients from the resolved settings and
// hands them to the orchestrators. Everything below this layer receives
// its collaborators explicitly.

use std::env;
use std::io;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::api::GitHubClient;
use crate::auth::{self, GitHubDeviceFlow};
use crate::cli::{Cli, Command, DownloadArgs, RunArgs, UploadArgs};
use crate::clipboard::SystemClipboard;
use crate::config::{self, Settings};
use crate::download::{self, DownloadOutcome};
use crate::error::UsageError;
use crate::namespace;
use crate::poll::{self, Poller};
use crate::run::{self, RunRequest};
use crate::source::{self, Sources};
use crate::ui;
use crate::upload::{self, UploadOptions, UploadOutcome};

pub fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Upload(args) => upload_command(&args),
        Command::Download(args) => download_command(&args),
        Command::Run(args) => run_command(&args),
        Command::Auth => auth_command(),
    }
}

/// Login used for `{user}` and the namespace fallback.
fn identity(settings: &Settings, client: &GitHubClient) -> Result<String> {
    if let Some(user) = &settings.user {
        return Ok(user.clone());
    }
    client.authenticated_user().map_err(|e| {
        UsageError::new(format!(
            "Could not resolve your GitHub login ({e}). Check {} or set {}.",
            config::ENV_TOKEN,
            config::ENV_USER
        ))
        .into()
    })
}

fn upload_command(args: &UploadArgs) -> Result<()> {
    let source = args.source()?;
    let settings = Settings::load()?;
    let client = GitHubClient::new(&settings)?;
    let identity = identity(&settings, &client)?;
    let namespace = namespace::resolve(
        args.namespace.as_deref(),
        &identity,
        args.target_dir.as_deref(),
    );
    tracing::info!(repo = client.repo(), %namespace, "uploading");

    let clipboard = SystemClipboard;
    let mut stdin = io::stdin().lock();
    let mut token = source::url_safe_token;
    let mut sources = Sources {
        cwd: env::current_dir().context("Failed to read the current directory")?,
        clipboard: &clipboard,
        stdin: &mut stdin,
        token: &mut token,
    };
    let items = sources.resolve(&source, args.file_name.as_deref())?;

    let options = UploadOptions {
        namespace: &namespace,
        message: &args.message,
        force_new: args.new,
    };
    let outcome = upload::upload_all(&client, &items, &options, &mut source::url_safe_token)?;
    let pages = match outcome {
        UploadOutcome::Uploaded { .. } if args.link_to_pages => Some(client.repository()?),
        _ => None,
    };
    ui::info(&upload::report(
        &outcome,
        &clipboard,
        settings.copy_url,
        pages.as_ref(),
    ));
    Ok(())
}

fn download_command(args: &DownloadArgs) -> Result<()> {
    let settings = Settings::load()?;
    let client = GitHubClient::new(&settings)?;
    let identity = identity(&settings, &client)?;
    let repo = client.repository()?;
    let path = download::normalize_path(&args.url_or_path, &settings.web_url, &repo);
    let dest = env::current_dir().context("Failed to read the current directory")?;

    match download::download(&client, &path, &identity, &dest)? {
        DownloadOutcome::Downloaded(files) if files.is_empty() => {
            ui::info(&format!("{path} is empty"))
        }
        DownloadOutcome::Downloaded(files) => {
            for file in files {
                let name = file.file_name().unwrap_or(file.as_os_str());
                ui::success(&format!("downloaded {}", name.to_string_lossy()));
            }
        }
        DownloadOutcome::NotFound => ui::failure("content not found"),
    }
    Ok(())
}

fn run_command(args: &RunArgs) -> Result<()> {
    let command = run::resolve_command(&args.command, args.url_or_path.trim_end_matches('/'))?;
    let settings = Settings::load()?;
    let client = GitHubClient::new(&settings)?;
    let identity = identity(&settings, &client)?;
    let repo = client.repository()?;
    let path = download::normalize_path(&args.url_or_path, &settings.web_url, &repo);

    let request = RunRequest {
        path: &path,
        command: &command,
        git_ref: &repo.default_branch,
        identity: &identity,
    };
    let spinner = if args.logs {
        None
    } else {
        Some(ui::spinner(&format!("Running {path} with {command}..."))?)
    };
    let mut sleep = poll::thread_sleep;
    let mut poller = Poller::new(
        run::POLL_INTERVAL,
        args.timeout.map(Duration::from_secs),
        &mut sleep,
    );
    let mut on_line = |line: &str| {
        if args.logs {
            println!("{line}");
        }
    };

    let outcome = run::run_remote(&client, &client, &request, &mut poller, &mut on_line);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let outcome = outcome?;

    ui::success(&format!(
        "run {} finished: {}",
        outcome.handle.run_id, outcome.handle.log_url
    ));
    print!("{}", outcome.output);
    Ok(())
}

fn auth_command() -> Result<()> {
    let web_url = env::var(config::ENV_WEB_URL).unwrap_or_else(|_| config::DEFAULT_WEB_URL.into());
    let client_id =
        env::var(config::ENV_CLIENT_ID).unwrap_or_else(|_| auth::DEFAULT_CLIENT_ID.into());
    let flow = GitHubDeviceFlow::new(&web_url, &client_id)?;
    auth::authenticate(&flow, &SystemClipboard, &config::config_path()?)
}
