// `shbin run`: execute an uploaded script on GitHub Actions.
// - The workflow (see `assets/shbin-run.yml`) receives `path`, `command`
//   and `identity` inputs, runs the script, commits its output to
//   `<identity>/<path>_run_<run-id>/output.txt` and echoes `RUN_SENTINEL`
//   on a line of its own.
// - Here we dispatch it, wait for the run and its job, stream the job log
//   until the sentinel shows up, wait for completion and print the
//   committed output.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::{RunError, StoreError, UsageError};
use crate::poll::Poller;
use crate::store::{Job, RemoteStore, RunStatus, WorkflowRunner};

pub const RUN_SENTINEL: &str = "::shbin-run-complete::";
pub const AUTO_COMMAND: &str = "auto";
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

const INTERPRETERS: &[(&str, &str)] = &[
    ("py", "python"),
    ("sh", "bash"),
    ("bash", "bash"),
    ("js", "node"),
    ("mjs", "node"),
    ("rb", "ruby"),
    ("pl", "perl"),
    ("php", "php"),
    ("r", "Rscript"),
    ("R", "Rscript"),
    ("lua", "lua"),
    ("ts", "deno run"),
];

/// `auto` picks the interpreter from the file extension, anything else is
/// used as given.
pub fn resolve_command(command: &str, path: &str) -> Result<String, UsageError> {
    if command != AUTO_COMMAND {
        return Ok(command.to_string());
    }
    let extension = Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .ok_or_else(|| {
            UsageError::new(format!(
                "{path} has no extension, pass --command explicitly"
            ))
        })?;
    INTERPRETERS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, interpreter)| interpreter.to_string())
        .ok_or_else(|| {
            UsageError::new(format!(
                "don't know how to run '.{extension}' files, pass --command explicitly"
            ))
        })
}

pub fn result_path(identity: &str, path: &str, run_id: u64) -> String {
    format!("{identity}/{path}_run_{run_id}/output.txt")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: u64,
    pub job_id: u64,
    pub status: RunStatus,
    pub log_url: String,
}

#[derive(Debug, Clone)]
pub struct RunRequest<'a> {
    pub path: &'a str,
    pub command: &'a str,
    pub git_ref: &'a str,
    pub identity: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub handle: RunHandle,
    pub output: String,
}

/// Strip the timestamp GitHub prefixes to every log line.
fn log_message(line: &str) -> &str {
    match line.split_once(' ') {
        Some((stamp, rest)) if stamp.ends_with('Z') && stamp.contains('T') => rest,
        _ => line,
    }
}

fn is_sentinel(line: &str) -> bool {
    log_message(line).trim() == RUN_SENTINEL
}

/// Incremental reader over a job log that is re-fetched as a whole.
#[derive(Debug, Default)]
pub struct LogCursor {
    emitted: usize,
}

impl LogCursor {
    /// Feed the full log text; returns the complete lines not seen before,
    /// stopping before the sentinel, and whether the sentinel was reached.
    pub fn advance<'t>(&mut self, text: &'t str) -> (Vec<&'t str>, bool) {
        let complete = match text.rfind('\n') {
            Some(end) => &text[..=end],
            None => "",
        };
        let mut fresh = Vec::new();
        for line in complete.lines().skip(self.emitted) {
            self.emitted += 1;
            if is_sentinel(line) {
                return (fresh, true);
            }
            fresh.push(line);
        }
        (fresh, false)
    }
}

fn timeout(poller: &Poller<'_>) -> anyhow::Error {
    RunError::Timeout(poller.waited().as_secs()).into()
}

/// Dispatch the workflow and follow it to completion.
pub fn run_remote(
    store: &dyn RemoteStore,
    runner: &dyn WorkflowRunner,
    request: &RunRequest<'_>,
    poller: &mut Poller<'_>,
    on_line: &mut dyn FnMut(&str),
) -> Result<RunOutcome> {
    let previous = runner
        .latest_run()
        .context("Failed to list workflow runs")?
        .map(|run| run.id);
    runner
        .dispatch(request.git_ref, request.path, request.command, request.identity)
        .context("Failed to dispatch the workflow")?;
    tracing::info!(path = request.path, command = request.command, "workflow dispatched");

    let run = loop {
        match runner.latest_run()? {
            Some(run) if Some(run.id) != previous && run.status != RunStatus::Queued => break run,
            _ => {}
        }
        if !poller.wait() {
            return Err(timeout(poller));
        }
    };

    let job = loop {
        if let Some(job) = runner.first_job(run.id)? {
            break job;
        }
        if run.status == RunStatus::Completed {
            return Err(RunError::NoJob(run.id).into());
        }
        if !poller.wait() {
            return Err(timeout(poller));
        }
    };
    tracing::info!(run_id = run.id, job_id = job.id, "following job");

    let mut cursor = LogCursor::default();
    loop {
        let text = match runner.job_logs(job.id) {
            Ok(text) => text,
            Err(StoreError::NotFound(_)) => String::new(),
            Err(e) => return Err(e).context("Failed to fetch job logs"),
        };
        let (lines, done) = cursor.advance(&text);
        for line in lines {
            on_line(line);
        }
        if done {
            break;
        }
        // A failing job never prints the sentinel.
        if runner.job(job.id)?.status == RunStatus::Completed {
            break;
        }
        if !poller.wait() {
            return Err(timeout(poller));
        }
    }

    let job: Job = loop {
        let current = runner.job(job.id)?;
        if current.status == RunStatus::Completed {
            break current;
        }
        if !poller.wait() {
            return Err(timeout(poller));
        }
    };

    let output_path = result_path(request.identity, request.path, run.id);
    let output = store
        .read_file(&output_path)
        .with_context(|| format!("Failed to fetch run output {output_path}"))?;

    Ok(RunOutcome {
        handle: RunHandle {
            run_id: run.id,
            job_id: job.id,
            status: job.status,
            log_url: job.html_url,
        },
        output: String::from_utf8_lossy(&output.content).into_owned(),
    })
}
