// UI layer: terminal output and prompts.
// User-facing status lines live here; diagnostics go through `tracing`.

use std::time::Duration;

use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};

/// `✓ <msg>` on stdout.
pub fn success(msg: &str) {
    println!("{} {msg}", "✓".green());
}

/// `x <msg>` on stdout.
pub fn failure(msg: &str) {
    println!("{} {msg}", "x".red());
}

pub fn info(msg: &str) {
    println!("{msg}");
}

/// `warning: <msg>` on stderr.
pub fn warn(msg: &str) {
    eprintln!("{} {msg}", "warning:".yellow().bold());
}

pub fn error(msg: &str) {
    eprintln!("{} {msg}", "error:".red().bold());
}

/// The final line of an upload: link emoji, clipboard emoji if copied.
pub fn uploaded_line(url: &str, copied: bool) -> String {
    let emoji = if copied { "🔗📋" } else { "🔗" };
    format!("{emoji} {url}")
}

pub fn nothing_uploaded_line() -> String {
    format!("🤷 {}", "no file was uploaded".bold())
}

pub fn device_code_prompt(user_code: &str, copied: bool) {
    let copied = if copied { " (already copied 📋!) " } else { " " };
    println!(
        "You will be redirected to GitHub now.\nWhen asked, paste the{copied}code:\n {}",
        user_code.yellow()
    );
}

/// Ask which repository to use as the pastebin.
pub fn prompt_repo() -> Result<String> {
    let repo: String = Input::new()
        .with_prompt("Which repo do you want to use as your 'pastebin'? (ex: myorg/pastebin)")
        .validate_with(|input: &String| -> Result<(), &str> {
            match input.trim().split_once('/') {
                Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok(()),
                _ => Err("expected owner/name"),
            }
        })
        .interact_text()?;
    Ok(repo.trim().to_string())
}

/// Spinner shown while waiting on remote work; hidden when stderr is not a
/// terminal.
pub fn spinner(msg: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    Ok(spinner)
}
