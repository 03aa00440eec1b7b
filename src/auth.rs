// OAuth device flow against GitHub, used by `shbin auth`.
// - `DeviceAuthorizer` is the seam over the two HTTP endpoints so the poll
//   loop can be tested with scripted responses.
// - `wait_for_token` keeps polling through `authorization_pending`, slows
//   down on `slow_down` and gives up once the code expires.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;

use crate::clipboard::Clipboard;
use crate::config;
use crate::error::AuthError;
use crate::poll::{self, Poller};
use crate::ui;

pub const DEFAULT_CLIENT_ID: &str = "Ov23liYdj3oj4CUOqEds";
pub const SCOPES: &str = "read:user repo workflow";
const DEVICE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Response of the device code endpoint.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Seconds between polls.
    pub interval: u64,
    /// Seconds until `device_code` expires.
    pub expires_in: u64,
}

/// One answer from the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenPoll {
    Granted(String),
    Pending,
    /// Carries the new interval when the provider sends one.
    SlowDown(Option<u64>),
    Failed(String),
}

#[derive(Deserialize, Debug, Default)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    interval: Option<u64>,
}

impl From<TokenResponse> for TokenPoll {
    fn from(res: TokenResponse) -> Self {
        match (res.access_token, res.error.as_deref()) {
            (Some(token), None) => TokenPoll::Granted(token),
            (_, Some("authorization_pending")) => TokenPoll::Pending,
            (_, Some("slow_down")) => TokenPoll::SlowDown(res.interval),
            (_, Some(error)) => TokenPoll::Failed(match res.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error.to_string(),
            }),
            (None, None) => TokenPoll::Failed("empty token response".to_string()),
        }
    }
}

pub trait DeviceAuthorizer {
    fn request_code(&self) -> Result<DeviceCode, AuthError>;
    fn poll_token(&self, device_code: &str) -> Result<TokenPoll, AuthError>;
}

/// The real endpoints under `<web_url>/login/...`.
pub struct GitHubDeviceFlow {
    client: Client,
    web_url: String,
    client_id: String,
}

impl GitHubDeviceFlow {
    pub fn new(web_url: &str, client_id: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("shbin/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(GitHubDeviceFlow {
            client,
            web_url: web_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
        })
    }
}

impl DeviceAuthorizer for GitHubDeviceFlow {
    fn request_code(&self) -> Result<DeviceCode, AuthError> {
        let url = format!("{}/login/device/code", self.web_url);
        let code = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .form(&[("client_id", self.client_id.as_str()), ("scope", SCOPES)])
            .send()?
            .error_for_status()?
            .json()?;
        Ok(code)
    }

    fn poll_token(&self, device_code: &str) -> Result<TokenPoll, AuthError> {
        let url = format!("{}/login/oauth/access_token", self.web_url);
        let res: TokenResponse = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("device_code", device_code),
                ("grant_type", DEVICE_GRANT),
            ])
            .send()?
            .error_for_status()?
            .json()?;
        Ok(res.into())
    }
}

/// Poll until the user authorizes, denies, or the code expires.
pub fn wait_for_token(
    authorizer: &dyn DeviceAuthorizer,
    code: &DeviceCode,
    sleep: &mut dyn FnMut(Duration),
) -> Result<String, AuthError> {
    let mut poller = Poller::new(
        Duration::from_secs(code.interval),
        Some(Duration::from_secs(code.expires_in)),
        sleep,
    );
    loop {
        if !poller.wait() {
            return Err(AuthError::Expired);
        }
        match authorizer.poll_token(&code.device_code)? {
            TokenPoll::Granted(token) => return Ok(token),
            TokenPoll::Pending => tracing::debug!("authorization pending"),
            TokenPoll::SlowDown(interval) => {
                let next = interval
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| poller.interval() + SLOW_DOWN_STEP);
                tracing::debug!(?next, "slowing down");
                poller.set_interval(next);
            }
            TokenPoll::Failed(reason) => return Err(AuthError::Denied(reason)),
        }
    }
}

/// Interactive `shbin auth`: get a token, ask for the repository and save
/// both to `config_path`.
pub fn authenticate(
    authorizer: &dyn DeviceAuthorizer,
    clipboard: &dyn Clipboard,
    config_path: &Path,
) -> Result<()> {
    let code = authorizer
        .request_code()
        .context("Failed to start the GitHub device flow")?;
    let copied = clipboard.copy(&code.user_code).is_ok();
    ui::device_code_prompt(&code.user_code, copied);

    std::thread::sleep(Duration::from_secs(2));
    if let Err(e) = open::that(&code.verification_uri) {
        tracing::warn!(error = %e, "could not open a browser");
        ui::info(&format!("Open {} in your browser", code.verification_uri));
    }

    let token = wait_for_token(authorizer, &code, &mut poll::thread_sleep)?;
    ui::success("Got access token.");

    let repo = ui::prompt_repo()?;
    config::store_credentials(config_path, &token, &repo)?;
    ui::success(&format!("All done! Saved to {}", config_path.display()));
    Ok(())
}
