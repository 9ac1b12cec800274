//! Google API clients (Gmail v1, Calendar v3) over plain reqwest, plus the
//! OAuth2 token handling they share.

pub mod auth;
pub mod calendar;
pub mod gmail;

use anyhow::{Context, Result};
use std::time::Duration;

pub use auth::{GoogleAuth, OAuthToken, TokenProvider};

/// OAuth2 scopes requested for the installed-app client.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.compose",
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/calendar.readonly",
];

pub fn build_http_client(timeout_secs: Option<u64>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent("socialbot/0.1.0");
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().context("failed to build reqwest client")
}

/// Turn a non-2xx response into an error carrying status and body.
pub(crate) async fn ensure_success(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("{} failed with status {}: {}", what, status, body)
}
