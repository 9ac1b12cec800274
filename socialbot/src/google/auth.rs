//! OAuth2 for the installed-app flow.
//!
//! A cached token file is used when one can be read (refreshing it when it
//! has expired); otherwise the user is sent to the consent page and asked to
//! paste the authorization code on stdin. Either way the resulting token is
//! written back to the cache file.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::SCOPES;
use crate::error::AssistantError;

/// Token as cached on disk (`access_token`, `token_type`, `refresh_token`, `expiry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuthToken {
    /// Expired, or about to be within the next minute.
    ///
    /// A missing expiry, or the year-1 zero time some writers emit, means the
    /// token never expires.
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) if expiry.year() > 1 => expiry <= Utc::now() + Duration::seconds(60),
            _ => false,
        }
    }
}

/// Client secret file as downloaded from the cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecretFile {
    #[serde(default)]
    pub installed: Option<OAuthClient>,
    #[serde(default)]
    pub web: Option<OAuthClient>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub auth_uri: String,
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

impl OAuthClient {
    pub async fn load(path: &Path) -> Result<Self> {
        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| {
                AssistantError::Config(format!(
                    "unable to read client secret file {}: {}",
                    path.display(),
                    e
                ))
            })?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let file: ClientSecretFile = serde_json::from_str(data).map_err(|e| {
            AssistantError::Config(format!("unable to parse client secret file to config: {}", e))
        })?;
        file.installed.or(file.web).ok_or_else(|| {
            AssistantError::Config(
                "client secret file has neither an \"installed\" nor a \"web\" section".into(),
            )
            .into()
        })
    }

    fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or("http://localhost")
    }

    /// Consent page URL requesting offline access for [`SCOPES`].
    pub fn authorization_url(&self) -> Result<String> {
        let url = url::Url::parse_with_params(
            &self.auth_uri,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri()),
                ("response_type", "code"),
                ("scope", SCOPES.join(" ").as_str()),
                ("access_type", "offline"),
                ("state", "state-token"),
            ],
        )
        .with_context(|| format!("invalid auth_uri: {}", self.auth_uri))?;
        Ok(url.into())
    }

    /// Exchange an authorization code for a token.
    pub async fn exchange_code(&self, http: &reqwest::Client, code: &str) -> Result<OAuthToken> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri()),
        ];
        if let Some(secret) = self.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let body = self.post_token_endpoint(http, &form).await
            .context("unable to retrieve token from web")?;
        Ok(body.into_token(None))
    }

    /// Use the refresh token to obtain a new access token.
    pub async fn refresh(&self, http: &reqwest::Client, token: &OAuthToken) -> Result<OAuthToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .context("token expired and has no refresh token")?;

        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(secret) = self.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let body = self.post_token_endpoint(http, &form).await
            .context("token refresh failed")?;
        Ok(body.into_token(token.refresh_token.clone()))
    }

    async fn post_token_endpoint(
        &self,
        http: &reqwest::Client,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse> {
        let response = http
            .post(&self.token_uri)
            .form(form)
            .send()
            .await
            .context("token endpoint request failed")?;
        let response = super::ensure_success(response, "token endpoint").await?;
        response
            .json::<TokenResponse>()
            .await
            .context("failed to parse token response")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    /// Refresh responses usually omit the refresh token; keep the previous one.
    fn into_token(self, previous_refresh: Option<String>) -> OAuthToken {
        OAuthToken {
            access_token: self.access_token,
            token_type: self.token_type.unwrap_or_else(default_token_type),
            refresh_token: self.refresh_token.or(previous_refresh),
            expiry: self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

/// Source of a usable access token.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<OAuthToken>;
}

/// Read a cached token. Any read or parse failure means "no cached token".
pub async fn read_cached_token(path: &Path) -> Option<OAuthToken> {
    let data = match tokio::fs::read_to_string(path).await {
        Ok(data) => data,
        Err(e) => {
            debug!(path = %path.display(), "no cached token: {}", e);
            return None;
        }
    };
    match serde_json::from_str(&data) {
        Ok(token) => Some(token),
        Err(e) => {
            debug!(path = %path.display(), "unreadable cached token: {}", e);
            None
        }
    }
}

/// Write the token, creating or truncating the file (mode 0600 on unix).
pub async fn save_token(path: &Path, token: &OAuthToken) -> Result<()> {
    let json = serde_json::to_vec_pretty(token).context("failed to serialize token")?;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options
        .open(path)
        .await
        .with_context(|| format!("unable to cache oauth token at {}", path.display()))?;
    file.write_all(&json)
        .await
        .with_context(|| format!("unable to cache oauth token at {}", path.display()))?;
    file.flush().await?;
    info!(path = %path.display(), "oauth token cached");
    Ok(())
}

/// Token from the cache file, refreshed when expired.
pub struct CachedTokenProvider {
    client: OAuthClient,
    token_path: PathBuf,
    cached: OAuthToken,
    http: reqwest::Client,
}

impl CachedTokenProvider {
    pub fn new(client: OAuthClient, token_path: PathBuf, cached: OAuthToken, http: reqwest::Client) -> Self {
        Self { client, token_path, cached, http }
    }
}

#[async_trait::async_trait]
impl TokenProvider for CachedTokenProvider {
    async fn token(&self) -> Result<OAuthToken> {
        if !self.cached.is_expired() {
            return Ok(self.cached.clone());
        }
        info!("cached oauth token expired, refreshing");
        let refreshed = self.client.refresh(&self.http, &self.cached).await?;
        save_token(&self.token_path, &refreshed).await?;
        Ok(refreshed)
    }
}

/// Authorization-code flow on stdin/stdout.
pub struct InteractiveTokenProvider {
    client: OAuthClient,
    token_path: PathBuf,
    http: reqwest::Client,
}

impl InteractiveTokenProvider {
    pub fn new(client: OAuthClient, token_path: PathBuf, http: reqwest::Client) -> Self {
        Self { client, token_path, http }
    }
}

#[async_trait::async_trait]
impl TokenProvider for InteractiveTokenProvider {
    async fn token(&self) -> Result<OAuthToken> {
        let auth_url = self.client.authorization_url()?;

        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(
                format!(
                    "Go to the following link in your browser: \n{}\nEnter the authorization code: ",
                    auth_url
                )
                .as_bytes(),
            )
            .await?;
        stdout.flush().await?;

        let mut stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let code = read_auth_code(&mut stdin).await?;

        let token = self.client.exchange_code(&self.http, &code).await?;
        save_token(&self.token_path, &token).await?;
        Ok(token)
    }
}

/// First non-blank line of input, trimmed.
pub async fn read_auth_code<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .await
            .context("unable to read authorization code")?;
        if n == 0 {
            anyhow::bail!("unable to read authorization code: end of input");
        }
        let code = line.trim();
        if !code.is_empty() {
            return Ok(code.to_string());
        }
    }
}

/// Lazily picks the cached or interactive provider on first use and keeps the
/// token for the rest of the process.
pub struct GoogleAuth {
    credentials_path: PathBuf,
    token_path: PathBuf,
    http: reqwest::Client,
    current: Mutex<Option<OAuthToken>>,
}

impl GoogleAuth {
    pub fn new(credentials_path: PathBuf, token_path: PathBuf, http: reqwest::Client) -> Self {
        Self {
            credentials_path,
            token_path,
            http,
            current: Mutex::new(None),
        }
    }

    async fn select_provider(&self) -> Result<Box<dyn TokenProvider>> {
        let client = OAuthClient::load(&self.credentials_path).await?;
        match read_cached_token(&self.token_path).await {
            Some(cached) => Ok(Box::new(CachedTokenProvider::new(
                client,
                self.token_path.clone(),
                cached,
                self.http.clone(),
            ))),
            None => Ok(Box::new(InteractiveTokenProvider::new(
                client,
                self.token_path.clone(),
                self.http.clone(),
            ))),
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for GoogleAuth {
    async fn token(&self) -> Result<OAuthToken> {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.clone());
        }
        let token = self.select_provider().await?.token().await?;
        *current = Some(token.clone());
        Ok(token)
    }
}
