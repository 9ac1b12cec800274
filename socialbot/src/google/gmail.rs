//! Gmail API v1: message search, header fetch, draft creation.

use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::{ensure_success, TokenProvider};

/// The headers of one message that interaction aggregation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawMessage {
    pub id: String,
    /// Raw `From` header (empty if absent)
    pub from: String,
    /// Raw `Date` header (empty if absent)
    pub date: String,
}

/// An unsent email to be stored as a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftEmail {
    pub subject: String,
    pub body: String,
    pub to: String,
}

#[async_trait::async_trait]
pub trait MailService: Send + Sync {
    /// Ids of the messages matching a Gmail search query.
    async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>>;

    async fn get_message(&self, id: &str) -> Result<RawMessage>;

    async fn create_draft(&self, draft: &DraftEmail) -> Result<()>;
}

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageStub>,
}

#[derive(Debug, Deserialize)]
struct MessageStub {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageDetail {
    #[serde(default)]
    id: String,
    #[serde(default)]
    payload: Option<MessagePayload>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Serialize)]
struct DraftRequest {
    message: DraftMessage,
}

#[derive(Debug, Serialize)]
struct DraftMessage {
    raw: String,
}

// ============================================================================
// Client
// ============================================================================

pub struct GmailClient {
    base_url: String,
    http: reqwest::Client,
    auth: Arc<dyn TokenProvider>,
}

impl GmailClient {
    /// `base_url` is the API root, e.g. `https://gmail.googleapis.com/gmail/v1`.
    pub fn new(base_url: impl Into<String>, http: reqwest::Client, auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            auth,
        }
    }

    async fn bearer(&self) -> Result<String> {
        Ok(self.auth.token().await?.access_token)
    }
}

#[async_trait::async_trait]
impl MailService for GmailClient {
    async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>> {
        let token = self.bearer().await?;
        let response = self
            .http
            .get(format!("{}/users/me/messages", self.base_url))
            .bearer_auth(token)
            .query(&[("q", query), ("maxResults", max_results.to_string().as_str())])
            .send()
            .await
            .context("Gmail list request failed")?;
        let response = ensure_success(response, "Gmail list messages").await?;

        let list: MessageListResponse = response
            .json()
            .await
            .context("failed to parse Gmail message list")?;
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn get_message(&self, id: &str) -> Result<RawMessage> {
        let token = self.bearer().await?;
        let response = self
            .http
            .get(format!("{}/users/me/messages/{}", self.base_url, id))
            .bearer_auth(token)
            .query(&[
                ("format", "metadata"),
                ("metadataHeaders", "From"),
                ("metadataHeaders", "Date"),
            ])
            .send()
            .await
            .with_context(|| format!("Gmail get request failed for {}", id))?;
        let response = ensure_success(response, "Gmail get message").await?;

        let detail: MessageDetail = response
            .json()
            .await
            .with_context(|| format!("failed to parse Gmail message {}", id))?;

        let headers = detail
            .payload
            .as_ref()
            .map(|p| &p.headers[..])
            .unwrap_or(&[]);
        let header = |name: &str| -> String {
            headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.clone())
                .unwrap_or_default()
        };

        Ok(RawMessage {
            id: if detail.id.is_empty() { id.to_string() } else { detail.id.clone() },
            from: header("From"),
            date: header("Date"),
        })
    }

    async fn create_draft(&self, draft: &DraftEmail) -> Result<()> {
        let token = self.bearer().await?;
        let request = DraftRequest {
            message: DraftMessage {
                raw: encode_raw_message(draft),
            },
        };

        let response = self
            .http
            .post(format!("{}/users/me/drafts", self.base_url))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .context("Gmail create draft request failed")?;
        ensure_success(response, "Gmail create draft").await?;

        info!("draft saved for {}", draft.to);
        Ok(())
    }
}

/// RFC 822 message text for a draft.
pub fn build_raw_message(draft: &DraftEmail) -> String {
    format!(
        "From: me\r\nTo: {}\r\nSubject: {}\r\nContent-Type: text/plain; charset=UTF-8\r\n\r\n{}",
        draft.to,
        encode_header_value(&draft.subject),
        draft.body
    )
}

/// URL-safe base64 of [`build_raw_message`], as the `raw` field expects.
pub fn encode_raw_message(draft: &DraftEmail) -> String {
    base64::engine::general_purpose::URL_SAFE.encode(build_raw_message(draft))
}

/// RFC 2047 encoded-word for non-ASCII header values.
fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!(
            "=?UTF-8?B?{}?=",
            base64::engine::general_purpose::STANDARD.encode(value)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(subject: &str) -> DraftEmail {
        DraftEmail {
            subject: subject.to_string(),
            body: "Hi Ann,\n\nCoffee next week?\n".to_string(),
            to: "ann@example.com".to_string(),
        }
    }

    #[test]
    fn raw_message_layout() {
        let raw = build_raw_message(&draft("Catching up"));
        assert_eq!(
            raw,
            "From: me\r\nTo: ann@example.com\r\nSubject: Catching up\r\n\
             Content-Type: text/plain; charset=UTF-8\r\n\r\nHi Ann,\n\nCoffee next week?\n"
        );
    }

    #[test]
    fn encoded_message_decodes_back() {
        let d = draft("Catching up");
        let bytes = base64::engine::general_purpose::URL_SAFE
            .decode(encode_raw_message(&d))
            .expect("valid base64");
        assert_eq!(String::from_utf8(bytes).expect("utf8"), build_raw_message(&d));
    }

    #[test]
    fn non_ascii_subject_is_encoded() {
        let raw = build_raw_message(&draft("Café soon?"));
        assert!(raw.contains("Subject: =?UTF-8?B?Q2Fmw6kgc29vbj8=?=\r\n"));
    }
}
