//! The three outreach flows: recommend, draft and catchup.
//!
//! Each flow is a straight sequence of awaited calls against the service
//! traits, so tests can drive the whole thing with in-process fakes.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use common::{Contact, ContactList, OutreachConfig};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AssistantError;
use crate::feeds::{published_since, BlogPost, FeedReader};
use crate::google::calendar::CalendarService;
use crate::google::gmail::{DraftEmail, MailService};
use crate::interactions::{collect_interactions, interaction_query};
use crate::llm::{chat, LlmProvider};
use crate::prompts;

pub struct Assistant {
    contacts: ContactList,
    outreach: OutreachConfig,
    mail: Arc<dyn MailService>,
    calendar: Arc<dyn CalendarService>,
    feeds: Arc<dyn FeedReader>,
    llm: Arc<dyn LlmProvider>,
}

impl Assistant {
    pub fn new(
        contacts: ContactList,
        outreach: OutreachConfig,
        mail: Arc<dyn MailService>,
        calendar: Arc<dyn CalendarService>,
        feeds: Arc<dyn FeedReader>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            contacts,
            outreach,
            mail,
            calendar,
            feeds,
            llm,
        }
    }

    /// Start of the lookback window ending at `now`.
    fn window_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let days = self.outreach.lookback_days;
        Duration::try_days(days)
            .filter(|_| days > 0)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| {
                AssistantError::Config(format!("invalid outreach.lookback_days: {}", days)).into()
            })
    }

    fn contact(&self, email: &str) -> Result<&Contact> {
        self.contacts
            .find(email)
            .ok_or_else(|| AssistantError::ContactNotFound(email.to_string()).into())
    }

    /// Ask the model who to reach out to, given recent events and interactions.
    pub async fn recommend(&self) -> Result<String> {
        let now = Utc::now();
        let since = self.window_start(now)?;

        let events = self
            .calendar
            .list_events(since, now)
            .await
            .context("failed to get calendar events")?;

        let interactions = collect_interactions(
            self.mail.as_ref(),
            &self.contacts,
            &interaction_query(None, since),
            self.outreach.max_messages,
        )
        .await
        .context("failed to get email interactions")?;

        let prompt =
            prompts::format_social_data_prompt(&events, &interactions, self.outreach.lookback_days);
        chat(self.llm.as_ref(), &prompt).await
    }

    /// Draft an email to `to`, save it as a Gmail draft and return the model text.
    pub async fn draft_email(&self, to: &str) -> Result<String> {
        let contact = self.contact(to)?;
        let since = self.window_start(Utc::now())?;

        let interactions = collect_interactions(
            self.mail.as_ref(),
            &self.contacts,
            &interaction_query(Some(&contact.email), since),
            self.outreach.max_messages,
        )
        .await
        .context("failed to get email interactions")?;
        let interaction = interactions.iter().find(|i| i.participant == to);

        let posts = match contact.feed_url() {
            Some(url) => match self
                .feeds
                .recent_posts(url, self.outreach.draft_post_limit)
                .await
            {
                Ok(posts) => posts,
                Err(e) => {
                    warn!(feed = %url, "failed to fetch RSS feed: {:#}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let prompt = prompts::format_email_draft_prompt(contact, interaction, &posts);
        let response = chat(self.llm.as_ref(), &prompt).await?;

        let mut draft =
            parse_email_response(&response).context("failed to parse email response")?;
        draft.to = to.to_string();

        self.mail
            .create_draft(&draft)
            .await
            .context("failed to save draft")?;
        info!(to = %draft.to, subject = %draft.subject, "draft saved");

        Ok(format!("Draft saved to Gmail:\n\n{}", response))
    }

    /// Summarize the contact's posts from the lookback window.
    pub async fn catchup(&self, email: &str) -> Result<String> {
        let contact = self.contact(email)?;
        let url = contact
            .feed_url()
            .ok_or_else(|| AssistantError::NoFeed(contact.name.clone()))?;

        let posts = self
            .feeds
            .recent_posts(url, self.outreach.catchup_post_limit)
            .await
            .context("failed to fetch RSS feed")?;

        let recent: Vec<BlogPost> = published_since(posts, self.window_start(Utc::now())?);
        if recent.is_empty() {
            return Ok(format!(
                "No posts from {} in the last {} days.",
                contact.name, self.outreach.lookback_days
            ));
        }

        info!(contact = %contact.email, "summarizing {} recent posts", recent.len());
        let prompt = prompts::format_catchup_prompt(contact, &recent);
        chat(self.llm.as_ref(), &prompt).await
    }
}

/// Split model output into subject and body.
///
/// The first `Subject: ` line sets the subject; the first blank line after it
/// opens the body, which runs to the end of the text. `to` is left empty.
pub fn parse_email_response(response: &str) -> Result<DraftEmail, AssistantError> {
    let mut subject: Option<&str> = None;
    let mut body: Vec<&str> = Vec::new();
    let mut in_body = false;

    for line in response.lines() {
        if in_body {
            body.push(line);
        } else if subject.is_none() {
            if let Some(rest) = line.strip_prefix("Subject: ") {
                subject = Some(rest);
            }
        } else if line.is_empty() {
            in_body = true;
        }
    }

    let subject = subject
        .filter(|s| !s.is_empty())
        .ok_or(AssistantError::MissingSubject)?;

    Ok(DraftEmail {
        subject: subject.to_string(),
        body: body.join("\n"),
        to: String::new(),
    })
}
