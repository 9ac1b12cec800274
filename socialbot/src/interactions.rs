//! Email interaction aggregation.
//!
//! Lists the messages matching a Gmail query, folds them into one record per
//! sender, and keeps only the senders that appear in the important-contacts
//! list.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::ContactList;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::google::gmail::{MailService, RawMessage};

/// Aggregated exchanges with one sender inside a query window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailInteraction {
    pub participant: String,
    pub name: String,
    pub priority: u8,
    /// `None` when no message from this sender carried a parsable `Date`.
    pub last_contact: Option<DateTime<Utc>>,
    pub count: usize,
}

impl EmailInteraction {
    fn new(participant: String, last_contact: Option<DateTime<Utc>>) -> Self {
        Self {
            participant,
            name: String::new(),
            priority: 0,
            last_contact,
            count: 1,
        }
    }
}

/// Extract the bare address from a free-form `From` header.
///
/// Handles `Name <email@domain.com>`, `email@domain.com (Name)` and a bare
/// `email@domain.com`, in that order.
pub fn extract_email(from: &str) -> String {
    if let Some(start) = from.find('<') {
        if let Some(len) = from[start..].find('>') {
            return from[start + 1..start + len].trim().to_string();
        }
    }

    if let Some(end) = from.find(" (") {
        return from[..end].trim().to_string();
    }

    from.trim().to_string()
}

/// Parse an RFC 1123 date with a numeric zone (`Mon, 02 Jan 2006 15:04:05 -0700`).
pub fn parse_email_date(date: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(date.trim(), "%a, %d %b %Y %H:%M:%S %z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Fold messages into one interaction per sender.
///
/// Messages whose sender extracts to an empty string are skipped. An
/// unparsable date still counts the message but never moves `last_contact`
/// forward.
pub fn aggregate<'a, I>(messages: I) -> Vec<EmailInteraction>
where
    I: IntoIterator<Item = &'a RawMessage>,
{
    let mut interactions: HashMap<String, EmailInteraction> = HashMap::new();

    for message in messages {
        let from = extract_email(&message.from);
        if from.is_empty() {
            debug!(id = %message.id, "skipping message: no From header");
            continue;
        }
        debug!(id = %message.id, from = %from, raw = %message.from, "found email");

        let date = parse_email_date(&message.date);

        match interactions.get_mut(&from) {
            Some(existing) => {
                existing.count += 1;
                if date > existing.last_contact {
                    existing.last_contact = date;
                }
            }
            None => {
                interactions.insert(from.clone(), EmailInteraction::new(from, date));
            }
        }
    }

    interactions.into_values().collect()
}

/// Keep interactions with important contacts, copying their name and priority.
///
/// The result is ordered by priority (highest first), then most recent contact.
pub fn filter_and_enrich(
    interactions: Vec<EmailInteraction>,
    contacts: &ContactList,
) -> Vec<EmailInteraction> {
    let by_email: HashMap<&str, _> = contacts.iter().map(|c| (c.email.as_str(), c)).collect();

    let mut filtered: Vec<EmailInteraction> = interactions
        .into_iter()
        .filter_map(|mut interaction| {
            let contact = by_email.get(interaction.participant.as_str())?;
            interaction.name = contact.name.clone();
            interaction.priority = contact.priority;
            Some(interaction)
        })
        .collect();

    filtered.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.last_contact.cmp(&a.last_contact))
            .then_with(|| a.participant.cmp(&b.participant))
    });
    filtered
}

/// Gmail search query for messages after `since`, optionally limited to one participant.
pub fn interaction_query(participant: Option<&str>, since: DateTime<Utc>) -> String {
    let after = format!("after:{}", since.format("%Y/%m/%d"));
    match participant {
        Some(p) => format!("(from:{p} OR to:{p}) {after}"),
        None => after,
    }
}

/// List, fetch, aggregate and filter the messages matching `query`.
///
/// Per-message fetch failures are logged and skipped; only a failed listing
/// fails the whole collection.
pub async fn collect_interactions(
    mail: &dyn MailService,
    contacts: &ContactList,
    query: &str,
    max_results: u32,
) -> Result<Vec<EmailInteraction>> {
    info!(query = %query, "querying emails");

    let ids = mail
        .list_message_ids(query, max_results)
        .await
        .context("failed to list messages")?;
    info!("found {} total messages", ids.len());

    let mut messages = Vec::with_capacity(ids.len());
    for id in &ids {
        match mail.get_message(id).await {
            Ok(message) => messages.push(message),
            Err(e) => {
                debug!("error getting message {}: {:#}", id, e);
                continue;
            }
        }
    }

    let all = aggregate(&messages);
    let total = all.len();
    let filtered = filter_and_enrich(all, contacts);
    info!(
        "found {} total interactions, filtered to {} important contacts",
        total,
        filtered.len()
    );

    Ok(filtered)
}
