//! Important contacts: the static, prioritized list the assistant works from.
//!
//! The list is read from a JSON array once per invocation and validated as a
//! whole. A single invalid entry rejects the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// A person worth keeping in touch with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(alias = "Email")]
    pub email: String,
    #[serde(alias = "Name")]
    pub name: String,
    /// 1 (lowest) to 5 (highest)
    #[serde(alias = "Priority")]
    pub priority: u8,
    #[serde(default, alias = "RSSFeed", skip_serializing_if = "Option::is_none")]
    pub rss_feed: Option<String>,
    #[serde(default, alias = "WritingSample", skip_serializing_if = "Option::is_none")]
    pub writing_sample: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactError {
    #[error("email is required")]
    MissingEmail,
    #[error("invalid email format: {0}")]
    InvalidEmail(String),
    #[error("name is required for {0}")]
    MissingName(String),
    #[error("priority must be between 1-5 for {0}")]
    PriorityOutOfRange(String),
    #[error("duplicate contact email: {0}")]
    Duplicate(String),
}

impl Contact {
    pub fn validate(&self) -> Result<(), ContactError> {
        if self.email.trim().is_empty() {
            return Err(ContactError::MissingEmail);
        }
        if !self.email.contains('@') {
            return Err(ContactError::InvalidEmail(self.email.clone()));
        }
        if self.name.trim().is_empty() {
            return Err(ContactError::MissingName(self.email.clone()));
        }
        if !(1..=5).contains(&self.priority) {
            return Err(ContactError::PriorityOutOfRange(self.email.clone()));
        }
        Ok(())
    }

    /// Feed URL, if one is configured and non-blank.
    pub fn feed_url(&self) -> Option<&str> {
        self.rss_feed
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn writing_sample(&self) -> Option<&str> {
        self.writing_sample
            .as_deref()
            .filter(|sample| !sample.trim().is_empty())
    }
}

/// Validated contact list. Emails are unique.
#[derive(Debug, Clone, Default)]
pub struct ContactList {
    contacts: Vec<Contact>,
}

impl ContactList {
    /// Validate every entry and reject duplicate emails.
    pub fn new(contacts: Vec<Contact>) -> Result<Self, ContactError> {
        let mut seen = HashSet::new();
        for contact in &contacts {
            contact.validate()?;
            if !seen.insert(contact.email.as_str()) {
                return Err(ContactError::Duplicate(contact.email.clone()));
            }
        }
        Ok(Self { contacts })
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let contacts: Vec<Contact> =
            serde_json::from_str(data).context("Failed to parse contacts")?;
        Self::new(contacts).context("Invalid contact data")
    }

    /// Read and validate the contact list at `path`.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read contacts file: {}", path.display()))?;
        let list = Self::from_json(&data)
            .with_context(|| format!("Failed to load contacts from {}", path.display()))?;
        info!(count = list.len(), path = %path.display(), "contacts loaded");
        Ok(list)
    }

    /// Exact, case-sensitive lookup.
    pub fn find(&self, email: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.email == email)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Contact> {
        self.contacts.iter()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

impl<'a> IntoIterator for &'a ContactList {
    type Item = &'a Contact;
    type IntoIter = std::slice::Iter<'a, Contact>;

    fn into_iter(self) -> Self::IntoIter {
        self.contacts.iter()
    }
}
