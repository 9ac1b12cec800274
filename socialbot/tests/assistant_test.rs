use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use common::{Contact, ContactList, OutreachConfig};
use socialbot::assistant::Assistant;
use socialbot::error::{exit_code_for, AssistantError};
use socialbot::feeds::{BlogPost, FeedReader};
use socialbot::google::calendar::{CalendarService, Event};
use socialbot::google::gmail::{DraftEmail, MailService, RawMessage};
use socialbot::llm::{LlmProvider, LlmRequest, LlmResponse, UsageMetadata};
use std::sync::{Arc, Mutex};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeMail {
    messages: Vec<RawMessage>,
    queries: Mutex<Vec<String>>,
    drafts: Mutex<Vec<DraftEmail>>,
    fail_list: bool,
    fail_drafts: bool,
}

#[async_trait::async_trait]
impl MailService for FakeMail {
    async fn list_message_ids(&self, query: &str, _max_results: u32) -> Result<Vec<String>> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail_list {
            anyhow::bail!("Gmail list messages failed with status 503 Service Unavailable");
        }
        let mut ids: Vec<String> = self.messages.iter().map(|m| m.id.clone()).collect();
        ids.push("vanished".to_string());
        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> Result<RawMessage> {
        self.messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("message {} not found", id))
    }

    async fn create_draft(&self, draft: &DraftEmail) -> Result<()> {
        if self.fail_drafts {
            anyhow::bail!("Gmail create draft failed with status 403 Forbidden");
        }
        self.drafts.lock().unwrap().push(draft.clone());
        Ok(())
    }
}

#[derive(Default)]
struct FakeCalendar {
    events: Vec<Event>,
    fail: bool,
}

#[async_trait::async_trait]
impl CalendarService for FakeCalendar {
    async fn list_events(&self, _since: DateTime<Utc>, _until: DateTime<Utc>) -> Result<Vec<Event>> {
        if self.fail {
            anyhow::bail!("Calendar list events failed with status 500");
        }
        Ok(self.events.clone())
    }
}

#[derive(Default)]
struct FakeFeeds {
    posts: Vec<BlogPost>,
    fail: bool,
    requests: Mutex<Vec<(String, usize)>>,
}

#[async_trait::async_trait]
impl FeedReader for FakeFeeds {
    async fn recent_posts(&self, url: &str, limit: usize) -> Result<Vec<BlogPost>> {
        self.requests.lock().unwrap().push((url.to_string(), limit));
        if self.fail {
            anyhow::bail!("network error during feed fetch");
        }
        Ok(self.posts.iter().take(limit).cloned().collect())
    }
}

struct FakeLlm {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for FakeLlm {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        self.prompts.lock().unwrap().push(request.prompt);
        Ok(LlmResponse {
            content: self.reply.clone(),
            usage: UsageMetadata::default(),
            model: "fake".to_string(),
        })
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn contacts() -> ContactList {
    ContactList::new(vec![
        Contact {
            email: "ann@example.com".to_string(),
            name: "Ann Example".to_string(),
            priority: 5,
            rss_feed: Some("https://ann.example.com/feed.xml".to_string()),
            writing_sample: Some("Hey you! Long time.\n\nCheers,\nMe".to_string()),
        },
        Contact {
            email: "bob@example.com".to_string(),
            name: "Bob Builder".to_string(),
            priority: 2,
            rss_feed: None,
            writing_sample: None,
        },
    ])
    .expect("valid contacts")
}

fn message(id: &str, from: &str, date: &str) -> RawMessage {
    RawMessage {
        id: id.to_string(),
        from: from.to_string(),
        date: date.to_string(),
    }
}

fn mailbox() -> FakeMail {
    FakeMail {
        messages: vec![
            message("m1", "Ann Example <ann@example.com>", "Fri, 01 Mar 2024 09:00:00 +0000"),
            message("m2", "ann@example.com (Ann Example)", "Tue, 05 Mar 2024 12:00:00 +0000"),
            message("m3", "Newsletter <news@spam.example>", "Sun, 10 Mar 2024 08:00:00 +0000"),
            message("m4", "Bob Builder <bob@example.com>", "Sun, 10 Mar 2024 18:30:00 +0000"),
        ],
        ..FakeMail::default()
    }
}

fn post(title: &str, age_days: i64) -> BlogPost {
    BlogPost {
        title: title.to_string(),
        link: format!("https://ann.example.com/{}", title.to_lowercase().replace(' ', "-")),
        published: Utc::now() - Duration::days(age_days),
    }
}

struct Harness {
    mail: Arc<FakeMail>,
    feeds: Arc<FakeFeeds>,
    llm: Arc<FakeLlm>,
    assistant: Assistant,
}

fn harness(mail: FakeMail, calendar: FakeCalendar, feeds: FakeFeeds, reply: &str) -> Harness {
    let mail = Arc::new(mail);
    let feeds = Arc::new(feeds);
    let llm = Arc::new(FakeLlm::replying(reply));
    let assistant = Assistant::new(
        contacts(),
        OutreachConfig::default(),
        mail.clone(),
        Arc::new(calendar),
        feeds.clone(),
        llm.clone(),
    );
    Harness {
        mail,
        feeds,
        llm,
        assistant,
    }
}

fn chain_has(err: &anyhow::Error, check: impl Fn(&AssistantError) -> bool) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<AssistantError>())
        .any(check)
}

// ============================================================================
// Recommend
// ============================================================================

#[tokio::test]
async fn test_recommend_prompt_contains_important_contacts_only() {
    let calendar = FakeCalendar {
        events: vec![Event {
            title: "Lunch".to_string(),
            start: Some(DateTime::parse_from_rfc3339("2024-03-05T12:00:00+00:00").unwrap()),
            end: None,
            attendees: vec!["ann@example.com".to_string()],
            description: String::new(),
        }],
        fail: false,
    };
    let h = harness(mailbox(), calendar, FakeFeeds::default(), "Reach out to Ann.");

    let result = h.assistant.recommend().await.expect("recommend");
    assert_eq!(result, "Reach out to Ann.");

    let queries = h.mail.queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].starts_with("after:"));

    let prompts = h.llm.prompts();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.contains("- Lunch with ann@example.com on 2024-03-05"));
    assert!(prompt.contains(
        "- Ann Example (ann@example.com) [Priority: 5] (Last contact: 2024-03-05, Total interactions: 2)"
    ));
    assert!(prompt.contains(
        "- Bob Builder (bob@example.com) [Priority: 2] (Last contact: 2024-03-10, Total interactions: 1)"
    ));
    assert!(!prompt.contains("news@spam.example"));
    // highest priority first
    assert!(prompt.find("Ann Example").unwrap() < prompt.find("Bob Builder").unwrap());
}

#[tokio::test]
async fn test_recommend_fails_when_calendar_fails() {
    let calendar = FakeCalendar {
        events: Vec::new(),
        fail: true,
    };
    let h = harness(mailbox(), calendar, FakeFeeds::default(), "unused");

    let err = h.assistant.recommend().await.unwrap_err();
    assert!(format!("{:#}", err).contains("failed to get calendar events"));
    assert_eq!(exit_code_for(&err), 1);
    assert!(h.llm.prompts().is_empty());
}

#[tokio::test]
async fn test_recommend_fails_when_mail_listing_fails() {
    let mail = FakeMail {
        fail_list: true,
        ..mailbox()
    };
    let h = harness(mail, FakeCalendar::default(), FakeFeeds::default(), "unused");

    let err = h.assistant.recommend().await.unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("failed to get email interactions"));
    assert!(message.contains("failed to list messages"));
    assert!(message.contains("503"));
    assert_eq!(exit_code_for(&err), 1);
    assert!(h.llm.prompts().is_empty());
}

#[tokio::test]
async fn test_recommend_rejects_invalid_lookback() {
    for days in [0, -3, i64::MAX] {
        let mail = Arc::new(mailbox());
        let llm = Arc::new(FakeLlm::replying("unused"));
        let assistant = Assistant::new(
            contacts(),
            OutreachConfig {
                lookback_days: days,
                ..OutreachConfig::default()
            },
            mail.clone(),
            Arc::new(FakeCalendar::default()),
            Arc::new(FakeFeeds::default()),
            llm.clone(),
        );

        let err = assistant.recommend().await.unwrap_err();
        assert!(chain_has(&err, AssistantError::is_config), "lookback {}", days);
        assert_eq!(exit_code_for(&err), 2);
        assert!(mail.queries.lock().unwrap().is_empty());
        assert!(llm.prompts().is_empty());
    }
}

// ============================================================================
// Draft
// ============================================================================

const DRAFT_REPLY: &str = "Subject: Coffee next week?\n\nHi Ann,\n\nLoved your post on gardens.\n\nCheers,\nMe";

#[tokio::test]
async fn test_draft_saves_parsed_email() {
    let feeds = FakeFeeds {
        posts: vec![post("On gardens", 2), post("Spring", 5), post("Winter", 40), post("Older", 90)],
        ..FakeFeeds::default()
    };
    let h = harness(mailbox(), FakeCalendar::default(), feeds, DRAFT_REPLY);

    let result = h.assistant.draft_email("ann@example.com").await.expect("draft");
    assert_eq!(result, format!("Draft saved to Gmail:\n\n{}", DRAFT_REPLY));

    let drafts = h.mail.drafts.lock().unwrap().clone();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].to, "ann@example.com");
    assert_eq!(drafts[0].subject, "Coffee next week?");
    assert_eq!(drafts[0].body, "Hi Ann,\n\nLoved your post on gardens.\n\nCheers,\nMe");

    let queries = h.mail.queries.lock().unwrap().clone();
    assert!(queries[0].starts_with("(from:ann@example.com OR to:ann@example.com) after:"));

    let requests = h.feeds.requests.lock().unwrap().clone();
    assert_eq!(requests, vec![("https://ann.example.com/feed.xml".to_string(), 3)]);

    let prompt = &h.llm.prompts()[0];
    assert!(prompt.starts_with("Draft a friendly email to Ann Example (ann@example.com)."));
    assert!(prompt.contains("Hey you! Long time."));
    assert!(prompt.contains("Last contact was on 2024-03-05, with 2 total interactions."));
    assert!(prompt.contains("Recent blog posts:"));
    assert!(prompt.contains("- On gardens (published "));
    assert!(prompt.contains("- Winter (published "));
    assert!(!prompt.contains("Older"));
}

#[tokio::test]
async fn test_draft_survives_feed_failure() {
    let feeds = FakeFeeds {
        fail: true,
        ..FakeFeeds::default()
    };
    let h = harness(mailbox(), FakeCalendar::default(), feeds, DRAFT_REPLY);

    h.assistant.draft_email("ann@example.com").await.expect("draft");

    assert_eq!(h.mail.drafts.lock().unwrap().len(), 1);
    assert!(!h.llm.prompts()[0].contains("Recent blog posts"));
}

#[tokio::test]
async fn test_draft_without_feed_or_history() {
    let h = harness(FakeMail::default(), FakeCalendar::default(), FakeFeeds::default(), DRAFT_REPLY);

    h.assistant.draft_email("bob@example.com").await.expect("draft");

    assert!(h.feeds.requests.lock().unwrap().is_empty());
    let prompt = &h.llm.prompts()[0];
    assert!(prompt.contains("No previous email interactions found."));
    assert!(prompt.contains("No writing sample available."));
}

#[tokio::test]
async fn test_draft_without_subject_fails() {
    let h = harness(
        mailbox(),
        FakeCalendar::default(),
        FakeFeeds::default(),
        "Hi Ann,\n\nHow are things?",
    );

    let err = h.assistant.draft_email("ann@example.com").await.unwrap_err();
    assert!(chain_has(&err, |e| matches!(e, AssistantError::MissingSubject)));
    assert!(format!("{:#}", err).contains("failed to parse email response"));
    assert_eq!(exit_code_for(&err), 1);
    assert!(h.mail.drafts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_draft_save_failure_is_reported() {
    let mail = FakeMail {
        fail_drafts: true,
        ..mailbox()
    };
    let h = harness(mail, FakeCalendar::default(), FakeFeeds::default(), DRAFT_REPLY);

    let err = h.assistant.draft_email("ann@example.com").await.unwrap_err();
    assert!(format!("{:#}", err).contains("failed to save draft"));
}

#[tokio::test]
async fn test_draft_fails_when_mail_listing_fails() {
    let mail = FakeMail {
        fail_list: true,
        ..mailbox()
    };
    let h = harness(mail, FakeCalendar::default(), FakeFeeds::default(), DRAFT_REPLY);

    let err = h.assistant.draft_email("ann@example.com").await.unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("failed to get email interactions"));
    assert!(message.contains("failed to list messages"));
    assert_eq!(exit_code_for(&err), 1);
    assert!(h.llm.prompts().is_empty());
    assert!(h.mail.drafts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_draft_unknown_contact() {
    let h = harness(mailbox(), FakeCalendar::default(), FakeFeeds::default(), DRAFT_REPLY);

    let err = h.assistant.draft_email("stranger@example.com").await.unwrap_err();
    assert!(chain_has(&err, |e| matches!(e, AssistantError::ContactNotFound(_))));
    assert_eq!(
        err.to_string(),
        "contact not found in important contacts: stranger@example.com"
    );
    assert!(h.llm.prompts().is_empty());
    assert!(h.mail.queries.lock().unwrap().is_empty());
}

// ============================================================================
// Catchup
// ============================================================================

#[tokio::test]
async fn test_catchup_without_recent_posts_skips_model() {
    let feeds = FakeFeeds {
        posts: vec![post("Ancient", 45), post("Older", 90)],
        ..FakeFeeds::default()
    };
    let h = harness(FakeMail::default(), FakeCalendar::default(), feeds, "unused");

    let result = h.assistant.catchup("ann@example.com").await.expect("catchup");
    assert_eq!(result, "No posts from Ann Example in the last 30 days.");
    assert!(h.llm.prompts().is_empty());
}

#[tokio::test]
async fn test_catchup_summarizes_recent_posts() {
    let feeds = FakeFeeds {
        posts: vec![post("On gardens", 2), post("Spring", 10), post("Ancient", 45)],
        ..FakeFeeds::default()
    };
    let h = harness(FakeMail::default(), FakeCalendar::default(), feeds, "Ann writes about gardens.");

    let result = h.assistant.catchup("ann@example.com").await.expect("catchup");
    assert_eq!(result, "Ann writes about gardens.");

    let requests = h.feeds.requests.lock().unwrap().clone();
    assert_eq!(requests, vec![("https://ann.example.com/feed.xml".to_string(), 10)]);

    let prompt = &h.llm.prompts()[0];
    assert!(prompt.starts_with("Summarize these recent blog posts from Ann Example:"));
    assert!(prompt.contains("- On gardens (published "));
    assert!(prompt.contains("  https://ann.example.com/on-gardens\n"));
    assert!(prompt.contains("- Spring (published "));
    assert!(!prompt.contains("Ancient"));
}

#[tokio::test]
async fn test_catchup_requires_feed() {
    let h = harness(FakeMail::default(), FakeCalendar::default(), FakeFeeds::default(), "unused");

    let err = h.assistant.catchup("bob@example.com").await.unwrap_err();
    assert!(chain_has(&err, |e| matches!(e, AssistantError::NoFeed(_))));
    assert_eq!(err.to_string(), "no RSS feed configured for Bob Builder");
}

#[tokio::test]
async fn test_catchup_feed_failure_is_an_error() {
    let feeds = FakeFeeds {
        fail: true,
        ..FakeFeeds::default()
    };
    let h = harness(FakeMail::default(), FakeCalendar::default(), feeds, "unused");

    let err = h.assistant.catchup("ann@example.com").await.unwrap_err();
    assert!(format!("{:#}", err).contains("failed to fetch RSS feed"));
    assert!(h.llm.prompts().is_empty());
}
