//! Prompt text for the three assistant flows.

use common::Contact;
use std::fmt::Write;

use crate::feeds::BlogPost;
use crate::google::calendar::Event;
use crate::interactions::EmailInteraction;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_events(events: &[Event]) -> String {
    let mut out = String::new();
    for event in events {
        let _ = writeln!(
            out,
            "- {} with {} on {}",
            event.title,
            event.attendees.join(", "),
            event
                .start
                .map(|s| s.format(DATE_FORMAT).to_string())
                .unwrap_or_else(|| "unknown date".to_string())
        );
    }
    out
}

fn last_contact_date(interaction: &EmailInteraction) -> String {
    interaction
        .last_contact
        .map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn format_interactions(interactions: &[EmailInteraction]) -> String {
    let mut out = String::new();
    for interaction in interactions {
        let _ = writeln!(
            out,
            "- {} ({}) [Priority: {}] (Last contact: {}, Total interactions: {})",
            interaction.name,
            interaction.participant,
            interaction.priority,
            last_contact_date(interaction),
            interaction.count
        );
    }
    out
}

pub fn format_social_data_prompt(
    events: &[Event],
    interactions: &[EmailInteraction],
    lookback_days: i64,
) -> String {
    format!(
        r#"Based on the following data about my important contacts, who should I reach out to this week?

Calendar Events (Last {days} days):
{events}
Important Contact Interactions (Last {days} days):
{interactions}
Please recommend 3 or less important contacts I should reach out to this week.
Consider factors like:
1. Contact priority (1-5, where 5 is highest)
2. Time since last contact
3. Frequency of past interactions
4. Any upcoming events
"#,
        days = lookback_days,
        events = format_events(events),
        interactions = format_interactions(interactions),
    )
}

pub fn format_email_draft_prompt(
    contact: &Contact,
    interaction: Option<&EmailInteraction>,
    posts: &[BlogPost],
) -> String {
    let mut context = String::new();

    match interaction {
        Some(i) => {
            let _ = write!(
                context,
                "Last contact was on {}, with {} total interactions. ",
                last_contact_date(i),
                i.count
            );
        }
        None => context.push_str("No previous email interactions found. "),
    }

    if !posts.is_empty() {
        context.push_str("\n\nRecent blog posts:\n");
        for post in posts {
            let _ = writeln!(
                context,
                "- {} (published {})\n  {}",
                post.title,
                post.published.format(DATE_FORMAT),
                post.link
            );
        }
    }

    let writing_sample = contact
        .writing_sample()
        .unwrap_or("No writing sample available.");

    format!(
        r#"Draft a friendly email to {name} ({email}).

Here's an example of how I write emails:
---
{sample}
---

Context about our relationship: {context}

Please write a natural, personal email that:
1. Has an appropriate subject line
2. Matches my writing style and tone from the example
3. Includes a specific reference to our last interaction if available
4. If they have recent blog posts, mention one that interested you
5. Ends with a clear next step or question
6. Uses similar greeting/closing styles as my example

Format the response as:
Subject: [subject]

[email body]"#,
        name = contact.name,
        email = contact.email,
        sample = writing_sample,
        context = context,
    )
}

pub fn format_catchup_prompt(contact: &Contact, posts: &[BlogPost]) -> String {
    let mut listing = String::new();
    for post in posts {
        let _ = write!(
            listing,
            "- {} (published {})\n  {}\n\n",
            post.title,
            post.published.format(DATE_FORMAT),
            post.link
        );
    }

    format!(
        r#"Summarize these recent blog posts from {name}:

{listing}
Please provide:
1. A brief overview of the main themes/topics covered
2. Key insights or interesting points from each post
3. Any actionable takeaways
4. Potential discussion points I could bring up in a conversation with the author

Keep the summary concise but informative."#,
        name = contact.name,
        listing = listing,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ann() -> Contact {
        Contact {
            email: "ann@example.com".into(),
            name: "Ann Example".into(),
            priority: 5,
            rss_feed: Some("https://ann.example.com/feed.xml".into()),
            writing_sample: None,
        }
    }

    fn post(title: &str, day: u32) -> BlogPost {
        BlogPost {
            title: title.into(),
            link: format!("https://ann.example.com/{}", day),
            published: Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn interactions_listing() {
        let interactions = vec![
            EmailInteraction {
                participant: "ann@example.com".into(),
                name: "Ann Example".into(),
                priority: 5,
                last_contact: Some(Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()),
                count: 4,
            },
            EmailInteraction {
                participant: "bob@example.com".into(),
                name: "Bob".into(),
                priority: 1,
                last_contact: None,
                count: 1,
            },
        ];
        assert_eq!(
            format_interactions(&interactions),
            "- Ann Example (ann@example.com) [Priority: 5] (Last contact: 2024-03-05, Total interactions: 4)\n\
             - Bob (bob@example.com) [Priority: 1] (Last contact: unknown, Total interactions: 1)\n"
        );
    }

    #[test]
    fn events_listing() {
        let events = vec![Event {
            title: "Lunch".into(),
            start: Some(
                chrono::DateTime::parse_from_rfc3339("2024-03-05T12:00:00-05:00").unwrap(),
            ),
            end: None,
            attendees: vec!["ann@example.com".into(), "me@example.com".into()],
            description: String::new(),
        }];
        assert_eq!(
            format_events(&events),
            "- Lunch with ann@example.com, me@example.com on 2024-03-05\n"
        );
    }

    #[test]
    fn social_prompt_mentions_window() {
        let prompt = format_social_data_prompt(&[], &[], 30);
        assert!(prompt.contains("Calendar Events (Last 30 days):"));
        assert!(prompt.contains("Please recommend 3 or less important contacts"));
    }

    #[test]
    fn draft_prompt_without_history() {
        let prompt = format_email_draft_prompt(&ann(), None, &[]);
        assert!(prompt.starts_with("Draft a friendly email to Ann Example (ann@example.com)."));
        assert!(prompt.contains("No writing sample available."));
        assert!(prompt.contains("No previous email interactions found."));
        assert!(!prompt.contains("Recent blog posts"));
        assert!(prompt.ends_with("Subject: [subject]\n\n[email body]"));
    }

    #[test]
    fn draft_prompt_with_history_sample_and_posts() {
        let mut contact = ann();
        contact.writing_sample = Some("Hey friend, long time!".into());
        let interaction = EmailInteraction {
            participant: "ann@example.com".into(),
            name: "Ann Example".into(),
            priority: 5,
            last_contact: Some(Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()),
            count: 7,
        };

        let prompt = format_email_draft_prompt(&contact, Some(&interaction), &[post("On gardens", 4)]);
        assert!(prompt.contains("---\nHey friend, long time!\n---"));
        assert!(prompt.contains("Last contact was on 2024-03-05, with 7 total interactions."));
        assert!(prompt.contains(
            "Recent blog posts:\n- On gardens (published 2024-03-04)\n  https://ann.example.com/4\n"
        ));
    }

    #[test]
    fn catchup_prompt_lists_posts() {
        let prompt = format_catchup_prompt(&ann(), &[post("One", 1), post("Two", 2)]);
        assert!(prompt.starts_with("Summarize these recent blog posts from Ann Example:\n\n"));
        assert!(prompt.contains("- One (published 2024-03-01)\n  https://ann.example.com/1\n\n"));
        assert!(prompt.contains("- Two (published 2024-03-02)"));
        assert!(prompt.ends_with("Keep the summary concise but informative."));
    }
}
