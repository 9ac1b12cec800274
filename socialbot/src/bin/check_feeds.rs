// Fetch the feed of every important contact and print its latest posts.
// Useful to check feed URLs before running `socialbot --cmd catchup`.

use clap::Parser;
use common::{Config, ContactList};
use socialbot::feeds::{FeedReader, HttpFeedReader};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "check_feeds", about = "Check the RSS feeds of important contacts")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Posts to show per feed
    #[arg(long, default_value_t = 3)]
    limit: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let default_path = PathBuf::from("config.default.toml");
    let override_path = args
        .config
        .or_else(|| Some(PathBuf::from("config.toml")).filter(|p| p.exists()));
    let config = Config::load_with_defaults(
        Some(default_path.as_path()).filter(|p| p.exists()),
        override_path.as_deref(),
    )
    .await?;

    let contacts = ContactList::load(&config.contacts.path).await?;
    let reader = HttpFeedReader::new(config.feeds.fetch_timeout_seconds, &config.feeds.user_agent)?;

    for contact in &contacts {
        let Some(url) = contact.feed_url() else {
            continue;
        };

        println!("\n{}", "=".repeat(60));
        println!("{} <{}>: {}", contact.name, contact.email, url);
        println!("{}", "=".repeat(60));

        match reader.recent_posts(url, args.limit).await {
            Ok(posts) if posts.is_empty() => println!("  (no entries)"),
            Ok(posts) => {
                for (i, post) in posts.iter().enumerate() {
                    println!("  {}. {}", i + 1, post.title);
                    println!("     {}", post.link);
                    println!("     published {}", post.published.format("%Y-%m-%d"));
                }
            }
            Err(e) => println!("  failed: {:#}", e),
        }
    }

    Ok(())
}
