/*
socialbot - command-line outreach assistant.
Runs exactly one command (recommend, draft or catchup) per invocation and
prints the result to stdout. Logs go to stderr.
*/

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use common::{Config, ContactList};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use socialbot::assistant::Assistant;
use socialbot::error::{exit_code_for, AssistantError};
use socialbot::feeds::HttpFeedReader;
use socialbot::google::calendar::CalendarClient;
use socialbot::google::gmail::GmailClient;
use socialbot::google::{build_http_client, GoogleAuth};
use socialbot::llm::{self, LlmProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Command {
    /// Recommend who to reach out to this week
    Recommend,
    /// Draft an email to a contact and save it as a Gmail draft
    Draft,
    /// Summarize a contact's recent blog posts
    Catchup,
}

#[derive(Parser, Debug)]
#[command(name = "socialbot", about = "Keep in touch with the people who matter")]
struct Args {
    /// Command to run
    #[arg(long, value_enum, default_value_t = Command::Recommend)]
    cmd: Command,

    /// Email address for the draft/catchup commands
    #[arg(long, value_name = "ADDRESS")]
    email: Option<String>,

    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let assistant = match setup(&args).await {
        Ok(assistant) => assistant,
        Err(e) => {
            error!("failed to initialize assistant: {:#}", e);
            eprintln!("Error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    match run(&assistant, &args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(cmd = ?args.cmd, "command failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

async fn setup(args: &Args) -> Result<Assistant> {
    let config = load_config(args).await?;

    let contacts = ContactList::load(&config.contacts.path)
        .await
        .context("failed to load important contacts")?;

    let llm = create_llm_provider(&config.llm)?;

    let http = build_http_client(config.google.timeout_seconds)?;
    let auth = Arc::new(GoogleAuth::new(
        config.google.credentials_path.clone(),
        config.google.token_path.clone(),
        http.clone(),
    ));
    let mail = GmailClient::new(&config.google.gmail_base_url, http.clone(), auth.clone());
    let calendar = CalendarClient::new(&config.google.calendar_base_url, http, auth);
    let feeds = HttpFeedReader::new(
        config.feeds.fetch_timeout_seconds,
        &config.feeds.user_agent,
    )?;

    Ok(Assistant::new(
        contacts,
        config.outreach.clone(),
        Arc::new(mail),
        Arc::new(calendar),
        Arc::new(feeds),
        Arc::from(llm),
    ))
}

async fn load_config(args: &Args) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config.clone() {
        if !p.exists() {
            return Err(AssistantError::Config(format!("config file not found: {}", p.display())).into());
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    .context("failed to load configuration")?;
    config
        .outreach
        .validate()
        .map_err(|e| AssistantError::Config(format!("{:#}", e)))?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}

async fn run(assistant: &Assistant, args: &Args) -> Result<()> {
    match args.cmd {
        Command::Recommend => {
            let result = assistant
                .recommend()
                .await
                .context("failed to get recommendations")?;
            println!("Social Recommendations:\n{}", result);
        }
        Command::Draft => {
            let email = required_email(args, "draft")?;
            let result = assistant
                .draft_email(email)
                .await
                .context("failed to draft email")?;
            println!("Email Draft:\n{}", result);
        }
        Command::Catchup => {
            let email = required_email(args, "catchup")?;
            let result = assistant
                .catchup(email)
                .await
                .context("failed to catch up with blog")?;
            println!("Blog Catchup Summary:\n{}", result);
        }
    }
    Ok(())
}

fn required_email<'a>(args: &'a Args, cmd: &str) -> Result<&'a str> {
    args.email
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| {
            AssistantError::Config(format!("--email is required for the {} command", cmd)).into()
        })
}

fn api_key_from_env(api_key_env: &str) -> Result<String> {
    std::env::var(api_key_env)
        .ok()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            AssistantError::Config(format!("LLM API key env var '{}' not set", api_key_env)).into()
        })
}

/// Build the provider selected by `llm.adapter`.
fn create_llm_provider(llm_config: &common::LlmConfig) -> Result<Box<dyn LlmProvider>> {
    let adapter = llm_config.adapter.as_deref().unwrap_or("gemini");
    match adapter {
        "gemini" => {
            let gemini = llm_config.gemini.as_ref();
            let api_key_env = gemini
                .and_then(|c| c.api_key_env.as_deref())
                .unwrap_or("GEMINI_API_KEY");
            let api_key = api_key_from_env(api_key_env)?;

            let api_url = gemini
                .and_then(|c| c.api_url.clone())
                .unwrap_or_else(|| llm::gemini::DEFAULT_API_URL.to_string());
            let model = gemini
                .and_then(|c| c.model.clone())
                .unwrap_or_else(|| llm::gemini::DEFAULT_MODEL.to_string());
            let timeout_secs = gemini.and_then(|c| c.timeout_seconds).unwrap_or(60);

            info!(model = %model, "Gemini LLM provider initialized");
            let provider =
                llm::gemini::GeminiProvider::new(api_url, api_key, model).with_timeout(timeout_secs);
            Ok(Box::new(provider))
        }
        "remote" => {
            let remote_config = llm_config.remote.as_ref().ok_or_else(|| {
                AssistantError::Config("remote adapter selected but no [llm.remote] section".into())
            })?;

            let api_key_env = remote_config.api_key_env.as_deref().ok_or_else(|| {
                AssistantError::Config("missing api_key_env in remote config".into())
            })?;
            let api_key = api_key_from_env(api_key_env)?;

            let model = remote_config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
            let api_url = remote_config
                .api_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434/v1/chat/completions".to_string());
            let timeout_secs = remote_config.timeout_seconds.unwrap_or(30);
            let max_tokens = remote_config.max_tokens.unwrap_or(1024);

            info!(model = %model, "remote LLM provider initialized");
            let provider = llm::remote::RemoteLlmProvider::new(api_url, api_key, model)
                .with_defaults(timeout_secs, max_tokens, 0.7);
            Ok(Box::new(provider))
        }
        other => Err(AssistantError::Config(format!("unknown LLM adapter type: {}", other)).into()),
    }
}
