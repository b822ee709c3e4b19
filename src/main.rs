// Interview Assist - command line entry point
//
// Reads one utterance per line from stdin and drives a single session,
// printing every session event as a JSON line on stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use interview_assist::services::live_session::{
    CandidateInput, ConversationMode, ConversationRequest, SessionKey, SessionOrchestrator,
    PATIENT_ROLE,
};
use interview_assist::{ConfigService, EngineConfig, LanguageMode, MatchStrategy};
use interview_assist_llm::{OpenAIEmbeddingProvider, OpenAIProvider};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "interview-assist")]
#[command(about = "Live clinical interview assistant", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.interview-assist/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "cli")]
    user: String,

    #[arg(long, default_value = "default")]
    conversation: String,

    /// bilingual, english or swahili (overrides the config)
    #[arg(long)]
    language: Option<String>,

    #[arg(long, value_enum, default_value_t = Mode::Live)]
    mode: Mode,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Every line is a finalized transcription chunk
    Live,
    /// Lines are "Role: text"
    TurnBased,
}

impl From<Mode> for ConversationMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Live => ConversationMode::Live,
            Mode::TurnBased => ConversationMode::TurnBased,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<EngineConfig> {
    let service = match path {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new(),
    }
    .context("failed to load configuration")?;
    tracing::debug!(path = %service.path().display(), "configuration loaded");
    Ok(service.get_config_clone())
}

fn build_orchestrator(mut config: EngineConfig) -> Result<SessionOrchestrator> {
    if config.llm.api_key.is_none() {
        config.llm.api_key = std::env::var("OPENAI_API_KEY").ok();
    }
    if config.embedding.api_key.is_none() {
        config.embedding.api_key = config.llm.api_key.clone();
    }

    let has_key = config.llm.api_key.is_some();
    let mut builder = SessionOrchestrator::builder(config.clone());

    if has_key || !config.llm.provider.requires_api_key() {
        let provider = OpenAIProvider::new(config.llm.clone())?;
        tracing::info!(model = %config.llm.model, "using LLM oracle");
        builder = builder.llm_provider(Arc::new(provider));
    } else {
        tracing::info!("no API key configured; using heuristic ranking only");
    }

    if config.match_strategy == MatchStrategy::Embedding && config.embedding.api_key.is_some() {
        let embedder = OpenAIEmbeddingProvider::new(&config.embedding)?;
        builder = builder.embedder(Arc::new(embedder));
    }

    Ok(builder.build()?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

async fn stream_request(orchestrator: &SessionOrchestrator, request: ConversationRequest) -> Result<()> {
    let mut events = orchestrator.stream(request)?;
    while let Some(event) = events.next().await {
        print_json(&event)?;
    }
    Ok(())
}

fn split_turn(line: &str) -> (&str, &str) {
    match line.split_once(':') {
        Some((role, text)) if !role.trim().is_empty() && !role.contains(' ') => {
            (role.trim(), text.trim())
        }
        _ => (PATIENT_ROLE, line),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = load_config(cli.config)?;
    let language = cli
        .language
        .as_deref()
        .map(LanguageMode::parse)
        .unwrap_or(config.language);
    let orchestrator = build_orchestrator(config)?;
    let _sweeper = orchestrator.spawn_eviction_task();

    let key = SessionKey::new(cli.user, cli.conversation)?;
    let mode = ConversationMode::from(cli.mode);
    tracing::info!(session = %key, language = %language, "session started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = match line.split_once(' ') {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "/plan" => {
                let items = rest.split('|').map(|q| CandidateInput::from(q.trim()));
                print_json(&orchestrator.add_candidate_questions(&key, items).await)?;
            }
            "/asked" => print_json(&orchestrator.mark_asked(&key, rest).await)?,
            "/asked-id" => print_json(&orchestrator.mark_asked_by_id(&key, rest).await)?,
            "/unasked" => print_json(&orchestrator.unasked(&key, language).await)?,
            "/finalize" => {
                stream_request(
                    &orchestrator,
                    ConversationRequest::finalize(key.clone(), mode, language),
                )
                .await?
            }
            "/simulate" => {
                let request = ConversationRequest::utterance(
                    key.clone(),
                    ConversationMode::Simulated,
                    PATIENT_ROLE,
                    rest,
                    language,
                );
                if let Err(e) = stream_request(&orchestrator, request).await {
                    tracing::warn!(error = %e, "simulation not started");
                }
            }
            "/followup" => match orchestrator.follow_up(&key, rest, language).await {
                Ok(answer) => print_json(&serde_json::json!({ "answer": answer }))?,
                Err(e) => tracing::warn!(error = %e, "follow-up rejected"),
            },
            "/reset" => {
                orchestrator.reset(&key).await;
                print_json(&serde_json::json!({ "reset": true }))?;
            }
            _ => {
                let (role, text) = match cli.mode {
                    Mode::Live => (PATIENT_ROLE, line),
                    Mode::TurnBased => split_turn(line),
                };
                let request = ConversationRequest::utterance(key.clone(), mode, role, text, language);
                if let Err(e) = stream_request(&orchestrator, request).await {
                    tracing::warn!(error = %e, "utterance rejected");
                }
            }
        }
    }

    Ok(())
}
