//! AVEN application binary - composition root.
//!
//! 1. Load configuration from TOML plus environment overrides
//! 2. Pick a retrieval backend (query script or HTTP endpoint)
//! 3. Run the requested command: API server, terminal chat, or one query

mod cli;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use aven_api::{create_router, AppState};
use aven_chat::{SessionFactory, Widget};
use aven_core::config::AvenConfig;
use aven_core::events::SessionEvent;
use aven_core::types::{AgentState, Origin};
use aven_knowledge::{
    excerpt, HttpKnowledgeClient, KnowledgeClient, QueryResponse, ScriptKnowledgeClient,
};

use crate::cli::{CliArgs, Command};

type AppResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> AppResult {
    let args = CliArgs::parse();

    let config_path = args.resolve_config_path();
    let loaded = AvenConfig::load(&config_path);
    let log_level = args.resolve_log_level(
        loaded
            .as_ref()
            .map(|c| c.general.log_level.as_str())
            .unwrap_or("info"),
    );
    init_tracing(&log_level);

    let mut config = match loaded {
        Ok(config) => {
            tracing::info!(path = %config_path.display(), "Configuration loaded");
            config
        }
        Err(e) => {
            if config_path.exists() {
                tracing::warn!(path = %config_path.display(), error = %e, "Invalid config, using defaults");
            } else {
                tracing::debug!(path = %config_path.display(), "No config file, using defaults");
            }
            AvenConfig::default()
        }
    };
    config.apply_env_overrides();

    match &args.command {
        Command::Serve { .. } => {
            let port = args.resolve_port(config.general.port);
            serve(config, port).await
        }
        Command::Chat { direct } => chat(config, *direct).await,
        Command::Query { text, http, json } => query(&config, &text.join(" "), *http, *json).await,
    }
}

/// Install the fmt subscriber. `RUST_LOG` wins over `default_level`.
fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn knowledge_backend(config: &AvenConfig, http: bool) -> Arc<dyn KnowledgeClient> {
    if http {
        Arc::new(HttpKnowledgeClient::from_config(&config.knowledge))
    } else {
        Arc::new(ScriptKnowledgeClient::from_config(&config.knowledge))
    }
}

// =============================================================================
// serve
// =============================================================================

async fn serve(mut config: AvenConfig, port: u16) -> AppResult {
    tracing::info!("Starting AVEN API v{}", env!("CARGO_PKG_VERSION"));
    config.general.port = port;
    let knowledge = knowledge_backend(&config, false);
    let router = create_router(AppState::new(config, knowledge));

    let addr = format!("127.0.0.1:{}", port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind, is another instance running?");
            return Err(e.into());
        }
    };

    tracing::info!(addr = %addr, "API server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}

// =============================================================================
// chat
// =============================================================================

async fn chat(config: AvenConfig, direct: bool) -> AppResult {
    let knowledge = knowledge_backend(&config, !direct);
    // No browser voice SDK in a terminal: text and synthesis only.
    let mut widget = Widget::new(SessionFactory::new(config, knowledge));
    let events = widget.open().events();
    let printer = tokio::spawn(print_events(events));

    println!("Type a message. Commands: /listen /audio /dismiss /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let result = match line {
            "/quit" | "/exit" => break,
            "" => Ok(()),
            "/audio" => widget.toggle_audio().await.map(|enabled| {
                println!("Audio {}", if enabled { "on" } else { "off" });
            }),
            command => {
                let Some(session) = widget.session() else {
                    break;
                };
                match command {
                    "/listen" => session.toggle_listening().await,
                    "/dismiss" => session.dismiss_error().await,
                    text => session.submit_text(text).await,
                }
            }
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Command failed");
        }
    }

    if let Some(timeline) = widget.close().await {
        tracing::info!(messages = timeline.len(), "Chat ended");
    }
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "Event printer failed");
    }
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => render_event(&event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event printer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn render_event(event: &SessionEvent) {
    match event {
        SessionEvent::MessageAppended { message } => {
            let speaker = match message.origin {
                Origin::User => "You",
                Origin::Assistant => "AVEN",
            };
            println!("[{}] {}: {}", message.display_time(), speaker, message.text);
        }
        SessionEvent::AgentStateChanged { state } if *state != AgentState::Idle => {
            println!("  ({}...)", state);
        }
        SessionEvent::ErrorRaised { message } => println!("! {}", message),
        SessionEvent::VoiceStatusChanged { status } => {
            tracing::debug!(?status, "Voice status changed");
        }
        SessionEvent::SpeakRequested { text } => {
            tracing::debug!(chars = text.len(), "Speech playback requested");
        }
        _ => {}
    }
}

// =============================================================================
// query
// =============================================================================

async fn query(config: &AvenConfig, text: &str, http: bool, json: bool) -> AppResult {
    let client = knowledge_backend(config, http);
    let result = client.query(text).await?;
    let ranked = result.ranked();

    if json {
        let response = QueryResponse::ok(text, ranked.into_iter().cloned().collect());
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if ranked.is_empty() {
        println!("No results for \"{}\"", text);
        return Ok(());
    }
    for (i, hit) in ranked.iter().enumerate() {
        println!("{}. {} ({:.1}%)", i + 1, hit.title, hit.score * 100.0);
        if let Some(url) = &hit.url {
            println!("   {}", url);
        }
        println!("   {}...", excerpt(&hit.content, 200));
    }
    Ok(())
}
