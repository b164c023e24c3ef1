#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use quiz_rally_server::auth::HmacTokenVerifier;
use quiz_rally_server::config;
use quiz_rally_server::logging;
use quiz_rally_server::server::{InMemoryEventDispatcher, RuntimeConfig, TriviaServer};
use quiz_rally_server::store::{create_store, StoreConfig};
use quiz_rally_server::trivia::StaticQuestionBank;
use quiz_rally_server::websocket;
use std::net::SocketAddr;
use std::sync::Arc;

/// Quiz Rally -- server-authoritative multiplayer trivia over WebSocket
#[derive(Parser, Debug)]
#[command(name = "quiz-rally-server")]
#[command(about = "Server-authoritative multiplayer trivia with a turn/steal protocol")]
#[command(version)]
struct Cli {
    /// Check the effective configuration and exit without binding a socket,
    /// so a deploy pipeline can catch bad settings before rollout.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Dump the effective configuration as JSON and exit. Handy when a value
    /// could come from any of several files or environment variables.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from config.json / environment, falling back to
    // compiled defaults.
    let cfg = Arc::new(config::load());

    if cli.print_config {
        let rendered = serde_json::to_string_pretty(&*cfg)
            .map_err(|e| anyhow::anyhow!("config is not serializable: {e}"))?;
        println!("{rendered}");
        return Ok(());
    }

    // Startup validation: missing identity credentials are fatal.
    let startup_check = config::validate_startup(&cfg);

    if cli.validate_config {
        if let Err(problems) = &startup_check {
            eprintln!("Configuration problems:\n{problems}");
            std::process::exit(1);
        }
        println!("Configuration OK");
        println!("  port:               {}", cfg.port);
        println!("  environment:        {:?}", cfg.security.environment);
        println!(
            "  allowed origins:    {}",
            cfg.security.allowed_origins().len()
        );
        println!("  room code attempts: {}", cfg.server.room_code_attempts);
        println!(
            "  play-again window:  {}s",
            cfg.server.play_again_window_secs
        );
        return Ok(());
    }

    // Outside of --validate-config the same problems abort startup with a
    // non-zero exit.
    startup_check?;

    logging::init_with_config(&cfg.logging);

    let port: u16 = cfg.port;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "Starting Quiz Rally server");

    let auth_secret = cfg.security.resolve_auth_secret()?;
    let token_verifier = Arc::new(HmacTokenVerifier::new(auth_secret));

    let store: Arc<dyn quiz_rally_server::store::GameStore> =
        Arc::from(create_store(StoreConfig::InMemory));
    store.initialize().await?;

    let question_source = Arc::new(StaticQuestionBank::new());
    let dispatcher = Arc::new(InMemoryEventDispatcher::new());

    let server = TriviaServer::new(
        RuntimeConfig::from_config(&cfg),
        store,
        question_source,
        dispatcher,
        token_verifier,
    );

    let app = websocket::create_router(&cfg.security).with_state(server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = ?cfg.security.environment,
        "Server started - WebSocket: /ws, Health: /api/health"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install shutdown handler");
    }
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("quiz-rally-server").chain(args.iter().copied()))
    }

    #[test]
    fn bare_invocation_runs_the_server() {
        let cli = parse(&[]).unwrap();
        assert!(!cli.validate_config && !cli.print_config);
    }

    #[test]
    fn short_flag_maps_to_validate() {
        assert!(parse(&["-c"]).unwrap().validate_config);
        assert!(parse(&["--validate-config"]).unwrap().validate_config);
    }

    #[test]
    fn validate_and_print_are_mutually_exclusive() {
        let err = parse(&["--validate-config", "--print-config"]).unwrap_err();
        assert!(err.to_string().contains("cannot be used with"));
    }

    #[test]
    fn version_flag_short_circuits() {
        assert!(parse(&["--version"]).is_err());
    }
}
