use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lernsession::{
    config::{Config, LogFormat},
    gateway::HttpQuestionGateway,
    model::{Difficulty, SessionModule},
    service::SessionService,
    storage::SqliteSessionStore,
};

/// Run one full generate-and-grade session cycle from the command line
#[derive(Parser, Debug)]
#[command(name = "lernsession", version, about)]
struct Args {
    /// Exam module to generate (reading, listening, writing, speaking)
    #[arg(long, default_value = "reading")]
    module: SessionModule,

    /// Difficulty level (beginner, intermediate, advanced)
    #[arg(long, default_value = "intermediate")]
    difficulty: String,

    /// User id the session belongs to
    #[arg(long, default_value = "demo-user")]
    user: String,

    /// Finalise the session immediately after generation and print the
    /// summary (unanswered questions score zero)
    #[arg(long)]
    complete: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        module = %args.module,
        "Session engine starting..."
    );

    let difficulty = match args.difficulty.to_lowercase().as_str() {
        "beginner" => Difficulty::Beginner,
        "advanced" => Difficulty::Advanced,
        _ => Difficulty::Intermediate,
    };

    // Initialize storage
    let store = match SqliteSessionStore::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            Arc::new(s)
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    // Initialize gateway client
    let gateway = match HttpQuestionGateway::new(&config.gateway) {
        Ok(g) => {
            info!(base_url = %config.gateway.base_url, "Gateway client initialized");
            Arc::new(g)
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize gateway client");
            return Err(e.into());
        }
    };

    let service = SessionService::new(gateway, store, config.generation.max_workers);

    let session = service
        .create_session(&args.user, args.module, difficulty)
        .await?;
    println!("Session created: {}", session.id);

    let (session, report) = service
        .generate_questions(&session.id, &args.user, None)
        .await?;
    println!(
        "Generation {:?}: {} Teils flushed, {} questions, {} units",
        report.status, report.teils_flushed, report.questions_persisted, report.units_persisted
    );
    if let Some(error) = &report.error {
        println!("Generation error: {}", error);
    }

    for question in &session.questions {
        let tag = if question.is_example { " [Beispiel]" } else { "" };
        println!(
            "Teil {} / {}{}: {} ({} P.)",
            question.teil, question.order, tag, question.prompt, question.points
        );
    }

    if args.complete {
        let session = service.complete_session(&session.id, &args.user).await?;
        if let Some(summary) = &session.summary {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
