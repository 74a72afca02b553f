mod api_client;
mod auth;
mod config;
mod errors;
mod models;
mod render;
mod session;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::api_client::RequestClient;
use crate::auth::firebase::FirebaseIdentity;
use crate::auth::AuthGate;
use crate::config::Config;
use crate::models::Document;
use crate::session::SessionController;

/// Analyze a résumé against a job description and print interview questions.
#[derive(Parser, Debug)]
#[command(name = "client", version, about)]
struct Args {
    /// Résumé PDF to analyze
    #[arg(long, value_name = "PATH")]
    resume: PathBuf,

    /// Job role or description to compare against
    #[arg(long, value_name = "TEXT")]
    job: String,

    /// Question difficulty for the initial analysis
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=5))]
    difficulty: u8,

    /// Regenerate the questions at this difficulty once the analysis lands
    #[arg(long, value_name = "LEVEL", value_parser = clap::value_parser!(u8).range(1..=5))]
    regenerate_at: Option<u8>,

    /// Run the project deep dive after the initial analysis
    #[arg(long)]
    deep_dive: bool,

    /// Generate questions for one project from the résumé
    #[arg(long, value_name = "NAME")]
    project: Option<String>,

    #[arg(long, env = "CLIENT_EMAIL")]
    email: String,

    #[arg(long, env = "CLIENT_PASSWORD", hide_env_values = true)]
    password: String,

    /// Create the account instead of signing in
    #[arg(long)]
    sign_up: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting interview client v{}", env!("CARGO_PKG_VERSION"));

    let identity = FirebaseIdentity::new(&config).context("Failed to build identity client")?;
    let gate = Arc::new(AuthGate::new(Arc::new(identity)));

    let principal = if args.sign_up {
        gate.sign_up(&args.email, &args.password).await
    } else {
        gate.sign_in(&args.email, &args.password).await
    }
    .context("Authentication failed")?;
    info!("Signed in as {}", principal.email.as_deref().unwrap_or(&principal.id));

    let backend = RequestClient::new(&config).context("Failed to build HTTP client")?;
    info!("Backend: {}", config.api_url);

    let mut controller =
        SessionController::new(gate, Arc::new(backend), config.regenerate_debounce);

    controller.select_document(Document::from_path(&args.resume).await?);
    controller.set_job_description(args.job.as_str());
    controller.change_difficulty(args.difficulty)?;

    if let Err(e) = controller.submit_initial_analysis() {
        warn!("Initial analysis not sent: {e}");
    }
    controller.settle().await;

    if let Some(level) = args.regenerate_at {
        controller.change_difficulty(level)?;
        controller.settle().await;
    }

    if args.deep_dive {
        if let Err(e) = controller.request_deep_dive() {
            warn!("Deep dive not sent: {e}");
        }
    }
    if let Some(project) = args.project.as_deref() {
        if let Err(e) = controller.request_project_drilldown(project) {
            warn!("Project drilldown not sent: {e}");
        }
    }
    controller.settle().await;

    print!("{}", render::render_session(controller.state()));

    Ok(())
}
