//! EduAdapt - adapt a document for a learning profile

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eduadapt::{
    auto_adapt_on_load, Args, EduAdaptConfig, FileSettingsStore, MemoryDocument, PageController,
    Profile, RunOutcome, TracingSink,
};
use eduadapt_agent::{backend::openai::OpenAiBackend, AdaptationService, LlmBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EduAdaptConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EduAdaptConfig::default(),
    };

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.general.log_level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("eduadapt={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  EduAdapt - page adaptation");
    info!("======================================");
    info!("Document: {}", args.document.display());
    info!("Backend: {} ({})", args.backend_url, args.model);
    info!("======================================");

    let backend = OpenAiBackend::new(&args.backend_url, &args.model, args.api_key.clone())
        .context("creating text model backend")?;
    let backends: Vec<Arc<dyn LlmBackend>> = vec![Arc::new(backend)];
    let service = Arc::new(AdaptationService::new(backends));
    if !service.check_availability().await {
        warn!("Text model at {} is not answering; runs will report failures", args.backend_url);
    }

    let json = tokio::fs::read_to_string(&args.document)
        .await
        .with_context(|| format!("reading {}", args.document.display()))?;
    let document = Arc::new(MemoryDocument::from_json(&json).context("parsing document")?);

    let controller = PageController::with_config(
        Arc::clone(&document),
        service,
        Arc::new(TracingSink),
        config.clone(),
    );

    let report = match (&args.settings, &args.profile) {
        (Some(path), _) => {
            let store = FileSettingsStore::new(path);
            match auto_adapt_on_load(&controller, &store, config.general.settle_delay()).await? {
                Some(report) => report,
                None => {
                    info!("Auto-adapt is off or no profile is saved; nothing to do");
                    return Ok(());
                }
            }
        }
        (None, Some(selection)) => {
            let Some(profile) = Profile::from_selection(selection) else {
                error!("Please select a learning profile first.");
                std::process::exit(1);
            };
            controller.adapt_page(profile, Some(args.options())).await?
        }
        (None, None) => anyhow::bail!("either --profile or --settings is required"),
    };

    if let RunOutcome::SupportAttached { jobs } = report.outcome {
        if let Some(reading) = controller.reading() {
            reading.wait_idle().await;
            info!(jobs, prefetched = reading.completed(), "Prefetch settled");
            if args.reveal_all {
                reading.reveal_all();
                reading.wait_idle().await;
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(output) = &args.output {
        tokio::fs::write(output, document.to_html())
            .await
            .with_context(|| format!("writing {}", output.display()))?;
        info!("Adapted document written to {}", output.display());
    }

    Ok(())
}
