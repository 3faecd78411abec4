use anyhow::{Context, Result};
use log::{info, warn};

use reference_retriever::common::setup_logging;
use reference_retriever::extract::GrobidClient;
use reference_retriever::sources::create_client;

use super::fetch::load_config;
use crate::cli::CheckConfigArgs;

async fn run_check_config_async(args: CheckConfigArgs) -> Result<()> {
    setup_logging(&args.log_level)?;

    let config = load_config(args.config.as_deref(), args.email.clone(), None)?;
    info!("Configuration is valid");
    info!("  Contact email: {}", config.contact_email);
    info!("  Threads: {}", config.max_threads);
    info!("  Minimum PDF size: {} bytes", config.min_pdf_size);

    info!("Enabled sources in priority order:");
    for (name, svc) in config.enabled_services() {
        info!(
            "  {} {}: {}/s (burst {}), timeout {}s",
            svc.priority,
            name,
            svc.rate_limit,
            svc.burst_size(),
            svc.timeout_secs
        );
    }

    if config.grobid.enabled {
        let client = create_client(&config).context("Failed to build HTTP client")?;
        let grobid = GrobidClient::new(client, &config.grobid);
        if grobid.is_alive().await {
            info!("Structured extraction service is reachable at {}", grobid.base_url());
        } else {
            warn!(
                "Structured extraction service is not reachable at {}; heuristic extraction will be used",
                grobid.base_url()
            );
        }
    } else {
        info!("Structured extraction service disabled");
    }

    Ok(())
}

pub fn run_check_config(args: CheckConfigArgs) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_check_config_async(args))
}
