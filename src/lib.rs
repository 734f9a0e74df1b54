pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod history;
pub mod logging;
pub mod model;
pub mod providers;
pub mod session;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use std::io;
use std::time::Duration;
use tracing::info;

use cli::Args;
use config::Config;
use gateway::OpenAiGateway;

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let args = Args::parse();
    let cfg = Config::resolve(args, io::stdin().lock())?;
    info!(
        model = %cfg.model,
        temperature = cfg.temperature,
        has_system_prompt = cfg.system_prompt.is_some(),
        continue_conversation = cfg.continue_conversation,
        history_path = ?cfg.history_path,
        "loaded runtime configuration"
    );

    let mut builder = Client::builder();
    if let Some(secs) = cfg.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let client = builder
        .build()
        .context("Failed to initialize HTTP client")?;

    let gateway = OpenAiGateway::new(&client, &cfg);
    session::run_once(&gateway, &cfg, &mut io::stdout().lock()).await
}
