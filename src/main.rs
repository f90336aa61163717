use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use futures_util::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use transcript_relay::cli::{Cli, Commands};
use transcript_relay::config::Config;
use transcript_relay::output;
use transcript_relay::relay::{HttpRelaySource, HttpRelayValidator, RelayPool, RelayProbe};
use transcript_relay::server::{self, AppState};
use transcript_relay::utils::format_duration;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    let config = match &cli.command {
        // The file may not exist yet
        Commands::Config { init: true, .. } => Config::default(),
        _ => Config::load(cli.config.as_deref())?,
    };

    match cli.command {
        Commands::Serve { bind } => {
            let bind_addr = bind.unwrap_or_else(|| config.server.bind_addr.clone());
            let state = AppState::from_config(config)?;
            server::serve(state, &bind_addr).await?;
        }
        Commands::Fetch {
            video,
            output,
            format,
            compact,
        } => {
            let state = AppState::from_config(config)?;

            let progress = if cli.quiet {
                ProgressBar::hidden()
            } else {
                ProgressBar::new_spinner()
            };
            progress.set_style(
                ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
            );
            progress.enable_steady_tick(Duration::from_millis(120));
            progress.set_message(format!("Fetching transcript for {}...", video));

            let result = server::retrieve_transcript(&state.orchestrator, &video).await;
            match &result {
                Ok(response) => progress.finish_with_message(format!(
                    "Transcript fetched: {} segments, {}",
                    response.data.metadata.total_segments,
                    format_duration(response.data.metadata.duration)
                )),
                Err(_) => progress.finish_with_message("Transcript fetch failed"),
            }
            let response = result?;

            match output {
                Some(path) => {
                    output::save_to_file(&response, &path, &format, !compact)?;
                    println!("Transcript saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&response, &format, !compact)?;
                }
            }
        }
        Commands::Relays { test } => {
            let source = HttpRelaySource::from_config(&config.relays)?;
            let pool = RelayPool::new(
                Arc::new(source),
                Duration::from_secs(config.relays.refresh_interval_secs),
                Duration::from_secs(config.relays.empty_retry_secs),
            );
            pool.ensure_fresh().await;

            let relays = pool.relays().await;
            println!("Collected {} relays:", relays.len());
            for relay in &relays {
                println!("  • {}", relay);
            }

            if test > 0 {
                let validator = HttpRelayValidator::from_config(&config.validator);
                let sample = pool.sample(test).await;
                let checks = join_all(sample.iter().map(|relay| validator.is_compatible_with_target(relay))).await;

                println!("Target probe ({}):", config.validator.target_probe_url);
                for (relay, working) in sample.iter().zip(checks) {
                    println!("  {} {}", if working { "✓" } else { "✗" }, relay);
                }
            }
        }
        Commands::Config { show, init } => {
            if init {
                let path = match cli.config {
                    Some(path) => path,
                    None => Config::config_path()?,
                };
                Config::default().save(&path)?;
                println!("Default configuration written to: {}", path.display());
            } else {
                if !show {
                    println!("Pass --init to write the default configuration file.");
                    println!();
                }
                config.display();
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "transcript_relay=debug,tower_http=debug"
    } else {
        "transcript_relay=info,tower_http=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}
