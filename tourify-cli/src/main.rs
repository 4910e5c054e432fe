mod cli;
mod commands;
mod config;
mod error;
mod output;
mod player;

use crate::{
    cli::{Args, Commands},
    commands::CommandExecutor,
    config::AppConfig,
    error::Result,
    output::OutputManager,
};
use clap::Parser;
#[cfg(feature = "colored-output")]
use colored::*;
use std::process;
use tracing::{Level, debug, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let json_errors = args.output.is_json();
    let result = run(args).await;

    if let Err(e) = result {
        if json_errors {
            let error_json = serde_json::json!({
                "status": "error",
                "message": e.to_string(),
            });
            println!("{error_json}");
        } else {
            error!("Application error: {}", e);
            #[cfg(feature = "colored-output")]
            {
                eprintln!("{} {}", "Error:".red().bold(), e);
            }
            #[cfg(not(feature = "colored-output"))]
            {
                eprintln!("Error: {}", e);
            }
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet)?;
    tourify_client::http::install_rustls_provider();

    // Commands that must work even when the config file is broken
    match &args.command {
        Commands::Completions { shell } => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Args::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
            return Ok(());
        }
        Commands::Config { show, reset } => {
            if *reset {
                let path = AppConfig::reset(args.config.as_deref())?;
                println!("✓ Configuration reset to defaults ({})", path.display());
            } else if *show {
                let config = AppConfig::load(args.config.as_deref())?;
                println!("{}", config.show()?);
            } else {
                println!(
                    "Use --show to display current configuration or --reset to reset to defaults"
                );
            }
            return Ok(());
        }
        _ => {}
    }

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(base_url) = args.base_url {
        config.client.base_url = base_url;
        config.client.validate()?;
    }
    debug!(base_url = %config.client.base_url, "Configuration loaded");

    let colored = config.output.colored && !args.no_color;
    let output = OutputManager::new(args.output, colored);
    let executor = CommandExecutor::new(config, output, args.output_file)?;

    match args.command {
        Commands::Tracks { play, preview_secs } => {
            executor.list_tracks(&play, preview_secs).await?;
        }
        Commands::Import { url } => {
            executor.import_listing(&url).await?;
        }
        Commands::Generate {
            files,
            listing,
            track,
            aspect_ratio,
            no_wait,
        } => {
            executor
                .generate(files, listing.as_deref(), track, aspect_ratio, no_wait)
                .await?;
        }
        Commands::Status { run_id, watch } => {
            executor.status(&run_id, watch).await?;
        }
        Commands::Runs => executor.list_runs().await?,
        Commands::Library => executor.media_library().await?,
        Commands::Upload { files } => executor.upload(&files).await?,
        Commands::Split { media_id, commit } => executor.split(&media_id, commit).await?,
        Commands::GmailExport { email, no_wait } => {
            executor.gmail_export(email, no_wait).await?;
        }
        Commands::Transcript {
            file,
            at,
            plain,
            normalize,
        } => executor.transcript(&file, at, plain, normalize)?,
        Commands::Overlay { at, fps, x, y } => executor.overlay(at, fps, x, y)?,
        Commands::Session { reset } => executor.session(reset)?,
        Commands::Completions { .. } | Commands::Config { .. } => {}
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(verbose)
                .with_level(verbose)
                .with_writer(std::io::stderr),
        )
        .init();
    Ok(())
}
