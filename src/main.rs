//! aturi: ATProto link resolver
//!
//! - Server mode (default): HTTP resolver for canonical `/<id>[/<collection>/<rkey>]` links
//! - CLI mode: `resolve`, `link` and `waypoints` for direct use
//!
//! Exit codes: 0 success, 1 invalid input, 2 network/API, 3 not found or
//! unresolved, 4 timeout, 5 other.

mod atproto;
mod cache;
mod cli;
mod config;
mod error;
mod format;
mod http;
mod link;
mod resolve;
mod server;
mod waypoints;

#[cfg(test)]
mod test_support;

use clap::Parser;
use cli::{Cli, Commands, LinkArgs, ResolveArgs, ServeArgs, WaypointsArgs};
use config::Config;
use error::AppError;
use link::LinkGenerator;
use resolve::ContentResolver;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use waypoints::recommend::Recommender;
use waypoints::WaypointRegistry;

/// Upper bound for one CLI resolution, across all upstream calls
const CLI_TIMEOUT: Duration = Duration::from_secs(120);

/// What a command prints and how the process exits
struct Output {
    text: String,
    exit_code: i32,
}

impl Output {
    fn ok(text: String) -> Self {
        Self { text, exit_code: 0 }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli).await {
        Ok(output) => {
            if !output.text.is_empty() {
                println!("{}", output.text);
            }
            std::process::exit(output.exit_code);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// `--quiet` and `--verbose` win over RUST_LOG; logs go to stderr so stdout stays clean
fn init_logging(cli: &Cli) {
    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<Output, AppError> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    debug!("Effective configuration: {:?}", config);

    match cli.command {
        None => execute_serve(&config, ServeArgs::default()).await,
        Some(Commands::Serve(args)) => execute_serve(&config, args).await,
        Some(Commands::Resolve(args)) => execute_resolve_cli(&config, args).await,
        Some(Commands::Link(args)) => execute_link_cli(&config, args),
        Some(Commands::Waypoints(args)) => execute_waypoints_cli(args),
    }
}

async fn execute_serve(config: &Config, args: ServeArgs) -> Result<Output, AppError> {
    let mut config = config.clone();
    args.apply(&mut config);

    info!("Starting aturi {}", env!("CARGO_PKG_VERSION"));
    server::serve(&config).await?;
    Ok(Output::ok(String::new()))
}

/// Full pipeline; failures print their own explanation and set the exit code
async fn execute_resolve_cli(config: &Config, args: ResolveArgs) -> Result<Output, AppError> {
    let resolver = ContentResolver::from_config(config)?;

    let resolution = timeout(CLI_TIMEOUT, resolver.resolve(&args.input))
        .await
        .map_err(|_| {
            AppError::Timeout(format!(
                "Request exceeded {} second timeout",
                CLI_TIMEOUT.as_secs()
            ))
        })?;

    let text = if args.json {
        serde_json::to_string_pretty(&resolution)?
    } else {
        format::format_resolution(&resolution)
    };

    Ok(Output {
        text,
        exit_code: resolution.exit_code(),
    })
}

fn execute_link_cli(config: &Config, args: LinkArgs) -> Result<Output, AppError> {
    let link = LinkGenerator::new(config.site_base()).generate(&args.input)?;

    if args.open {
        if webbrowser::open(&link).is_ok() {
            info!("Opened {} in browser", link);
        } else {
            eprintln!("\nCould not open a browser. Visit this URL instead:");
        }
    }

    Ok(Output::ok(link))
}

fn execute_waypoints_cli(args: WaypointsArgs) -> Result<Output, AppError> {
    let recommender = Recommender::new(Arc::new(WaypointRegistry::builtin()));
    let recommended =
        recommender.recommended_waypoints(args.content_type, args.collection.as_deref());
    let categories = recommender.categorized_waypoints(args.content_type);

    let text = if args.json {
        serde_json::to_string_pretty(&serde_json::json!({
            "type": args.content_type,
            "recommended": recommended,
            "categories": categories,
        }))?
    } else {
        format::format_waypoints(&recommended, &categories)
    };

    Ok(Output::ok(text))
}
