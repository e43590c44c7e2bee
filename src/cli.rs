//! Command-line interface
//!
//! With no subcommand the HTTP server starts, so `aturi` alone is a
//! deployable binary.

use crate::config::Config;
use crate::waypoints::ContentType;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// aturi: open any ATProto link in the app of your choice
#[derive(Parser, Debug)]
#[command(name = "aturi")]
#[command(about = "Resolve ATProto links and point them at compatible apps", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to <config dir>/aturi/config.json)
    #[arg(long, global = true, env = "ATURI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Public base URL for generated links
    #[arg(long, global = true, env = "ATURI_SITE_URL")]
    pub site_url: Option<String>,

    /// Upstream request timeout in seconds
    #[arg(long, global = true, env = "ATURI_TIMEOUT")]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP resolver (default)
    Serve(ServeArgs),
    /// Resolve an AT URI, app URL, handle or DID
    Resolve(ResolveArgs),
    /// Print the canonical shareable link for an input
    Link(LinkArgs),
    /// List the waypoints for a content type
    Waypoints(WaypointsArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Listen address
    #[arg(short, long, env = "ATURI_BIND")]
    pub bind: Option<String>,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// at://..., https://bsky.app/profile/..., handle or DID
    pub input: String,

    /// Print JSON instead of Markdown
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    pub input: String,

    /// Open the link in the default browser
    #[arg(short, long)]
    pub open: bool,
}

#[derive(Args, Debug)]
pub struct WaypointsArgs {
    /// post, profile, list or record
    #[arg(short = 't', long = "type")]
    pub content_type: ContentType,

    /// Record collection, for collection-specific recommendations
    #[arg(short, long)]
    pub collection: Option<String>,

    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Layer flag and environment overrides on top of file configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(site_url) = &self.site_url {
            config.site_url = site_url.clone();
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = timeout;
        }
    }
}

impl ServeArgs {
    /// Server-only overrides
    pub fn apply(&self, config: &mut Config) {
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
    }
}
