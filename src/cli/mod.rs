//! Command-line interface for pagescope.
//!
//! ```bash
//! pagescope --site site.toml render catalog --param lang=en
//! pagescope --site site.toml render catalog --requests 8   # concurrent requests
//! pagescope plan catalog --format json
//! pagescope validate
//! ```
//!
//! Every command loads the site file, builds the data catalog and resolves
//! the pages it touches before doing anything else, so resolution errors
//! are reported up front.

mod plan;
mod render;
mod validate;

pub use plan::PlanCommand;
pub use render::RenderCommand;
pub use validate::ValidateCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Output format of the inspection commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Render pages from a site file.
#[derive(Parser, Debug)]
#[command(
    name = "pagescope",
    about = "Render pages whose elements are bound to scoped, typed data",
    version,
    long_about = "pagescope assembles pages from a TOML site file, resolves which supplier \
                  fills which data scope once, then renders requests against that plan."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Site file to load.
    #[arg(long, global = true, env = "PAGESCOPE_SITE", default_value = "site.toml")]
    site: PathBuf,

    /// Enable debug logging. Mutually exclusive with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Disable logging.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a page to HTML
    Render(RenderCommand),

    /// Show the resolved supply plan of one or all pages
    Plan(PlanCommand),

    /// Resolve every page and report failures
    Validate(ValidateCommand),
}

impl Cli {
    /// Log filter directive implied by the verbosity flags.
    ///
    /// `None` means logging is off.
    pub fn log_filter(&self) -> Option<&'static str> {
        if self.quiet {
            None
        } else if self.verbose {
            Some("pagescope=debug")
        } else {
            Some("pagescope=warn")
        }
    }

    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Render(cmd) => cmd.execute(&self.site).await,
            Commands::Plan(cmd) => cmd.execute(&self.site),
            Commands::Validate(cmd) => cmd.execute(&self.site),
        }
    }
}
