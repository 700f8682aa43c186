use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "asset-relations-explorer",
    version,
    about = "Asset reference and build-inclusion explorer",
    long_about = "Analyse a content repository manifest: which container roots reference which assets, which assets are reachable from a build, and how dense textures are on the meshes that show them. Results can be narrowed with a filter expression such as `hero mat:skin t:texture`."
)]
pub struct Cli {
    /// Suppress non-essential output (progress and summaries)
    #[arg(short, long, global = true, default_value_t = false)]
    pub quiet: bool,
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InclusionArg {
    All,
    Included,
    Excluded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnOffArg {
    On,
    Off,
}

/// Flags shared by every view command.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Path to the repository manifest (JSON)
    #[arg(short, long, env = "ASSET_EXPLORER_MANIFEST")]
    pub manifest: Option<PathBuf>,
    /// Path to a TOML configuration file (default: asset-relations-explorer.toml next to the manifest)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Filter expression, e.g. `hero mat:skin t:texture`
    #[arg(long)]
    pub filter: Option<String>,
    /// Output format: text or json (default: `[query] default_format`, then text)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
    /// Skip the first N display rows
    #[arg(long, default_value_t = 0)]
    pub offset: usize,
    /// Show at most N display rows
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List assets with their users and build inclusion
    Usages {
        #[command(flatten)]
        common: CommonArgs,
        /// Override the stored inclusion filter
        #[arg(long, value_enum)]
        included: Option<InclusionArg>,
        /// Override the stored ignore-scripts setting
        #[arg(long, value_enum)]
        ignore_scripts: Option<OnOffArg>,
    },
    /// List container roots with the assets they reference
    References {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// List assets with the container roots that reference them
    ReferencedBy {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Estimate texture pixels per meter on rendered meshes
    Density {
        #[command(flatten)]
        common: CommonArgs,
        /// Override the stored density level (1-10)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
        level: Option<u8>,
    },
    /// Tell whether one asset is part of a build, and why
    Included {
        /// Asset path as listed in the manifest
        path: String,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Show or change stored view preferences
    Prefs {
        /// Path to the repository manifest (preferences live next to it)
        #[arg(short, long, env = "ASSET_EXPLORER_MANIFEST")]
        manifest: Option<PathBuf>,
        #[arg(long, value_enum)]
        included: Option<InclusionArg>,
        #[arg(long, value_enum)]
        ignore_scripts: Option<OnOffArg>,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
        density_level: Option<u8>,
        /// Reset all preferences to defaults
        #[arg(long, default_value_t = false)]
        reset: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
