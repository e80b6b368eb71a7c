pub mod run;
pub mod schema;
pub mod skills;

use crate::config::{Config, Provider, RunMode};
use crate::error::ConfigError;
use clap::{Parser, Subcommand};
use schema::SchemaTarget;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = "zonewise.yaml";

/// An explicitly named config must exist; the default one is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(path) => Config::load(path),
        None => Config::load_or_default(Path::new(DEFAULT_CONFIG)),
    }
}

#[derive(Parser)]
#[command(name = "zonewise")]
#[command(
    author,
    version,
    about = "Multi-stage property analysis: zoning, valuation, permits and building envelope"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze one parcel and print the report
    Run(RunArgs),

    /// Inspect the skill catalog and documents
    #[command(subcommand)]
    Skills(SkillsCommand),

    /// Print JSON Schema for the config or fixture file
    Schema {
        #[arg(value_enum, default_value_t = SchemaTarget::Config)]
        target: SchemaTarget,
    },
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    /// Parcel identifier to analyze
    pub parcel: String,

    /// Path to config file [default: zonewise.yaml, if present]
    #[arg(short, long, env = "ZONEWISE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override scheduling mode
    #[arg(long, value_enum)]
    pub mode: Option<RunMode>,

    /// Override the per-invocation reasoner timeout
    #[arg(long)]
    pub timeout_sec: Option<u64>,

    /// Override reasoning provider
    #[arg(long, value_enum)]
    pub provider: Option<Provider>,

    /// Canned responses file; implies --provider fixture
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// Override skills root directory
    #[arg(long)]
    pub skills_root: Option<PathBuf>,

    /// Override output directory
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Checkpoint key (defaults to the parcel id)
    #[arg(long)]
    pub thread_id: Option<String>,

    /// Continue from the thread's last checkpoint
    #[arg(long)]
    pub resume: bool,

    /// Write no report or checkpoint files
    #[arg(long)]
    pub no_write: bool,
}

#[derive(Parser, Clone)]
pub struct SkillsArgs {
    /// Path to config file [default: zonewise.yaml, if present]
    #[arg(short, long, env = "ZONEWISE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override skills root directory
    #[arg(long)]
    pub skills_root: Option<PathBuf>,
}

#[derive(Subcommand, Clone)]
pub enum SkillsCommand {
    /// List the Level 1 catalog
    List(SkillsArgs),

    /// Print a skill's full document
    Show {
        name: String,
        #[command(flatten)]
        args: SkillsArgs,
    },

    /// Print one of a skill's reference documents
    Reference {
        name: String,
        reference: String,
        #[command(flatten)]
        args: SkillsArgs,
    },
}
