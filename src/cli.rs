use clap::{Parser, Subcommand};
use std::path::PathBuf;

use reference_retriever::extract::ExtractionMethod;

#[derive(Parser)]
#[command(name = "reference-retriever")]
#[command(about = "Extract the reference list of a scholarly PDF and fetch open-access copies of the cited works")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract citations from a PDF and download every one that has an open-access copy
    Fetch(FetchArgs),

    /// Compare extraction backends on a PDF and report citation quality
    Diagnose(DiagnoseArgs),

    /// Validate the configuration and probe the structured extraction service
    CheckConfig(CheckConfigArgs),
}

#[derive(Parser, Clone)]
pub struct FetchArgs {
    /// Source PDF; downloads go to <stem><suffix> next to it
    pub pdf: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Contact email sent to the metadata services (overrides the config file)
    #[arg(short, long)]
    pub email: Option<String>,

    /// Concurrent citations (0 = number of CPUs)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Extraction backend
    #[arg(short, long, value_enum, default_value_t = ExtractionMethod::Auto)]
    pub method: ExtractionMethod,

    /// Skip extraction and load citation records from this JSON array instead
    #[arg(long)]
    pub references: Option<PathBuf>,

    /// Also write the session summary as JSON
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Logging level (DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, default_value = "INFO")]
    pub log_level: String,
}

#[derive(Parser, Clone)]
pub struct DiagnoseArgs {
    /// PDF to analyse
    pub pdf: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Contact email for the courtesy user agent (overrides the config file)
    #[arg(short, long)]
    pub email: Option<String>,

    /// Logging level (DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, default_value = "INFO")]
    pub log_level: String,
}

#[derive(Parser, Clone)]
pub struct CheckConfigArgs {
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Contact email to validate in place of the configured one
    #[arg(short, long)]
    pub email: Option<String>,

    /// Logging level (DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, default_value = "INFO")]
    pub log_level: String,
}
