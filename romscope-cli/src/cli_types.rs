//! CLI argument definitions.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "romscope")]
#[command(about = "Identify ROM, disc, save and texture files and show their metadata", long_about = None)]
pub(crate) struct Cli {
    /// Files to inspect
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Print one JSON array instead of text
    #[arg(long)]
    pub json: bool,

    /// Key file (defaults to $ROMSCOPE_KEYS, then <config dir>/romscope/keys.conf)
    #[arg(long, value_name = "PATH")]
    pub keys: Option<PathBuf>,

    /// Display language for localized titles (e.g., en, ja, fr)
    #[arg(long, value_name = "CODE")]
    pub lang: Option<String>,

    /// Write every internal image as PNG into this directory
    #[arg(long, value_name = "DIR")]
    pub images: Option<PathBuf>,

    /// List external image URLs
    #[arg(long)]
    pub urls: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
