//! romscope CLI
//!
//! Prints what romscope knows about each file given on the command line.

mod cli_types;
mod error;
mod images;
mod output;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use romscope_lib::{ParseContext, RomHandle, RomReport, SessionOptions};

use crate::cli_types::Cli;
use crate::error::CliError;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

/// Identify one file and build its report, writing images if asked to.
fn inspect(path: &Path, ctx: &ParseContext, cli: &Cli) -> Result<RomReport, CliError> {
    let mut handle = RomHandle::open_path(path, ctx.clone())?;
    if !handle.is_valid() {
        return Err(CliError::Unsupported);
    }
    let report = RomReport::build(&mut handle, cli.urls)?;
    if let Some(dir) = &cli.images {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        for written in images::dump_images(&mut handle, &stem, dir)? {
            log::info!("Wrote {}", written.display());
        }
    }
    handle.close();
    Ok(report)
}

#[derive(serde::Serialize)]
struct JsonEntry<'a> {
    path: &'a Path,
    #[serde(flatten)]
    report: Option<RomReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = SessionOptions {
        keys: cli.keys.clone(),
        language: cli.lang.clone(),
        image_host: None,
    }
    .parse_context();
    if !ctx.keys.is_loaded() {
        log::debug!("No key file loaded; encrypted regions will be unreadable");
    }

    let mut failed = false;
    let mut entries = Vec::new();
    for path in &cli.files {
        let result = inspect(path, &ctx, &cli);
        if result.is_err() {
            failed = true;
        }
        if cli.json {
            let (report, error) = match result {
                Ok(r) => (Some(r), None),
                Err(e) => (None, Some(e.to_string())),
            };
            entries.push(JsonEntry {
                path,
                report,
                error,
            });
            continue;
        }
        match result {
            Ok(report) => output::print_report(path, &report),
            Err(e) => output::print_unsupported(path, &e.to_string()),
        }
    }

    if cli.json {
        match serde_json::to_string_pretty(&entries) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                log::error!("Couldn't serialize report: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
