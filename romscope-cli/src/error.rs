use thiserror::Error;

use romscope_lib::RomError;

/// Errors that can stop the CLI from handling one file.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Rom(#[from] RomError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// No parser recognized the file
    #[error("unsupported file type")]
    Unsupported,
}
