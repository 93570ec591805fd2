use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum OapmcError {
    #[error("unrecognized uri: {0}")]
    #[diagnostic(help(
        "expected an open-access service uri such as https://www.ncbi.nlm.nih.gov/pmc/utils/oa/oa.fcgi?id=PMC3010060"
    ))]
    UnrecognizedUri(String),

    #[error("did not find the year")]
    MissingYear,

    #[error("request failed: {0}")]
    Http(String),

    #[error("server returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("identifier conversion failed: {0}")]
    IdConversion(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("decompression failed: {0}")]
    Archive(String),

    #[error("malformed xml: {0}")]
    Xml(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("html rendering failed: {0}")]
    Render(String),
}

impl OapmcError {
    /// HTTP status of the response the failure originated from, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            OapmcError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
