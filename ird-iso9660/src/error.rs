/// Errors raised while reading an ISO9660 filesystem.
#[derive(Debug, thiserror::Error)]
pub enum Iso9660Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing or invalid Primary Volume Descriptor: {0}")]
    InvalidPvd(String),

    #[error("path not found: {0}")]
    NotFound(String),
}
