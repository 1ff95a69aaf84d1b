/// Errors produced anywhere in the IRD generation/read pipeline.
///
/// Variants map one-to-one onto the error kinds a caller needs to branch
/// on; `ShortRead` is deliberately absent here — it is logged, not
/// returned, since a short trailing read is recoverable.
#[derive(Debug, thiserror::Error)]
pub enum IrdError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("malformed GetKey log: {0}")]
    MalformedLog(String),

    #[error("invalid ISO: {0}")]
    InvalidIso(String),

    #[error("ISO has no regions")]
    NoRegions,

    #[error("unsupported IRD version: {0}")]
    UnsupportedVersion(u8),

    #[error("IRD checksum mismatch")]
    ChecksumMismatch,

    #[error("ISO9660 error: {0}")]
    Iso9660(#[from] ird_iso9660::Iso9660Error),
}

impl IrdError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn malformed_metadata(msg: impl Into<String>) -> Self {
        Self::MalformedMetadata(msg.into())
    }

    pub fn malformed_log(msg: impl Into<String>) -> Self {
        Self::MalformedLog(msg.into())
    }

    pub fn invalid_iso(msg: impl Into<String>) -> Self {
        Self::InvalidIso(msg.into())
    }
}
