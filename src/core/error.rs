use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Storage read/write failure
    Io,
    /// Persisted data failed a checksum or could not be decoded
    Corrupted,
    /// Storage location locked by another writer, or missing
    IndexUnavailable,
    /// Synonym query text rejected by the query grammar
    QuerySyntax,
    /// Record column queried without a registered searcher
    UnboundFieldIndex,
    InvalidArgument,
    InvalidState,
    Internal,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn unavailable(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::IndexUnavailable, context.into())
    }

    pub fn syntax(query: &str, reason: impl fmt::Display) -> Self {
        Error::new(
            ErrorKind::QuerySyntax,
            format!("cannot parse '{}': {}", query, reason),
        )
    }

    /// Keeps the kind, prefixes the context.
    pub fn with_prefix(self, prefix: impl fmt::Display) -> Self {
        Error {
            kind: self.kind,
            context: format!("{}: {}", prefix, self.context),
        }
    }

    /// True for both flavours of storage failure.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Io | ErrorKind::Corrupted)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error {
            kind: ErrorKind::Corrupted,
            context: err.to_string(),
        }
    }
}

impl From<fst::Error> for Error {
    fn from(err: fst::Error) -> Self {
        Error {
            kind: ErrorKind::Internal,
            context: format!("FST error: {}", err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::InvalidArgument,
            context: format!("invalid configuration: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
