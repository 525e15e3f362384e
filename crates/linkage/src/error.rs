use std::fmt;

#[derive(Debug)]
pub enum LinkError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (no sources, bad threshold, etc.).
    ConfigValidation(String),
    /// A canonical snapshot required to build the indexes is empty.
    EmptyCanonicalSet(&'static str),
    /// Missing required column in source data.
    MissingColumn { source: String, column: String },
    /// Malformed value in a canonical snapshot (bad id, unknown record type).
    SourceParse(String),
    /// IO error (CSV read, etc.).
    Io(String),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::EmptyCanonicalSet(which) => {
                write!(f, "cannot build indexes: canonical {which} set is empty")
            }
            Self::MissingColumn { source, column } => {
                write!(f, "source '{source}': missing column '{column}'")
            }
            Self::SourceParse(msg) => write!(f, "source parse error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for LinkError {}
