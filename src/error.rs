//! Error types for reference resolution, dereferencing, and bundling.

use thiserror::Error;

use crate::registry::Refs;

/// Errors produced while resolving, dereferencing, or bundling a schema.
#[derive(Debug, Error)]
pub enum Error {
    // IO errors (exit code 3)
    #[error("error opening file {location}: {source}")]
    Read {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("error downloading {location}: {source}")]
    Download {
        location: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unable to resolve {location}: {message}")]
    Resolver { location: String, message: String },

    // Parse errors (exit code 2)
    #[error("error parsing {location}: {message}")]
    Parser { location: String, message: String },

    #[error("parsed value is empty: {location}")]
    EmptyContent { location: String },

    // Pointer errors (exit code 2)
    #[error("invalid $ref pointer \"{pointer}\": pointers must begin with \"#/\"")]
    InvalidPointer { pointer: String },

    #[error("token \"{token}\" does not exist in {pointer}")]
    MissingPointer { token: String, pointer: String },

    #[error("circular $ref pointer found at {pointer}")]
    Circular { pointer: String },

    // Continue-on-error aggregate (exit code 2)
    #[error("{0}")]
    Group(ErrorGroup),
}

impl Error {
    /// Short machine-readable name for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Read { .. } => "read",
            #[cfg(feature = "remote")]
            Error::Download { .. } => "download",
            Error::Resolver { .. } => "resolver",
            Error::Parser { .. } => "parser",
            Error::EmptyContent { .. } => "empty",
            Error::InvalidPointer { .. } => "invalid-pointer",
            Error::MissingPointer { .. } => "missing-pointer",
            Error::Circular { .. } => "circular",
            Error::Group(_) => "group",
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Read { .. } | Error::Resolver { .. } => 3,
            #[cfg(feature = "remote")]
            Error::Download { .. } => 3,
            _ => 2,
        }
    }
}

/// A single collected failure, tagged with where it was found.
///
/// `path` is the key/index trail from the containing document's root to the
/// `$ref` node that triggered the failure; `source` is the location of that
/// containing document.
#[derive(Debug)]
pub struct ErrorRecord {
    pub error: Box<Error>,
    pub path: Vec<String>,
    pub source: String,
}

impl ErrorRecord {
    /// The `path` trail as a JSON Pointer fragment (`#/a/b/0`).
    pub fn pointer(&self) -> String {
        let mut out = String::from("#");
        for token in &self.path {
            out.push('/');
            out.push_str(&token.replace('~', "~0").replace('/', "~1"));
        }
        out
    }
}

impl std::fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}: {}", self.source, self.pointer(), self.error)
    }
}

/// Aggregate failure produced by continue-on-error mode.
///
/// Holds every per-ref failure in discovery order, plus the registry built
/// before the run failed, so callers can inspect what did resolve.
#[derive(Debug)]
pub struct ErrorGroup {
    pub root: String,
    pub errors: Vec<ErrorRecord>,
    pub refs: Refs,
}

impl std::fmt::Display for ErrorGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} error{} occurred while reading and resolving {}",
            self.errors.len(),
            if self.errors.len() == 1 { "" } else { "s" },
            self.root
        )?;
        for record in &self.errors {
            writeln!(f, "  {record}")?;
        }
        Ok(())
    }
}
