//! Configuration and source types for reference resolution.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default timeout for HTTP requests (10 seconds).
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum number of HTTP redirects to follow.
pub const HTTP_REDIRECTS: u32 = 5;

/// Classification of a resolved location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathType {
    /// A local filesystem path (including `file://` URLs).
    File,
    /// An `http://` or `https://` URL.
    Http,
    /// Some other protocol (`ftp://`, `mongodb://`, ...).
    Unknown,
}

/// How the dereferencer handles a circular `$ref`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CircularPolicy {
    /// Link the ref to the ancestor node, producing a true cycle (default).
    #[default]
    Allow,
    /// Same linking behavior as `Allow`; kept as a distinct setting so
    /// callers can express "I don't care about cycles" explicitly.
    Ignore,
    /// Abort with a `Circular` error on the first circular ref found.
    Error,
}

impl CircularPolicy {
    /// Parse a policy from a string.
    ///
    /// Returns `None` for unknown values (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "allow" | "true" => Some(CircularPolicy::Allow),
            "ignore" => Some(CircularPolicy::Ignore),
            "error" | "false" => Some(CircularPolicy::Error),
            _ => None,
        }
    }
}

/// Options controlling the filesystem reader.
#[derive(Debug, Clone)]
pub struct FileOptions {
    /// Whether filesystem locations may be resolved at all.
    pub enabled: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Options controlling the HTTP reader.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Whether HTTP locations may be resolved at all.
    pub enabled: bool,
    /// Extra request headers, sent with every download.
    pub headers: Vec<(String, String)>,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum number of redirects to follow.
    pub redirects: u32,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            headers: Vec::new(),
            timeout: HTTP_TIMEOUT,
            redirects: HTTP_REDIRECTS,
        }
    }
}

/// Options controlling which locations may be fetched, and how.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub file: FileOptions,
    pub http: HttpOptions,
}

/// Per-content-type parse options.
#[derive(Debug, Clone)]
pub struct MediaOptions {
    /// Whether blank content is accepted (parsing to an empty document)
    /// or rejected with an empty-content error.
    pub allow_empty: bool,
}

impl Default for MediaOptions {
    fn default() -> Self {
        Self { allow_empty: true }
    }
}

/// Options for the content parsers.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub json: MediaOptions,
    pub yaml: MediaOptions,
    pub text: MediaOptions,
    pub binary: MediaOptions,
}

/// Options for the dereferencing engine.
#[derive(Debug, Clone, Default)]
pub struct DereferenceOptions {
    pub circular: CircularPolicy,
}

/// Top-level options accepted by every entry point.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub resolve: ResolveOptions,
    pub parse: ParseOptions,
    pub dereference: DereferenceOptions,
    /// Collect per-ref failures and report them together at the end of the
    /// run, instead of aborting on the first one.
    pub continue_on_error: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the circular-ref policy.
    pub fn circular(mut self, policy: CircularPolicy) -> Self {
        self.dereference.circular = policy;
        self
    }

    /// Enable or disable continue-on-error aggregation.
    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    /// Set `allow_empty` for all content types at once.
    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.parse.json.allow_empty = allow;
        self.parse.yaml.allow_empty = allow;
        self.parse.text.allow_empty = allow;
        self.parse.binary.allow_empty = allow;
        self
    }

    /// Set the HTTP request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.resolve.http.timeout = timeout;
        self
    }
}

/// A root document to process: a location string, or an in-memory value.
///
/// In-memory values are assigned a synthetic base location (the current
/// working directory) so relative external refs inside them still resolve.
#[derive(Debug, Clone)]
pub enum Source {
    Location(String),
    Value(Value),
}

impl From<&str> for Source {
    fn from(location: &str) -> Self {
        Source::Location(location.to_string())
    }
}

impl From<String> for Source {
    fn from(location: String) -> Self {
        Source::Location(location)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Location(path.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Location(path.to_string_lossy().into_owned())
    }
}

impl From<Value> for Source {
    fn from(value: Value) -> Self {
        Source::Value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_policy_parse_valid() {
        assert_eq!(CircularPolicy::parse("allow"), Some(CircularPolicy::Allow));
        assert_eq!(CircularPolicy::parse("true"), Some(CircularPolicy::Allow));
        assert_eq!(
            CircularPolicy::parse("ignore"),
            Some(CircularPolicy::Ignore)
        );
        assert_eq!(CircularPolicy::parse("error"), Some(CircularPolicy::Error));
        assert_eq!(CircularPolicy::parse("false"), Some(CircularPolicy::Error));
    }

    #[test]
    fn circular_policy_parse_invalid() {
        assert_eq!(CircularPolicy::parse("no"), None);
        assert_eq!(CircularPolicy::parse(""), None);
    }

    #[test]
    fn defaults() {
        let options = Options::new();
        assert!(options.resolve.file.enabled);
        assert!(options.resolve.http.enabled);
        assert_eq!(options.resolve.http.timeout, HTTP_TIMEOUT);
        assert!(options.parse.yaml.allow_empty);
        assert_eq!(options.dereference.circular, CircularPolicy::Allow);
        assert!(!options.continue_on_error);
    }

    #[test]
    fn builder_methods() {
        let options = Options::new()
            .circular(CircularPolicy::Error)
            .continue_on_error(true)
            .allow_empty(false);
        assert_eq!(options.dereference.circular, CircularPolicy::Error);
        assert!(options.continue_on_error);
        assert!(!options.parse.json.allow_empty);
        assert!(!options.parse.binary.allow_empty);
    }
}
