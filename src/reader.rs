//! Content readers and parsers.
//!
//! Readers turn a location into raw bytes; parsers turn raw bytes into a
//! document value. Both are tried in priority order, so callers only depend
//! on the capability contract, not on where a document lives or how it is
//! encoded.

use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::location;
use crate::types::{MediaOptions, Options, PathType};

/// Produces raw bytes for a resolved location.
pub trait Reader {
    /// Whether this reader handles the given location under the current
    /// options.
    fn can_handle(&self, loc: &str, options: &Options) -> bool;

    /// Fetch the raw content.
    ///
    /// # Errors
    ///
    /// `Read`/`Download` on I/O failure.
    fn read(&self, loc: &str, options: &Options) -> Result<Vec<u8>, Error>;
}

/// Produces a document value from raw bytes.
pub trait ContentParser {
    /// Whether this parser claims the given location (usually by
    /// extension).
    fn can_handle(&self, loc: &str) -> bool;

    /// Parse the raw content.
    ///
    /// # Errors
    ///
    /// `Parser` on malformed content, `EmptyContent` when blank content is
    /// disallowed.
    fn parse(&self, content: &[u8], loc: &str, options: &Options) -> Result<Value, Error>;
}

/// Reads local files. Enabled by `options.resolve.file`.
pub struct FileReader;

impl Reader for FileReader {
    fn can_handle(&self, loc: &str, options: &Options) -> bool {
        options.resolve.file.enabled && location::is_file_system_path(loc)
    }

    fn read(&self, loc: &str, _options: &Options) -> Result<Vec<u8>, Error> {
        let path = location::to_file_system_path(loc, false);
        debug!(path = %path, "reading file");
        std::fs::read(&path).map_err(|source| Error::Read {
            location: path,
            source,
        })
    }
}

/// Downloads over HTTP(S). Enabled by `options.resolve.http`.
#[cfg(feature = "remote")]
pub struct HttpReader;

#[cfg(feature = "remote")]
impl Reader for HttpReader {
    fn can_handle(&self, loc: &str, options: &Options) -> bool {
        options.resolve.http.enabled && location::is_http(loc)
    }

    fn read(&self, loc: &str, options: &Options) -> Result<Vec<u8>, Error> {
        use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

        let http = &options.resolve.http;
        let mut headers = HeaderMap::new();
        for (name, value) in &http.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::Resolver {
                location: loc.to_string(),
                message: format!("invalid header name \"{name}\": {e}"),
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| Error::Resolver {
                location: loc.to_string(),
                message: format!("invalid header value for \"{name:?}\": {e}"),
            })?;
            headers.insert(name, value);
        }

        let network_err = |source: reqwest::Error| Error::Download {
            location: loc.to_string(),
            source,
        };

        debug!(url = %loc, "downloading");
        let client = reqwest::blocking::Client::builder()
            .timeout(http.timeout)
            .redirect(reqwest::redirect::Policy::limited(http.redirects as usize))
            .default_headers(headers)
            .build()
            .map_err(network_err)?;

        let response = client
            .get(loc)
            .send()
            .map_err(network_err)?
            .error_for_status()
            .map_err(network_err)?;

        response
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(network_err)
    }
}

/// Parses `.json` content.
pub struct JsonParser;

impl ContentParser for JsonParser {
    fn can_handle(&self, loc: &str) -> bool {
        location::get_extension(loc) == ".json"
    }

    fn parse(&self, content: &[u8], loc: &str, options: &Options) -> Result<Value, Error> {
        if let Some(empty) = empty_document(content, loc, &options.parse.json)? {
            return Ok(empty);
        }
        serde_json::from_slice(content).map_err(|e| Error::Parser {
            location: loc.to_string(),
            message: e.to_string(),
        })
    }
}

/// Parses `.yaml`/`.yml` content. YAML is a superset of JSON, so this
/// parser also accepts `.json`.
pub struct YamlParser;

impl ContentParser for YamlParser {
    fn can_handle(&self, loc: &str) -> bool {
        matches!(
            location::get_extension(loc).as_str(),
            ".yaml" | ".yml" | ".json"
        )
    }

    fn parse(&self, content: &[u8], loc: &str, options: &Options) -> Result<Value, Error> {
        if let Some(empty) = empty_document(content, loc, &options.parse.yaml)? {
            return Ok(empty);
        }
        serde_yaml::from_slice(content).map_err(|e| Error::Parser {
            location: loc.to_string(),
            message: e.to_string(),
        })
    }
}

const TEXT_EXTENSIONS: &[&str] = &[
    ".txt", ".htm", ".html", ".md", ".xml", ".js", ".css", ".csv",
];

/// Treats known text formats as a single string value.
pub struct TextParser;

impl ContentParser for TextParser {
    fn can_handle(&self, loc: &str) -> bool {
        TEXT_EXTENSIONS.contains(&location::get_extension(loc).as_str())
    }

    fn parse(&self, content: &[u8], loc: &str, options: &Options) -> Result<Value, Error> {
        if content.is_empty() && !options.parse.text.allow_empty {
            return Err(Error::EmptyContent {
                location: loc.to_string(),
            });
        }
        match std::str::from_utf8(content) {
            Ok(text) => Ok(Value::String(text.to_string())),
            Err(e) => Err(Error::Parser {
                location: loc.to_string(),
                message: format!("content is not valid UTF-8: {e}"),
            }),
        }
    }
}

/// Fallback for anything no other parser claims: the raw bytes as an array
/// of numbers.
pub struct BinaryParser;

impl ContentParser for BinaryParser {
    fn can_handle(&self, _loc: &str) -> bool {
        true
    }

    fn parse(&self, content: &[u8], loc: &str, options: &Options) -> Result<Value, Error> {
        if content.is_empty() && !options.parse.binary.allow_empty {
            return Err(Error::EmptyContent {
                location: loc.to_string(),
            });
        }
        Ok(Value::Array(
            content.iter().map(|b| Value::from(u64::from(*b))).collect(),
        ))
    }
}

/// The built-in readers, in priority order.
fn readers() -> Vec<Box<dyn Reader>> {
    let mut list: Vec<Box<dyn Reader>> = vec![Box::new(FileReader)];
    #[cfg(feature = "remote")]
    list.push(Box::new(HttpReader));
    list
}

/// The built-in parsers, in priority order.
fn parsers() -> Vec<Box<dyn ContentParser>> {
    vec![
        Box::new(JsonParser),
        Box::new(YamlParser),
        Box::new(TextParser),
        Box::new(BinaryParser),
    ]
}

/// Fetches raw content for a canonical location via the first reader that
/// claims it.
pub(crate) fn read_location(loc: &str, options: &Options) -> Result<(Vec<u8>, PathType), Error> {
    for reader in readers() {
        if reader.can_handle(loc, options) {
            return Ok((reader.read(loc, options)?, location::path_type(loc)));
        }
    }
    Err(Error::Resolver {
        location: loc.to_string(),
        message: "no enabled reader can handle this location".to_string(),
    })
}

/// Parses raw content via the first parser that claims the location.
///
/// Locations with an unrecognized extension fall back through the parser
/// chain: whichever parser accepts the content first wins.
pub(crate) fn parse_content(content: &[u8], loc: &str, options: &Options) -> Result<Value, Error> {
    let chain = parsers();

    // Extension dispatch, skipping the catch-all at the end of the chain.
    for parser in &chain[..chain.len() - 1] {
        if parser.can_handle(loc) {
            return parser.parse(content, loc, options);
        }
    }

    // Unknown extension: whichever parser accepts the content first wins.
    let mut last_err = Error::Parser {
        location: loc.to_string(),
        message: "no parser can handle this content".to_string(),
    };
    for parser in &chain {
        match parser.parse(content, loc, options) {
            Ok(value) => return Ok(value),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

/// Handles the blank-content policy shared by the JSON and YAML parsers.
fn empty_document(
    content: &[u8],
    loc: &str,
    media: &MediaOptions,
) -> Result<Option<Value>, Error> {
    let blank = content.iter().all(|b| b.is_ascii_whitespace());
    if !blank {
        return Ok(None);
    }
    if media.allow_empty {
        Ok(Some(Value::Null))
    } else {
        Err(Error::EmptyContent {
            location: loc.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_parser_claims_json_only() {
        assert!(JsonParser.can_handle("/a/b.json"));
        assert!(JsonParser.can_handle("/a/b.JSON?x=1"));
        assert!(!JsonParser.can_handle("/a/b.yaml"));
    }

    #[test]
    fn yaml_parser_accepts_yaml_and_json() {
        assert!(YamlParser.can_handle("/a/b.yaml"));
        assert!(YamlParser.can_handle("/a/b.yml"));
        assert!(YamlParser.can_handle("/a/b.json"));
        assert!(!YamlParser.can_handle("/a/b.txt"));
    }

    #[test]
    fn parse_json_content() {
        let options = Options::default();
        let value = parse_content(br#"{"a": 1}"#, "/doc.json", &options).unwrap();
        assert_eq!(value, json!({ "a": 1 }));
    }

    #[test]
    fn parse_yaml_content() {
        let options = Options::default();
        let value = parse_content(b"a: 1\nb:\n  - x\n", "/doc.yaml", &options).unwrap();
        assert_eq!(value, json!({ "a": 1, "b": ["x"] }));
    }

    #[test]
    fn parse_text_content() {
        let options = Options::default();
        let value = parse_content(b"hello", "/doc.txt", &options).unwrap();
        assert_eq!(value, json!("hello"));
    }

    #[test]
    fn malformed_json_names_location() {
        let options = Options::default();
        let err = parse_content(b"{not json", "/doc.json", &options).unwrap_err();
        match err {
            Error::Parser { location, .. } => assert_eq!(location, "/doc.json"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_json_allowed_by_default() {
        let options = Options::default();
        let value = parse_content(b"  \n", "/doc.json", &options).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn blank_yaml_rejected_when_disallowed() {
        let options = Options::default().allow_empty(false);
        let err = parse_content(b"", "/doc.yaml", &options).unwrap_err();
        match err {
            Error::EmptyContent { location } => assert_eq!(location, "/doc.yaml"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_extension_falls_back_to_binary() {
        let options = Options::default();
        let value = parse_content(&[0, 159, 146], "/doc.bin", &options).unwrap();
        assert_eq!(value, json!([0, 159, 146]));
    }

    #[test]
    fn file_reader_respects_disable_flag() {
        let mut options = Options::default();
        options.resolve.file.enabled = false;
        assert!(!FileReader.can_handle("/a/b.json", &options));
        let err = read_location("/a/b.json", &options).unwrap_err();
        assert!(matches!(err, Error::Resolver { .. }));
    }

    #[test]
    fn file_reader_missing_file() {
        let options = Options::default();
        let err = FileReader
            .read("/definitely/not/here.json", &options)
            .unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
        assert_eq!(err.exit_code(), 3);
    }
}
