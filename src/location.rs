//! Location utilities: classifying filesystem paths vs URLs, fragment and
//! query handling, relative resolution, and the encoded-path conversions
//! needed to treat local paths and URLs uniformly.
//!
//! Canonical locations are stored in URL-encoded form with forward slashes,
//! so two references to the same resource compare string-equal regardless of
//! how they were spelled.

use url::Url;

use crate::error::Error;
use crate::types::PathType;

/// Characters that `decode_uri` leaves percent-encoded because they have
/// special meaning in URLs.
const RESERVED: &str = "#$&+,/:;=?@";

/// Characters that `encode_uri` passes through unchanged (beyond
/// alphanumerics).
const UNENCODED: &str = "-_.!~*'();/?:@&=+$,#";

/// Returns the protocol of the given location, lowercased, or `None` if it
/// has no protocol.
pub fn get_protocol(path: &str) -> Option<String> {
    let idx = path.find("://")?;
    let scheme = &path[..idx];
    if scheme.len() >= 2
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Some(scheme.to_ascii_lowercase())
    } else {
        None
    }
}

/// Returns the lowercased file extension of the given location, or an empty
/// string if it has none. Any query string is stripped first.
pub fn get_extension(path: &str) -> String {
    match path.rfind('.') {
        Some(idx) => strip_query(&path[idx..]).to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Removes the query, if any, from the given location.
pub fn strip_query(path: &str) -> &str {
    match path.find('?') {
        Some(idx) => &path[..idx],
        None => path,
    }
}

/// Returns the hash (URL fragment) of the given location, including the
/// leading `#`. If there is no hash, the root hash (`"#"`) is returned.
pub fn get_hash(path: &str) -> &str {
    match path.find('#') {
        Some(idx) => &path[idx..],
        None => "#",
    }
}

/// Removes the hash (URL fragment), if any, from the given location.
pub fn strip_hash(path: &str) -> &str {
    match path.find('#') {
        Some(idx) => &path[..idx],
        None => path,
    }
}

/// Determines whether the given location is an HTTP(S) URL.
pub fn is_http(path: &str) -> bool {
    matches!(get_protocol(path).as_deref(), Some("http" | "https"))
}

/// Determines whether the given location is a filesystem path.
/// This includes `file://` URLs.
pub fn is_file_system_path(path: &str) -> bool {
    match get_protocol(path) {
        None => true,
        Some(protocol) => protocol == "file",
    }
}

/// Classifies a location as a file path, an HTTP URL, or something else.
pub fn path_type(path: &str) -> PathType {
    if is_http(path) {
        PathType::Http
    } else if is_file_system_path(path) {
        PathType::File
    } else {
        PathType::Unknown
    }
}

/// Returns the current working directory in encoded form, with a trailing
/// slash so it can serve as a base for relative resolution.
pub fn cwd() -> String {
    let path = std::env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| String::from("/"));

    let mut encoded = from_file_system_path(&path);
    if !encoded.ends_with('/') {
        encoded.push('/');
    }
    encoded
}

/// Resolves `relative` against `base` with URL-resolution semantics.
///
/// Filesystem bases are treated as `file:` URLs internally so relative
/// paths, `..` segments, and absolute targets all behave the same way
/// regardless of protocol. Absolute URLs in `relative` win outright.
///
/// # Errors
///
/// Returns a `Resolver` error if either side cannot be interpreted as a URL.
pub fn resolve(base: &str, relative: &str) -> Result<String, Error> {
    if get_protocol(relative).is_some() {
        return Ok(relative.to_string());
    }

    let resolver_err = |message: String| Error::Resolver {
        location: relative.to_string(),
        message,
    };

    if is_http(base) {
        let joined = Url::parse(base)
            .and_then(|u| u.join(relative))
            .map_err(|e| resolver_err(e.to_string()))?;
        return Ok(joined.to_string());
    }

    // Filesystem base: wrap in a file: URL for the relative-resolution math,
    // then strip the protocol back off.
    let base_url = if base.starts_with('/') {
        format!("file://{base}")
    } else {
        format!("file:///{base}")
    };
    let joined = Url::parse(&base_url)
        .and_then(|u| u.join(relative))
        .map_err(|e| resolver_err(e.to_string()))?;

    let joined = joined.to_string();
    let path = joined.strip_prefix("file://").unwrap_or(&joined);

    // A Windows drive comes back as "/C:/dir"; drop the artificial slash.
    if cfg!(windows) && path.len() >= 3 && path.as_bytes()[2] == b':' {
        return Ok(path[1..].to_string());
    }
    Ok(path.to_string())
}

/// Converts a filesystem path to a properly-encoded location.
///
/// Handles characters which are legal in paths but not in URLs: `#` and `?`
/// are percent-encoded on the way out, and on Windows backslashes become
/// forward slashes rather than `%5C`.
pub fn from_file_system_path(path: &str) -> String {
    let path = if cfg!(windows) {
        path.replace('\\', "/")
    } else {
        path.to_string()
    };

    encode_uri(&path).replace('?', "%3F").replace('#', "%23")
}

/// Converts an encoded location back to a local filesystem path.
///
/// If `keep_file_protocol` is true, `file://` URLs are returned in
/// consistently-formatted `file:///` form instead of being converted to a
/// plain path.
pub fn to_file_system_path(path: &str, keep_file_protocol: bool) -> String {
    let mut path = decode_uri(path);

    // Decode characters that are reserved in URLs but ordinary in paths.
    for (encoded, plain) in [
        ("%23", "#"),
        ("%24", "$"),
        ("%26", "&"),
        ("%2C", ","),
        ("%40", "@"),
    ] {
        path = path.replace(encoded, plain);
    }

    let mut is_file_url = path.len() >= 7 && path[..7].eq_ignore_ascii_case("file://");
    if is_file_url {
        // Strip the protocol, and the initial "/" if there is one.
        path = if path.as_bytes().get(7) == Some(&b'/') {
            path[8..].to_string()
        } else {
            path[7..].to_string()
        };

        // Reinsert the colon after the drive letter on Windows.
        if cfg!(windows) && path.as_bytes().get(1) == Some(&b'/') {
            path = format!("{}:{}", &path[..1], &path[1..]);
        }

        if keep_file_protocol {
            path = format!("file:///{path}");
        } else {
            is_file_url = false;
            if !cfg!(windows) {
                path = format!("/{path}");
            }
        }
    }

    if cfg!(windows) && !is_file_url {
        path = path.replace('/', "\\");
        if path.len() >= 3 && &path[1..3] == ":\\" {
            path = format!("{}{}", path[..1].to_uppercase(), &path[1..]);
        }
    }

    path
}

/// Converts a `$ref` pointer to a sequence of path tokens.
///
/// Returns an empty sequence for any string that is not an internal pointer
/// starting with `#/`.
pub fn safe_pointer_to_path(pointer: &str) -> Vec<String> {
    if pointer.len() <= 1 || !pointer.starts_with("#/") {
        return Vec::new();
    }

    pointer[2..]
        .split('/')
        .map(|token| {
            percent_decode(token, false)
                .replace("~1", "/")
                .replace("~0", "~")
        })
        .collect()
}

/// Percent-decodes every escape sequence in a pointer token.
pub(crate) fn decode_token(token: &str) -> String {
    percent_decode(token, false)
}

fn encode_uri(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || UNENCODED.contains(ch) {
            out.push(ch);
        } else {
            let mut buf = [0_u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

fn decode_uri(input: &str) -> String {
    percent_decode(input, true)
}

fn percent_decode(input: &str, keep_reserved: bool) -> String {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let decoded = if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = &input[i + 1..i + 3];
            u8::from_str_radix(hex, 16).ok()
        } else {
            None
        };

        match decoded {
            Some(byte) if !(keep_reserved && RESERVED.contains(byte as char)) => {
                out.push(byte);
                i += 3;
            }
            Some(_) => {
                // Reserved character stays encoded.
                out.extend_from_slice(&bytes[i..i + 3]);
                i += 3;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
