//! HTTP request parser

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use percent_encoding::percent_decode_str;
use regex::Regex;
use thiserror::Error;
use url::form_urlencoded;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Empty request")]
    Empty,
    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),
}

/// Parsed request; immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    pub method: String,
    pub path: String,
    pub query_params: HashMap<String, String>,
    /// Header names are stored lowercased
    pub headers: HashMap<String, String>,
    pub body: String,
}

fn request_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z]+)\s+(\S+)\s+HTTP/\d(?:\.\d)?$").expect("valid request line regex")
    })
}

/// Compiled lookup pattern per header name, built on first use
fn header_regex(name: &str) -> Option<Regex> {
    static CACHE: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();
    let key = name.to_ascii_lowercase();
    let mut cache = CACHE
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    if let Some(re) = cache.get(&key) {
        return Some(re.clone());
    }
    let pattern = format!(r"(?im)^{}[ \t]*:[ \t]*([^\r\n]*?)[ \t]*\r?$", regex::escape(&key));
    let re = Regex::new(&pattern).ok()?;
    cache.insert(key, re.clone());
    Some(re)
}

/// Case-insensitive single-line lookup of a header in a raw header block
pub fn header_value(raw_headers: &str, name: &str) -> Option<String> {
    header_regex(name)?
        .captures(raw_headers)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

impl RawRequest {
    /// Parse a buffered request block
    pub fn parse(block: &[u8]) -> Result<Self, ParseError> {
        let text = String::from_utf8_lossy(block);
        if text.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let (head, body) = match text.split_once("\r\n\r\n") {
            Some((head, body)) => (head, body),
            None => (&*text, ""),
        };

        let mut lines = head.split("\r\n");
        let first_line = lines.next().unwrap_or_default().trim();

        let caps = request_line_regex()
            .captures(first_line)
            .ok_or_else(|| ParseError::MalformedRequestLine(first_line.to_string()))?;

        let method = caps[1].to_ascii_uppercase();
        let target = origin_form(&caps[2]);
        let (path, query_params) = split_path_query(target);

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        Ok(Self {
            method,
            path,
            query_params,
            headers,
            body: body.to_string(),
        })
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.header("Mcp-Session-Id").filter(|v| !v.is_empty())
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(|v| v.as_str())
    }
}

/// Strip scheme and authority when a client sends an absolute-form target
fn origin_form(target: &str) -> &str {
    match target.split_once("://") {
        Some((_, rest)) => match rest.find('/') {
            Some(idx) => &rest[idx..],
            None => "/",
        },
        None => target,
    }
}

/// Split a request target into its decoded path and query parameters
pub fn split_path_query(target: &str) -> (String, HashMap<String, String>) {
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p, q),
        None => (target, ""),
    };

    let params = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    (percent_decode(path), params)
}

/// Decode `%XX` escapes in a path; invalid escapes are kept verbatim
pub fn percent_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}
