//! Input classification.
//!
//! Every input is classified exactly once into a [`Source`], which the
//! acquirer then matches on. Binary payloads and text references arrive as
//! distinct [`Input`] variants, so there is no guessing about which is which.

use crate::error::{ErrorKind, Result};
use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use exn::OptionExt;
use std::path::{Path, PathBuf};

/// Case-insensitive prefix marking text as a base64 payload.
pub const BASE64_MARKER: &str = "base64:";
/// Unlabelled text shorter than this (whitespace excluded) is never taken
/// for base64.
const BASE64_MIN_LEN: usize = 64;

/// One item handed to a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Raw file content.
    Bytes(Vec<u8>),
    /// A path, URL or textual payload.
    Text(String),
}

impl Input {
    /// The text of a textual input. Batches deduplicate on this; binary
    /// payloads never collapse.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Input::Text(text) => Some(text),
            Input::Bytes(_) => None,
        }
    }
}

impl From<Vec<u8>> for Input {
    fn from(bytes: Vec<u8>) -> Self {
        Input::Bytes(bytes)
    }
}

impl From<&[u8]> for Input {
    fn from(bytes: &[u8]) -> Self {
        Input::Bytes(bytes.to_vec())
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Input::Text(text)
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Input::Text(text.to_string())
    }
}

/// What an input turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Bytes(Vec<u8>),
    /// `data:[<mime>][;base64],<payload>`
    DataUrl { mime: Option<String>, payload: String, base64: bool },
    /// Base64 text, either marked with [`BASE64_MARKER`] or recognised by shape.
    Base64Text { payload: String },
    RemoteUrl(String),
    LocalPath(PathBuf),
}

impl Source {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Source::Bytes(_) => "bytes",
            Source::DataUrl { .. } => "data-url",
            Source::Base64Text { .. } => "base64-text",
            Source::RemoteUrl(_) => "remote-url",
            Source::LocalPath(_) => "local-path",
        }
    }
}

/// Decide what `input` is. First match wins:
///
/// 1. binary payloads;
/// 2. `data:` URLs;
/// 3. text carrying the [`BASE64_MARKER`];
/// 4. `http://` and `https://` URLs;
/// 5. existing absolute paths, or paths under one of `managed_roots` (with or
///    without the leading slash);
/// 6. long text made only of base64 characters that actually decodes;
/// 7. anything else, as a local path that may or may not exist.
pub fn classify(input: Input, managed_roots: &[PathBuf]) -> Result<Source> {
    let text = match input {
        Input::Bytes(bytes) => return Ok(Source::Bytes(bytes)),
        Input::Text(text) => text,
    };
    let text = text.trim();
    if text.is_empty() {
        exn::bail!(ErrorKind::Classification);
    }

    if let Some(rest) = strip_prefix_ignore_case(text, "data:")
        && let Some((header, payload)) = rest.split_once(',')
    {
        let mut params = header.split(';');
        let mime = params.next().map(str::trim).filter(|mime| !mime.is_empty()).map(str::to_ascii_lowercase);
        let base64 = params.any(|param| param.trim().eq_ignore_ascii_case("base64"));
        return Ok(Source::DataUrl { mime, payload: payload.to_string(), base64 });
    }
    if let Some(payload) = strip_prefix_ignore_case(text, BASE64_MARKER) {
        return Ok(Source::Base64Text { payload: payload.to_string() });
    }
    if strip_prefix_ignore_case(text, "http://").is_some() || strip_prefix_ignore_case(text, "https://").is_some() {
        return Ok(Source::RemoteUrl(text.to_string()));
    }

    let path = Path::new(text);
    if path.is_absolute() && path.exists() {
        return Ok(Source::LocalPath(path.to_path_buf()));
    }
    if let Some(path) = under_managed_root(text, managed_roots) {
        return Ok(Source::LocalPath(path));
    }
    if looks_like_base64(text) && decode_base64(text).is_some() {
        return Ok(Source::Base64Text { payload: text.to_string() });
    }
    Ok(Source::LocalPath(path.to_path_buf()))
}

/// Decode base64 in either alphabet, ignoring whitespace and missing padding.
///
/// Tries the standard alphabet, then the URL-safe one, then the standard one
/// after mapping `-`/`_` to `+`/`/` (for text that mixes both). Empty input
/// decodes to nothing.
pub fn decode_base64(text: &str) -> Option<Vec<u8>> {
    let mut cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    let remainder = cleaned.len() % 4;
    if remainder != 0 {
        cleaned.extend(std::iter::repeat_n('=', 4 - remainder));
    }
    STANDARD
        .decode(&cleaned)
        .or_else(|_| URL_SAFE.decode(&cleaned))
        .or_else(|_| STANDARD.decode(cleaned.replace('-', "+").replace('_', "/")))
        .ok()
}

/// Decode the payload of a `data:` URL.
pub fn decode_data_url(payload: &str, base64: bool) -> Result<Vec<u8>> {
    if base64 {
        return decode_base64(payload).ok_or_raise(|| ErrorKind::Decode);
    }
    Ok(urlencoding::decode_binary(payload.as_bytes()).into_owned())
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}

/// `sdcard/DCIM/a.jpg` and `/sdcard/DCIM/a.jpg` both resolve to the absolute
/// form when `/sdcard` is a managed root.
fn under_managed_root(text: &str, roots: &[PathBuf]) -> Option<PathBuf> {
    let relative = text.trim_start_matches('/');
    roots.iter().find_map(|root| {
        let root = root.to_str()?.trim_matches('/');
        if root.is_empty() {
            return None;
        }
        let rest = relative.strip_prefix(root)?;
        (rest.is_empty() || rest.starts_with('/')).then(|| PathBuf::from(format!("/{relative}")))
    })
}

fn looks_like_base64(text: &str) -> bool {
    let mut len = 0;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        if !(c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '-' | '_' | '=')) {
            return false;
        }
        len += 1;
    }
    len >= BASE64_MIN_LEN
}
