//! `multipart/mixed` batch requests and responses
//!
//! The Gmail batch endpoint accepts one POST whose body is a sequence of
//! embedded HTTP requests, each wrapped in a MIME part tagged with a
//! `Content-ID` of `<item:ID>`. The response mirrors it: one part per
//! sub-request, tagged `<response-item:ID>`, containing an embedded HTTP
//! response (status line, headers, blank line, JSON body).
//!
//! Parsing is tolerant: a sub-part that is malformed, has no recognizable
//! `Content-ID`, reports a non-2xx status, or carries an unparsable body is
//! logged and skipped. Only a missing boundary in the response content type
//! fails the whole response.

use crate::error::{Error, Result};
use rand::Rng;
use rand::distributions::Alphanumeric;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

static BOUNDARY_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?i)boundary=(?:"([^"]+)"|([^;]+))"#).ok());

static RESPONSE_ID_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^content-id:\s*<response-item:([^>]+)>\s*$").ok());

static STATUS_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^HTTP/\d(?:\.\d)?\s+(\d{3})").ok());

const BOUNDARY_LEN: usize = 21;

/// A fresh random boundary, prefixed with `batch_`
pub fn random_boundary() -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_LEN)
        .map(char::from)
        .collect();
    format!("batch_{}", token)
}

/// `Content-Type` header value for a batch body with this boundary
pub fn content_type(boundary: &str) -> String {
    format!("multipart/mixed; boundary={}", boundary)
}

/// Build the batch body fetching metadata for each message id
///
/// `api_base` is the Gmail REST base the embedded requests target
/// (e.g. `https://www.googleapis.com`).
pub fn build_batch_body(boundary: &str, ids: &[String], api_base: &str) -> String {
    let api_base = api_base.trim_end_matches('/');
    let mut lines: Vec<String> = Vec::with_capacity(ids.len() * 6 + 2);
    lines.push(String::new());

    for id in ids {
        lines.push(format!("--{}", boundary));
        lines.push("Content-Type: application/http".to_string());
        lines.push(format!("Content-ID: <item:{}>", id));
        lines.push(String::new());
        lines.push(format!(
            "GET {}/gmail/v1/users/me/messages/{}?format=metadata",
            api_base,
            urlencoding::encode(id)
        ));
        lines.push(String::new());
    }

    lines.push(format!("--{}--", boundary));
    lines.join("\r\n")
}

/// Extract the boundary from a `multipart/*` content type
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let re = BOUNDARY_RE.as_ref()?;
    let captures = re.captures(content_type)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().trim().to_string())
        .filter(|b| !b.is_empty())
}

/// Parse a batch response into JSON bodies keyed by item id
///
/// When the same id appears more than once the first occurrence wins.
pub fn parse_batch_response(body: &str, content_type: &str) -> Result<HashMap<String, Value>> {
    let boundary = boundary_from_content_type(content_type).ok_or_else(|| {
        Error::malformed(
            "batch response",
            format!("no multipart boundary in content type {:?}", content_type),
        )
    })?;

    // Normalizing the leading delimiter lets one split handle the first part too
    let normalized = format!("\r\n{}", body);
    let delimiter = format!("\r\n--{}", boundary);
    let mut parts: Vec<&str> = normalized.split(delimiter.as_str()).collect();

    // parts[0] is the preamble; a closing delimiter leaves a trailing "--" element
    if parts.len() < 2 {
        return Ok(HashMap::new());
    }
    parts.remove(0);
    if parts.last().is_some_and(|last| last.starts_with("--")) {
        parts.pop();
    } else {
        tracing::warn!(boundary = %boundary, "Batch response has no closing delimiter");
    }

    let mut by_id = HashMap::new();
    for (index, part) in parts.into_iter().enumerate() {
        match parse_part(part) {
            Ok((id, value)) => {
                by_id.entry(id).or_insert(value);
            }
            Err(reason) => {
                tracing::warn!(part = index, reason = %reason, "Skipping batch sub-response");
            }
        }
    }

    Ok(by_id)
}

fn parse_part(part: &str) -> std::result::Result<(String, Value), String> {
    let mut sections = part.splitn(3, "\r\n\r\n");
    let outer_headers = sections.next().unwrap_or_default();
    let inner_head = sections
        .next()
        .ok_or_else(|| "missing embedded HTTP response".to_string())?;
    let body = sections
        .next()
        .ok_or_else(|| "missing embedded response body".to_string())?;

    let id = outer_headers
        .split("\r\n")
        .find_map(|line| {
            RESPONSE_ID_RE
                .as_ref()?
                .captures(line.trim())
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
        .ok_or_else(|| "no response-item Content-ID".to_string())?;

    let status_line = inner_head.split("\r\n").next().unwrap_or_default();
    let status = STATUS_RE
        .as_ref()
        .and_then(|re| re.captures(status_line.trim()))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .ok_or_else(|| format!("item {}: bad status line {:?}", id, status_line))?;

    if !(200..300).contains(&status) {
        return Err(format!("item {}: status {}", id, status));
    }

    let value = serde_json::from_str(body.trim())
        .map_err(|e| format!("item {}: invalid JSON body: {}", id, e))?;
    Ok((id, value))
}

/// Encode a batch response; the inverse of [`parse_batch_response`]
///
/// Each part is `(id, status, json body)`. Used for fixtures and by mock
/// servers that stand in for the batch endpoint.
pub fn encode_batch_response(boundary: &str, parts: &[(String, u16, Value)]) -> String {
    let mut out = String::new();
    for (id, status, body) in parts {
        out.push_str(&format!("--{}\r\n", boundary));
        out.push_str("Content-Type: application/http\r\n");
        out.push_str(&format!("Content-ID: <response-item:{}>\r\n", id));
        out.push_str("\r\n");
        out.push_str(&format!("HTTP/1.1 {} {}\r\n", status, reason_phrase(*status)));
        out.push_str("Content-Type: application/json; charset=UTF-8\r\n");
        out.push_str("\r\n");
        out.push_str(&body.to_string());
        out.push_str("\r\n");
    }
    out.push_str(&format!("--{}--\r\n", boundary));
    out
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
