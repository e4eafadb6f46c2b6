//! Permissive multipart/mixed decoder
//!
//! Riak answers sibling reads and link walks with `multipart/mixed` bodies.
//! Link walks nest one multipart section per hop, each holding one part per
//! matched object. Decoding never fails: sections that cannot be understood
//! are skipped and reported as [`Diagnostic`]s.

use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;
use tracing::debug;

use crate::types::{Headers, HeadersExt, CONTENT_TYPE};

static BOUNDARY_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)boundary=(?:"([^"]+)"|([A-Za-z0-9'()+_,\-./:=?]+))"#)
        .expect("boundary pattern is valid")
});

/// A leaf section: its headers and raw body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Part {
    pub headers: Headers,
    pub body: Bytes,
}

/// A decoded section, either a leaf part or a nested multipart body.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Part(Part),
    Multipart(Vec<Node>),
}

/// Why a section was skipped or truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The closing `--boundary--` never appeared; the last section runs to the end of the body.
    MissingCloseDelimiter { boundary: String },
    /// A nested multipart section declared no usable boundary.
    MissingNestedBoundary { boundary: String, section: usize },
    /// A header line without a `name: value` shape.
    MalformedHeaderLine { line: String },
}

/// Decoder output: everything that could be decoded plus what was skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parsed {
    pub nodes: Vec<Node>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Parsed {
    /// Every leaf part in document order, nesting flattened.
    pub fn parts(&self) -> Vec<&Part> {
        let mut parts = Vec::new();
        collect_parts(&self.nodes, &mut parts);
        parts
    }

    /// Leaf parts grouped by top-level section.
    ///
    /// A top-level leaf forms a group of its own.
    pub fn groups(&self) -> Vec<Vec<&Part>> {
        self.nodes
            .iter()
            .map(|node| {
                let mut parts = Vec::new();
                collect_parts(std::slice::from_ref(node), &mut parts);
                parts
            })
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

fn collect_parts<'a>(nodes: &'a [Node], out: &mut Vec<&'a Part>) {
    for node in nodes {
        match node {
            Node::Part(part) => out.push(part),
            Node::Multipart(children) => collect_parts(children, out),
        }
    }
}

/// Extract the `boundary` parameter of a `multipart/mixed` content type.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    if !content_type.to_ascii_lowercase().contains("multipart/mixed") {
        return None;
    }
    let caps = BOUNDARY_PARAM.captures(content_type)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Decode `body` using `boundary`, recursing into nested multipart sections.
pub fn parse(body: &Bytes, boundary: &str) -> Parsed {
    let mut diagnostics = Vec::new();
    let nodes = parse_sections(body, boundary, &mut diagnostics);
    Parsed { nodes, diagnostics }
}

fn parse_sections(body: &Bytes, boundary: &str, diagnostics: &mut Vec<Diagnostic>) -> Vec<Node> {
    let (sections, closed) = split_sections(body, boundary);
    if !closed {
        debug!("multipart body for boundary {} is not closed", boundary);
        diagnostics.push(Diagnostic::MissingCloseDelimiter {
            boundary: boundary.to_string(),
        });
    }

    let mut nodes = Vec::with_capacity(sections.len());
    for (index, range) in sections.into_iter().enumerate() {
        let section = &body[range.clone()];
        if section.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let (header_block, body_start) = split_head(section);

        let headers = parse_headers(header_block, diagnostics);
        let part_body = body.slice(range.start + body_start..range.end);

        let content_type = headers.first(CONTENT_TYPE).unwrap_or_default();
        if content_type.to_ascii_lowercase().contains("multipart/mixed") {
            match extract_boundary(content_type) {
                Some(nested) => nodes.push(Node::Multipart(parse_sections(
                    &part_body,
                    &nested,
                    diagnostics,
                ))),
                None => {
                    debug!("skipping section {} of {}: nested boundary missing", index, boundary);
                    diagnostics.push(Diagnostic::MissingNestedBoundary {
                        boundary: boundary.to_string(),
                        section: index,
                    });
                }
            }
        } else {
            nodes.push(Node::Part(Part {
                headers,
                body: part_body,
            }));
        }
    }
    nodes
}

/// Locate section contents between delimiter lines. Returns the ranges and
/// whether the closing delimiter was seen.
fn split_sections(body: &[u8], boundary: &str) -> (Vec<Range<usize>>, bool) {
    let delimiter = format!("--{}", boundary);
    let delimiter = delimiter.as_bytes();
    let mut sections = Vec::new();
    let mut open: Option<usize> = None;
    let mut cursor = 0;

    while let Some(pos) = find(body, delimiter, cursor) {
        cursor = pos + delimiter.len();
        // delimiters only count at the start of a line
        if pos > 0 && body[pos - 1] != b'\n' {
            continue;
        }
        let closing = body[cursor..].starts_with(b"--");
        let content_start = if closing {
            None
        } else {
            match line_end(body, cursor) {
                Some(next) => Some(next),
                None => continue,
            }
        };

        if let Some(start) = open.take() {
            sections.push(start..strip_line_break(body, start, pos));
        }
        if closing {
            return (sections, true);
        }
        open = content_start;
    }

    if let Some(start) = open {
        sections.push(start..body.len());
    }
    (sections, false)
}

/// Position after the line break that ends a delimiter line, allowing
/// trailing transport padding.
fn line_end(body: &[u8], mut at: usize) -> Option<usize> {
    while at < body.len() && (body[at] == b' ' || body[at] == b'\t') {
        at += 1;
    }
    match &body[at..] {
        [] => Some(at),
        [b'\r', b'\n', ..] => Some(at + 2),
        [b'\n', ..] => Some(at + 1),
        _ => None,
    }
}

/// The line break before a delimiter belongs to the delimiter.
fn strip_line_break(body: &[u8], start: usize, mut end: usize) -> usize {
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}

/// Split a section into its header block and the offset where the body starts.
///
/// A section without a blank line is all headers with an empty body.
fn split_head(section: &[u8]) -> (&[u8], usize) {
    match section {
        [b'\r', b'\n', ..] => return (&[], 2),
        [b'\n', ..] => return (&[], 1),
        _ => {}
    }
    for (i, byte) in section.iter().enumerate() {
        if *byte != b'\n' {
            continue;
        }
        match &section[i + 1..] {
            [b'\n', ..] => return (&section[..i], i + 2),
            [b'\r', b'\n', ..] => return (&section[..i], i + 3),
            _ => {}
        }
    }
    (section, section.len())
}

fn parse_headers(block: &[u8], diagnostics: &mut Vec<Diagnostic>) -> Headers {
    let text = String::from_utf8_lossy(block);
    let mut headers = Headers::new();
    let mut last: Option<String> = None;

    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        // obsolete line folding continues the previous value
        if line.starts_with([' ', '\t']) {
            if let Some(value) = last
                .as_ref()
                .and_then(|name| headers.get_mut(name))
                .and_then(|values| values.last_mut())
            {
                value.push(' ');
                value.push_str(line.trim());
                continue;
            }
        }
        match line.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                let name = name.trim().to_ascii_lowercase();
                headers.append_value(&name, value.trim());
                last = Some(name);
            }
            _ => diagnostics.push(Diagnostic::MalformedHeaderLine {
                line: line.to_string(),
            }),
        }
    }
    headers
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| offset + from)
}
