//! Prompt templates — parsed once, rendered per request.
//!
//! Supported placeholders:
//!
//! - `{{{field}}}` or `{{field}}` — replaced by the field's value as text.
//! - `{{media url=field}}` — the field's Media Reference becomes a separate
//!   media part; the text gets a `[media:<n>]` marker at that position.
//!
//! Rendering is single-pass: substituted values are never re-scanned, so a
//! value containing `{{...}}` appears literally in the output.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::flow::media::MediaReference;
use crate::flow::schema::{FieldKind, ObjectSchema};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{\{\{\s*([A-Za-z_]\w*)\s*\}\}\}|\{\{\s*media\s+url\s*=\s*([A-Za-z_]\w*)\s*\}\}|\{\{\s*([A-Za-z_]\w*)\s*\}\}",
    )
    .expect("placeholder regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Value(String),
    Media(String),
}

/// A parsed prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Split the source into literal text and placeholders. Anything that
    /// does not match placeholder syntax is kept as literal text.
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER_RE.captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() > last {
                segments.push(Segment::Literal(source[last..whole.start()].to_string()));
            }
            if let Some(name) = caps.get(2) {
                segments.push(Segment::Media(name.as_str().to_string()));
            } else if let Some(name) = caps.get(1).or_else(|| caps.get(3)) {
                segments.push(Segment::Value(name.as_str().to_string()));
            }
            last = whole.end();
        }
        if last < source.len() {
            segments.push(Segment::Literal(source[last..].to_string()));
        }

        Self {
            source: source.to_string(),
            segments,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names referenced by placeholders, in template order.
    pub fn placeholders(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Value(name) | Segment::Media(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Author-time check: every placeholder names a declared input field of
    /// a kind it can interpolate.
    pub fn check_against(&self, schema: &ObjectSchema) -> Result<(), String> {
        for segment in &self.segments {
            match segment {
                Segment::Literal(_) => {}
                Segment::Value(name) => {
                    let field = schema.field(name).ok_or_else(|| {
                        format!("template references undeclared field '{}'", name)
                    })?;
                    if !field.kind.is_scalar() {
                        return Err(format!(
                            "field '{}' is {} and cannot be interpolated as text",
                            name,
                            field.kind.expected()
                        ));
                    }
                }
                Segment::Media(name) => {
                    let field = schema.field(name).ok_or_else(|| {
                        format!("template references undeclared field '{}'", name)
                    })?;
                    if field.kind != FieldKind::Media {
                        return Err(format!(
                            "media placeholder on field '{}' which is {}, not media",
                            name,
                            field.kind.expected()
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Render against validated input. Absent optional fields render as
    /// empty text or no media part.
    pub fn render(&self, input: &Value) -> Result<RenderedRequest, String> {
        let mut parts = Vec::new();
        let mut text = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => text.push_str(literal),
                Segment::Value(name) => match input.get(name) {
                    None | Some(Value::Null) => {}
                    Some(Value::String(s)) => text.push_str(s),
                    Some(Value::Bool(b)) => text.push_str(if *b { "true" } else { "false" }),
                    Some(other) => {
                        return Err(format!(
                            "field '{}' holds a non-scalar value ({})",
                            name, other
                        ))
                    }
                },
                Segment::Media(name) => match input.get(name) {
                    None | Some(Value::Null) => {}
                    Some(Value::String(uri)) => {
                        let media = MediaReference::parse(uri)
                            .map_err(|e| format!("field '{}': {}", name, e))?;
                        if !text.is_empty() {
                            parts.push(RequestPart::Text(std::mem::take(&mut text)));
                        }
                        parts.push(RequestPart::Media(media));
                    }
                    Some(_) => return Err(format!("field '{}' is not a media string", name)),
                },
            }
        }
        if !text.is_empty() {
            parts.push(RequestPart::Text(text));
        }

        Ok(RenderedRequest { parts })
    }
}

/// One ordered piece of a rendered request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPart {
    Text(String),
    Media(MediaReference),
}

/// Text and media parts, interleaved in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedRequest {
    pub parts: Vec<RequestPart>,
}

impl RenderedRequest {
    /// Marker placed in the text where the n-th media part was referenced.
    pub fn media_token(index: usize) -> String {
        format!("[media:{}]", index)
    }

    /// Full prompt text with media markers.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut media_index = 0;
        for part in &self.parts {
            match part {
                RequestPart::Text(t) => out.push_str(t),
                RequestPart::Media(_) => {
                    out.push_str(&Self::media_token(media_index));
                    media_index += 1;
                }
            }
        }
        out
    }

    pub fn text_segments(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                RequestPart::Text(t) => Some(t.as_str()),
                RequestPart::Media(_) => None,
            })
            .collect()
    }

    pub fn media_parts(&self) -> Vec<&MediaReference> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                RequestPart::Media(m) => Some(m),
                RequestPart::Text(_) => None,
            })
            .collect()
    }

    /// Payload-free summary for dry runs and logs.
    pub fn summary(&self) -> Value {
        serde_json::json!({
            "text": self.text(),
            "media": self
                .media_parts()
                .iter()
                .map(|m| serde_json::json!({ "mimeType": m.mime_type, "bytes": m.byte_len() }))
                .collect::<Vec<_>>(),
        })
    }
}
