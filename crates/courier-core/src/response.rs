//! Response decoding
//!
//! Inspects a finished exchange's content type and raw payload and produces
//! a typed value: parsed structured data, a markup document, or raw text.
//! Decode failures on the structured path are recovered: reported to the
//! diagnostic collaborator and surfaced as an absent value, never as a
//! rejection of their own.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use serde_json::Value;

use crate::diagnostics::{DecodeReporter, ParseFailure};

/// A decoded response value
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Structured data parsed from the response text
    Json(Value),
    /// Parsed markup document
    Xml(XmlDocument),
    /// Raw response text, passed through unchanged
    Text(String),
}

impl Body {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_xml(&self) -> Option<&XmlDocument> {
        match self {
            Body::Xml(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// An owned markup document
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root: XmlElement,
}

/// One element of a markup document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlDocument {
    /// Parse a markup document from raw text. Malformed or root-less input
    /// yields None; the caller decides what to degrade to.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut reader = Reader::from_str(raw.trim());
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event().ok()? {
                Event::Start(e) => stack.push(element_from(&e)?),
                Event::Empty(e) => {
                    let element = element_from(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    let text = t.unescape().ok()?;
                    append_text(stack.last_mut()?, &text);
                }
                Event::CData(t) => {
                    let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                    append_text(stack.last_mut()?, &text);
                }
                Event::End(_) => {
                    let element = stack.pop()?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Eof => break,
                // declarations, comments, processing instructions
                _ => {}
            }
        }

        if !stack.is_empty() {
            return None;
        }
        root.map(|root| XmlDocument { root })
    }

    /// The document's root element name
    pub fn root_name(&self) -> &str {
        &self.root.name
    }
}

fn element_from(e: &BytesStart<'_>) -> Option<XmlElement> {
    let name = std::str::from_utf8(e.name().as_ref()).ok()?.to_string();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.ok()?;
        let key = std::str::from_utf8(attr.key.as_ref()).ok()?.to_string();
        let value = attr.unescape_value().ok()?.into_owned();
        attributes.push((key, value));
    }
    Some(XmlElement {
        name,
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

fn append_text(element: &mut XmlElement, text: &str) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    if !element.text.is_empty() {
        element.text.push(' ');
    }
    element.text.push_str(trimmed);
}

/// Attach a completed element to its parent, or install it as the root.
/// A second root is malformed input.
fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Option<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Some(())
    } else if root.is_none() {
        *root = Some(element);
        Some(())
    } else {
        None
    }
}

/// Request context threaded into decode-failure reports
#[derive(Debug, Clone)]
pub(crate) struct DecodeContext<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub status_code: i64,
}

/// Decode a finished exchange's raw text against its declared content type.
///
/// Anything not declared as markup takes the structured-parse path, whatever
/// the content type claims; some backends declare the wrong type, so the
/// declaration alone is not trusted. A failed structured parse is reported
/// and recovered as an absent value.
pub(crate) fn decode(
    raw: &str,
    content_type: Option<&str>,
    ctx: &DecodeContext<'_>,
    reporter: &dyn DecodeReporter,
) -> Option<Body> {
    if raw.is_empty() {
        return None;
    }

    let xml_response_type =
        Regex::new(r"^(?:application|text)/xml").expect("valid content-type pattern");
    let is_xml = content_type
        .map(|ct| xml_response_type.is_match(ct))
        .unwrap_or(false);

    if is_xml {
        match XmlDocument::parse(raw) {
            Some(doc) => Some(Body::Xml(doc)),
            None => {
                tracing::debug!(url = %ctx.url, "malformed markup response, passing raw text through");
                Some(Body::Text(raw.to_string()))
            }
        }
    } else {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Some(Body::Json(value)),
            Err(_) => {
                reporter.report(&ParseFailure::new(raw, ctx.method, ctx.url, ctx.status_code));
                None
            }
        }
    }
}
