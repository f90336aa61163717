//! Parser for YouTube's timed-text caption XML.
//!
//! ```xml
//! <transcript>
//!   <text start="0.48" dur="2.3">it&amp;#39;s <b>fine</b></text>
//! </transcript>
//! ```
//!
//! Caption bodies are escaped twice: once by the XML layer and once as HTML,
//! and may contain formatting markup, which is stripped.

use std::sync::OnceLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::{Captures, Regex};

use super::{CaptionError, CaptionSegment};

fn markup_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid markup regex"))
}

fn entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]{2,8});").expect("valid entity regex")
    })
}

/// Parse timed-text XML into ordered caption segments.
///
/// `<text>` nodes without a body are skipped.
pub fn parse_timedtext(xml: &str) -> Result<Vec<CaptionSegment>, CaptionError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut segments = Vec::new();
    let mut current: Option<(f64, f64, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"text" => {
                let (start, duration) = timing_attributes(&e)?;
                current = Some((start, duration, String::new()));
            }
            Ok(Event::Text(t)) => {
                if let Some((_, _, body)) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| CaptionError::Parse(format!("bad caption text: {}", e)))?;
                    body.push_str(&text);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some((_, _, body)) = current.as_mut() {
                    body.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"text" => {
                if let Some((start, duration, body)) = current.take() {
                    let text = clean_caption_text(&body);
                    if !text.is_empty() {
                        segments.push(CaptionSegment::new(text, start, duration));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CaptionError::Parse(format!(
                    "invalid timed-text XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(segments)
}

fn timing_attributes(element: &BytesStart<'_>) -> Result<(f64, f64), CaptionError> {
    let mut start = None;
    let mut duration = 0.0;

    for attr in element.attributes() {
        let attr = attr.map_err(|e| CaptionError::Parse(format!("bad caption attribute: {}", e)))?;
        let value = attr
            .unescape_value()
            .map_err(|e| CaptionError::Parse(format!("bad caption attribute value: {}", e)))?;

        match attr.key.as_ref() {
            b"start" => start = value.parse::<f64>().ok(),
            b"dur" => duration = value.parse::<f64>().unwrap_or(0.0),
            _ => {}
        }
    }

    let start = start.ok_or_else(|| CaptionError::Parse("caption without start time".to_string()))?;
    Ok((start.max(0.0), duration.max(0.0)))
}

/// Decode the inner HTML layer and drop formatting tags
pub fn clean_caption_text(raw: &str) -> String {
    let decoded = decode_html_entities(raw);
    markup_regex().replace_all(&decoded, "").trim().to_string()
}

/// Decode named and numeric HTML character references
pub fn decode_html_entities(input: &str) -> String {
    entity_regex()
        .replace_all(input, |caps: &Captures| {
            let entity = &caps[1];
            decode_entity(entity).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(entity: &str) -> Option<String> {
    if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32).map(String::from);
    }
    if let Some(dec) = entity.strip_prefix('#') {
        return dec.parse::<u32>().ok().and_then(char::from_u32).map(String::from);
    }

    let decoded = match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "hellip" => "…",
        "mdash" => "—",
        "ndash" => "–",
        "lsquo" => "‘",
        "rsquo" => "’",
        "ldquo" => "“",
        "rdquo" => "”",
        _ => return None,
    };
    Some(decoded.to_string())
}
