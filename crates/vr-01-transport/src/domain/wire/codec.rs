//! XML encoding and decoding of frames.
//!
//! Event frames are VOEvent documents and are never re-serialized: the
//! decoder only checks well-formedness and lifts `ivorn` and `role` from the
//! root element. Control frames are small `Transport` documents whose
//! `role` attribute selects the frame type.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::Reader;
use shared_types::{AckToken, EventRole, Ivorn, PeerRole};

use super::frame::{AckStatus, Acknowledgement, EventDocument, Frame, Handshake, KeepAlive};
use crate::error::FrameError;

const TRANSPORT_NS: &str = "http://telescope-networks.org/schema/Transport/v1.1";

struct RootElement {
    name: String,
    attributes: HashMap<String, String>,
}

/// Parsed shape of a document: root element plus the first text value of
/// every descendant path below it (`Meta/Result`, `Origin`, ...).
struct Document {
    root: RootElement,
    fields: HashMap<String, String>,
}

impl Document {
    fn field(&self, path: &str) -> Option<&str> {
        self.fields
            .get(path)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn require(&self, path: &'static str) -> Result<&str, FrameError> {
        self.field(path).ok_or(FrameError::Missing(path))
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.field("TimeStamp")
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }
}

/// Decode one frame body.
pub fn decode(bytes: &[u8]) -> Result<Frame, FrameError> {
    let text = std::str::from_utf8(bytes).map_err(|_| FrameError::NotUtf8)?;
    let document = parse_document(text)?;

    match document.root.name.as_str() {
        "VOEvent" => decode_event(text, &document.root),
        "Transport" => decode_transport(&document),
        other => Err(FrameError::UnknownRoot(other.to_string())),
    }
}

/// Encode a frame body. Event frames return their payload unchanged.
pub fn encode(frame: &Frame) -> String {
    match frame {
        Frame::Event(document) => document.raw.to_string(),
        Frame::Handshake(handshake) => {
            let mut body = element("Origin", &handshake.origin);
            if let Some(destination) = &handshake.destination {
                body.push_str(&element("Destination", destination));
            }
            body.push_str(&element("PeerRole", handshake.role.as_str()));
            body.push_str(&timestamp_element(handshake.timestamp));
            transport_document("handshake", &handshake.version, &body)
        }
        Frame::Ack(ack) => {
            let mut body = element("Origin", &ack.origin);
            body.push_str(&element("Response", ack.token.as_str()));
            body.push_str(&timestamp_element(ack.timestamp));
            if let Some(reason) = &ack.reason {
                body.push_str(&format!("<Meta>{}</Meta>", element("Result", reason)));
            }
            transport_document(ack.status.as_str(), super::PROTOCOL_VERSION, &body)
        }
        Frame::KeepAlive(probe) | Frame::KeepAliveAck(probe) => {
            let mut body = element("Origin", &probe.origin);
            body.push_str(&timestamp_element(probe.timestamp));
            transport_document(frame.kind(), super::PROTOCOL_VERSION, &body)
        }
    }
}

fn transport_document(role: &str, version: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <trn:Transport xmlns:trn=\"{TRANSPORT_NS}\" role=\"{}\" version=\"{}\">{body}</trn:Transport>",
        escape(role),
        escape(version),
    )
}

fn element(name: &str, value: &str) -> String {
    format!("<{name}>{}</{name}>", escape(value))
}

fn timestamp_element(timestamp: Option<DateTime<Utc>>) -> String {
    let ts = timestamp.unwrap_or_else(Utc::now);
    element("TimeStamp", &ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn decode_event(text: &str, root: &RootElement) -> Result<Frame, FrameError> {
    let raw_ivorn = root.attributes.get("ivorn").cloned();
    let ivorn = raw_ivorn
        .as_deref()
        .ok_or_else(|| FrameError::InvalidEvent {
            ivorn: None,
            reason: "VOEvent has no ivorn attribute".to_string(),
        })
        .and_then(|raw| {
            Ivorn::new(raw).map_err(|e| FrameError::InvalidEvent {
                ivorn: None,
                reason: e.to_string(),
            })
        })?;

    let role = root
        .attributes
        .get("role")
        .ok_or_else(|| FrameError::InvalidEvent {
            ivorn: raw_ivorn.clone(),
            reason: "VOEvent has no role attribute".to_string(),
        })?
        .parse::<EventRole>()
        .map_err(|e| FrameError::InvalidEvent {
            ivorn: raw_ivorn.clone(),
            reason: e.to_string(),
        })?;

    Ok(Frame::Event(EventDocument {
        ivorn,
        role,
        raw: Arc::from(text),
    }))
}

fn decode_transport(document: &Document) -> Result<Frame, FrameError> {
    let role = document
        .root
        .attributes
        .get("role")
        .ok_or(FrameError::Missing("role"))?;

    match role.as_str() {
        "handshake" => {
            let peer_role = document
                .require("PeerRole")?
                .parse::<PeerRole>()
                .map_err(|e| FrameError::InvalidField {
                    field: "PeerRole",
                    reason: e.to_string(),
                })?;
            Ok(Frame::Handshake(Handshake {
                origin: document.require("Origin")?.to_string(),
                destination: document.field("Destination").map(str::to_string),
                role: peer_role,
                version: document
                    .root
                    .attributes
                    .get("version")
                    .cloned()
                    .ok_or(FrameError::Missing("version"))?,
                timestamp: document.timestamp(),
            }))
        }
        "ack" | "nak" => {
            let status = if role == "ack" {
                AckStatus::Ack
            } else {
                AckStatus::Nak
            };
            Ok(Frame::Ack(Acknowledgement {
                status,
                origin: document.field("Origin").unwrap_or_default().to_string(),
                token: AckToken::from_wire(document.require("Response")?),
                reason: document.field("Meta/Result").map(str::to_string),
                timestamp: document.timestamp(),
            }))
        }
        "iamalive" | "iamalive-ack" => {
            let probe = KeepAlive {
                origin: document.field("Origin").unwrap_or_default().to_string(),
                timestamp: document.timestamp(),
            };
            if role == "iamalive" {
                Ok(Frame::KeepAlive(probe))
            } else {
                Ok(Frame::KeepAliveAck(probe))
            }
        }
        other => Err(FrameError::UnknownTransportRole(other.to_string())),
    }
}

fn parse_document(text: &str) -> Result<Document, FrameError> {
    let mut reader = Reader::from_str(text);
    let mut root: Option<RootElement> = None;
    let mut closed_root = false;
    let mut path: Vec<String> = Vec::new();
    let mut fields = HashMap::new();

    // Attribute ivorn from the root, if any, so a later syntax error can
    // still be acknowledged against the right event.
    let fail = |root: &Option<RootElement>, reason: String| -> FrameError {
        match root {
            Some(r) if r.name == "VOEvent" => FrameError::InvalidEvent {
                ivorn: r.attributes.get("ivorn").cloned(),
                reason,
            },
            _ => FrameError::Xml(reason),
        }
    };

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(start)) => {
                if root.is_none() {
                    root = Some(read_root(&start)?);
                } else if closed_root {
                    return Err(fail(&root, "more than one root element".to_string()));
                } else {
                    check_attributes(&start).map_err(|e| fail(&root, e))?;
                    path.push(local_name(&start)?);
                }
            }
            Ok(XmlEvent::Empty(start)) => {
                if root.is_none() {
                    root = Some(read_root(&start)?);
                    closed_root = true;
                } else if closed_root {
                    return Err(fail(&root, "more than one root element".to_string()));
                } else {
                    check_attributes(&start).map_err(|e| fail(&root, e))?;
                }
            }
            Ok(XmlEvent::End(_)) => {
                if path.pop().is_none() {
                    if root.is_none() || closed_root {
                        return Err(fail(&root, "unmatched closing tag".to_string()));
                    }
                    closed_root = true;
                }
            }
            Ok(XmlEvent::Text(text)) => {
                let value = text
                    .unescape()
                    .map_err(|e| fail(&root, e.to_string()))?;
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                if root.is_none() || closed_root {
                    return Err(fail(&root, "text outside the root element".to_string()));
                }
                if !path.is_empty() {
                    fields
                        .entry(path.join("/"))
                        .or_insert_with(|| value.to_string());
                }
            }
            Ok(XmlEvent::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(fail(&root, e.to_string())),
        }
    }

    match root {
        None => Err(FrameError::Empty),
        Some(_) if !closed_root => Err(fail(&root, "unclosed root element".to_string())),
        Some(root) => Ok(Document { root, fields }),
    }
}

fn read_root(start: &BytesStart<'_>) -> Result<RootElement, FrameError> {
    let mut attributes = HashMap::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| FrameError::Xml(e.to_string()))?;
        let key = std::str::from_utf8(attribute.key.local_name().as_ref())
            .map_err(|_| FrameError::NotUtf8)?
            .to_string();
        let value = attribute_value(&attribute).map_err(FrameError::Xml)?;
        attributes.insert(key, value);
    }
    Ok(RootElement {
        name: local_name(start)?,
        attributes,
    })
}

/// Well-formedness of a non-root element's attributes: quoted, unique,
/// and free of stray markup or unknown entities.
fn check_attributes(start: &BytesStart<'_>) -> Result<(), String> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        attribute_value(&attribute)?;
    }
    Ok(())
}

fn attribute_value(attribute: &Attribute<'_>) -> Result<String, String> {
    if attribute.value.contains(&b'<') {
        return Err(format!(
            "'<' in value of attribute '{}'",
            String::from_utf8_lossy(attribute.key.as_ref())
        ));
    }
    attribute
        .unescape_value()
        .map(|value| value.into_owned())
        .map_err(|e| e.to_string())
}

fn local_name(start: &BytesStart<'_>) -> Result<String, FrameError> {
    std::str::from_utf8(start.local_name().as_ref())
        .map(str::to_string)
        .map_err(|_| FrameError::NotUtf8)
}
