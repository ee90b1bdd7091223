use std::fmt;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use serde_json::{Map, Value};

use super::{content_text, Formatter, Parser};
use crate::error::{ClientError, Result};
use crate::message::HttpMessage;
use crate::request::Request;
use crate::response::Response;

/// Key under which a parsed element's attributes are stored.
pub const ATTRIBUTES_KEY: &str = "@attributes";

/// Serializes request data as an XML document.
///
/// Mapping keys become element names, list entries (and numeric keys)
/// become `item_tag` elements, and `null` becomes an empty element.
#[derive(Debug, Clone)]
pub struct XmlFormatter {
    pub root_tag: String,
    pub item_tag: String,
    pub version: String,
    pub encoding: String,
}

impl Default for XmlFormatter {
    fn default() -> Self {
        Self {
            root_tag: "request".to_string(),
            item_tag: "item".to_string(),
            version: "1.0".to_string(),
            encoding: "UTF-8".to_string(),
        }
    }
}

impl XmlFormatter {
    fn write_value(&self, writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<()> {
        match value {
            Value::Null => write(writer, Event::Empty(BytesStart::new(name))),
            Value::Object(map) => {
                write(writer, Event::Start(BytesStart::new(name)))?;
                for (key, child) in map {
                    let tag = if key.parse::<u64>().is_ok() { self.item_tag.as_str() } else { key };
                    self.write_value(writer, tag, child)?;
                }
                write(writer, Event::End(BytesEnd::new(name)))
            }
            Value::Array(items) => {
                write(writer, Event::Start(BytesStart::new(name)))?;
                for child in items {
                    self.write_value(writer, &self.item_tag, child)?;
                }
                write(writer, Event::End(BytesEnd::new(name)))
            }
            scalar => {
                write(writer, Event::Start(BytesStart::new(name)))?;
                write(writer, Event::Text(BytesText::new(&scalar_text(scalar))))?;
                write(writer, Event::End(BytesEnd::new(name)))
            }
        }
    }
}

impl Formatter for XmlFormatter {
    fn format(&self, request: &mut Request) -> Result<()> {
        let content_type = format!("application/xml; charset={}", self.encoding);
        request.headers_mut().set("Content-Type", content_type);

        let Some(data) = request.data() else {
            return Ok(());
        };
        let mut writer = Writer::new(Vec::new());
        write(
            &mut writer,
            Event::Decl(BytesDecl::new(&self.version, Some(&self.encoding), None)),
        )?;
        self.write_value(&mut writer, &self.root_tag, data)?;
        let content = writer.into_inner();
        request.set_content(content);
        Ok(())
    }
}

/// Converts an XML document into a mapping.
///
/// The root element is unwrapped. Leaf elements become strings, repeated
/// sibling elements become lists, and attributes are kept under
/// [`ATTRIBUTES_KEY`]. Text mixed with attributes or children is stored
/// under the key `"0"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlParser;

#[derive(Default)]
struct Element {
    name: String,
    attributes: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let mut attributes = Map::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(xml_error)?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value().map_err(xml_error)?.into_owned();
            attributes.insert(key, Value::String(value));
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            ..Self::default()
        })
    }

    fn close(self) -> (String, Value) {
        if self.attributes.is_empty() && self.children.is_empty() {
            return (self.name, Value::String(self.text));
        }
        let mut map = Map::new();
        if !self.attributes.is_empty() {
            map.insert(ATTRIBUTES_KEY.to_string(), Value::Object(self.attributes));
        }
        map.extend(self.children);
        if !self.text.is_empty() {
            map.insert("0".to_string(), Value::String(self.text));
        }
        (self.name, Value::Object(map))
    }

    fn add_child(&mut self, name: String, value: Value) {
        match self.children.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.children.insert(name, value);
            }
        }
    }
}

impl Parser for XmlParser {
    fn parse(&self, response: &Response) -> Result<Value> {
        let mut reader = Reader::from_str(content_text(response)?);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root = Value::Null;
        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Eof => break,
                Event::Start(start) => stack.push(Element::open(&start)?),
                Event::Empty(start) => {
                    let (name, value) = Element::open(&start)?.close();
                    match stack.last_mut() {
                        Some(parent) => parent.add_child(name, value),
                        None => root = value,
                    }
                }
                Event::End(_) => {
                    let Some(element) = stack.pop() else {
                        return Err(ClientError::Xml("unexpected closing tag".to_string()));
                    };
                    let (name, value) = element.close();
                    match stack.last_mut() {
                        Some(parent) => parent.add_child(name, value),
                        None => root = value,
                    }
                }
                Event::Text(text) => {
                    if let Some(element) = stack.last_mut() {
                        element.text.push_str(&text.unescape().map_err(xml_error)?);
                    }
                }
                Event::CData(cdata) => {
                    if let Some(element) = stack.last_mut() {
                        element.text.push_str(&String::from_utf8_lossy(&cdata.into_inner()));
                    }
                }
                _ => {}
            }
        }
        if !stack.is_empty() {
            return Err(ClientError::Xml("unexpected end of document".to_string()));
        }
        Ok(root)
    }
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(xml_error)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn xml_error(err: impl fmt::Display) -> ClientError {
    ClientError::Xml(err.to_string())
}
