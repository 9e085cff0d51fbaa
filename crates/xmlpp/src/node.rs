//! The markup node stream
//!
//! The preprocessor does not work on a document tree.
//! It walks a flat stream of [Node] values produced by a [Reader]
//!     and writes the transformed stream to a [Writer].
//! Both are thin adapters over `quick-xml`.

use std::ops::Range;

use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{Error, Kind, Result};

/// An attribute of a start element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Attribute {
        Attribute {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A single node of the markup stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    StartElement {
        name: String,
        attributes: Vec<Attribute>,
        /// Whether the element is self-closing.
        /// No matching [Node::EndElement] follows an empty element.
        empty: bool,
    },
    EndElement {
        name: String,
    },
    Text(String),
    CData(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

/// Reads nodes from a markup source.
///
/// XML declarations, comments and doctypes are dropped.
/// Entity references in text and attribute values are resolved.
pub struct Reader<'a> {
    source: &'a [u8],
    inner: quick_xml::Reader<&'a [u8]>,
    open: Vec<String>,
}

impl<'a> Reader<'a> {
    pub fn new(source: &'a str) -> Reader<'a> {
        Reader {
            source: source.as_bytes(),
            inner: quick_xml::Reader::from_str(source),
            open: vec![],
        }
    }

    /// Byte offset of the reader in the source.
    pub fn position(&self) -> usize {
        self.inner.buffer_position()
    }

    /// Number of elements currently open.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Reads the next node, returning it along with its span in the source.
    ///
    /// Returns [None] at the end of the source.
    pub fn read_node(&mut self) -> Result<Option<(Node, Range<usize>)>> {
        loop {
            let mut start = self.inner.buffer_position();
            let event = self.inner.read_event().map_err(markup_error)?;
            // A text event consumes the `<` that opens the following markup.
            if !matches!(event, Event::Text(_)) && start > 0 && self.source[start - 1] == b'<' {
                start -= 1;
            }
            let span = start..self.inner.buffer_position();
            let node = match event {
                Event::Start(e) => {
                    let node = start_element(&e, false)?;
                    if let Node::StartElement { name, .. } = &node {
                        self.open.push(name.clone());
                    }
                    node
                }
                Event::Empty(e) => start_element(&e, true)?,
                Event::End(e) => {
                    self.open.pop();
                    Node::EndElement {
                        name: utf8(e.name().as_ref())?.to_string(),
                    }
                }
                Event::Text(e) => Node::Text(e.unescape().map_err(markup_error)?.into_owned()),
                Event::CData(e) => Node::CData(utf8(&e)?.to_string()),
                Event::PI(e) => {
                    let content = utf8(&e)?;
                    let (target, data) = match content.find(char::is_whitespace) {
                        None => (content, ""),
                        Some(i) => (&content[..i], content[i..].trim_start()),
                    };
                    Node::ProcessingInstruction {
                        target: target.to_string(),
                        data: data.to_string(),
                    }
                }
                Event::Decl(_) | Event::Comment(_) | Event::DocType(_) => continue,
                Event::Eof => {
                    return match self.open.last() {
                        None => Ok(None),
                        Some(name) => Err(Error::new(
                            Kind::Markup,
                            format!("unexpected end of input: element `{name}` is not closed"),
                        )),
                    }
                }
            };
            return Ok(Some((node, span)));
        }
    }
}

fn start_element(e: &BytesStart, empty: bool) -> Result<Node> {
    let name = utf8(e.name().as_ref())?.to_string();
    let mut attributes = vec![];
    for attribute in e.attributes() {
        let attribute = attribute.map_err(markup_error)?;
        attributes.push(Attribute {
            name: utf8(attribute.key.as_ref())?.to_string(),
            value: attribute
                .unescape_value()
                .map_err(markup_error)?
                .into_owned(),
        });
    }
    Ok(Node::StartElement {
        name,
        attributes,
        empty,
    })
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(markup_error)
}

fn markup_error<E: std::fmt::Display>(err: E) -> Box<Error> {
    Error::new(Kind::Markup, format!("malformed markup: {err}"))
}

/// Writes nodes as UTF-8 markup.
pub struct Writer {
    inner: quick_xml::Writer<Vec<u8>>,
}

impl Default for Writer {
    fn default() -> Self {
        Writer::new()
    }
}

impl Writer {
    pub fn new() -> Writer {
        Writer {
            inner: quick_xml::Writer::new(vec![]),
        }
    }

    pub fn write_node(&mut self, node: &Node) -> Result<()> {
        let event = match node {
            Node::StartElement {
                name,
                attributes,
                empty,
            } => {
                let mut start = BytesStart::new(name.as_str());
                for attribute in attributes {
                    start.push_attribute((attribute.name.as_str(), attribute.value.as_str()));
                }
                if *empty {
                    Event::Empty(start)
                } else {
                    Event::Start(start)
                }
            }
            Node::EndElement { name } => Event::End(BytesEnd::new(name.as_str())),
            Node::Text(text) => {
                Event::Text(BytesText::from_escaped(quick_xml::escape::partial_escape(text)))
            }
            Node::CData(text) => Event::CData(BytesCData::new(text.as_str())),
            Node::ProcessingInstruction { target, data } => {
                let content = if data.is_empty() {
                    target.clone()
                } else {
                    format!("{target} {data}")
                };
                Event::PI(BytesText::from_escaped(content))
            }
        };
        self.inner.write_event(event).map_err(markup_error)?;
        Ok(())
    }

    pub fn write_text(&mut self, text: &str) -> Result<()> {
        self.write_node(&Node::Text(text.to_string()))
    }

    pub fn into_string(self) -> Result<String> {
        String::from_utf8(self.inner.into_inner()).map_err(markup_error)
    }
}

/// Checks that the markup is a well-formed document with a single root element.
pub fn check_well_formed(source: &str) -> Result<()> {
    let mut reader = Reader::new(source);
    let mut roots = 0_usize;
    while let Some((node, _)) = reader.read_node()? {
        let at_top_level = reader.depth() == 0;
        match node {
            Node::StartElement { empty, .. }
                if (empty && at_top_level) || (!empty && reader.depth() == 1) =>
            {
                roots += 1;
            }
            Node::Text(text) | Node::CData(text) if at_top_level && !text.trim().is_empty() => {
                return Err(Error::new(
                    Kind::Markup,
                    "the document contains text outside of the root element",
                ));
            }
            _ => {}
        }
    }
    match roots {
        1 => Ok(()),
        0 => Err(Error::new(Kind::Markup, "the document has no root element")),
        n => Err(Error::new(Kind::Markup, format!("the document has {n} root elements"))
            .with_note("a well-formed document has exactly one root element")),
    }
}
