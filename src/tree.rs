//! Owned XML element tree for document contents.
//!
//! Documents are attribute-centric: every value this crate reads or rewrites
//! lives in an attribute, so the model keeps elements, order-preserving
//! attribute lists, and child elements, and discards text nodes. Parsing and
//! serialization go through `quick-xml`.

use std::fmt;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use crate::error::Error;

/// One XML element: tag, attributes in document order, child elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Attribute name/value pairs in document order.
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order.
    pub children: Vec<Element>,
    /// Tag name.
    pub tag: String,
}

impl Element {
    /// Create an element with no attributes and no children.
    pub fn new(tag: &str) -> Self {
        return Self {
            attributes: Vec::new(),
            children: Vec::new(),
            tag: tag.to_string(),
        };
    }

    /// Value of the named attribute, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        return self
            .attributes
            .iter()
            .find(|(key, _)| return key == name)
            .map(|(_, value)| return value.as_str());
    }

    /// First child element with the given tag.
    pub fn child(&self, tag: &str) -> Option<&Element> {
        return self.children.iter().find(|c| return c.tag == tag);
    }

    /// Mutable first child element with the given tag.
    pub fn child_mut(&mut self, tag: &str) -> Option<&mut Element> {
        return self.children.iter_mut().find(|c| return c.tag == tag);
    }

    /// All child elements with the given tag, in document order.
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> {
        return self.children.iter().filter(move |c| return c.tag == tag);
    }

    /// Remove the named attribute, returning its previous value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(key, _)| return key == name)?;
        return Some(self.attributes.remove(index).1);
    }

    /// Set an attribute, replacing the value in place when the name already
    /// exists (preserving attribute order) and appending otherwise.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        for (key, existing) in &mut self.attributes {
            if key == name {
                *existing = value.to_string();
                return;
            }
        }
        self.attributes.push((name.to_string(), value.to_string()));
        return;
    }

    /// Serialize the element and its subtree to an XML string.
    /// Empty elements are written self-closing; attribute values are escaped.
    ///
    /// # Errors
    ///
    /// Returns `Error::XmlWrite` if the writer fails.
    pub fn to_xml(&self) -> Result<String, Error> {
        let mut writer = quick_xml::Writer::new(Vec::new());
        write_element(&mut writer, self)?;
        let bytes = writer.into_inner();
        return String::from_utf8(bytes).map_err(|e| {
            return Error::XmlWrite { reason: e.to_string() };
        });
    }
}

/// One step of a structural path: a child tag plus an optional attribute
/// predicate narrowing which child is meant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorStep {
    /// Attribute name/value pair the child must carry, if any.
    pub predicate: Option<(String, String)>,
    /// Tag of the child element to descend into.
    pub tag: String,
}

/// A structural path from a document root to one element, usable for
/// in-place lookup and mutation after the tree that produced it was cloned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locator {
    /// Ordered steps from the root's children down to the target element.
    pub steps: Vec<LocatorStep>,
}

impl Locator {
    /// Append a step selecting the first child with the given tag.
    pub fn child(mut self, tag: &str) -> Self {
        self.steps.push(LocatorStep { predicate: None, tag: tag.to_string() });
        return self;
    }

    /// Append a step selecting the first child with the given tag whose
    /// attribute equals the given value.
    pub fn child_where(mut self, tag: &str, attribute: &str, value: &str) -> Self {
        self.steps.push(LocatorStep {
            predicate: Some((attribute.to_string(), value.to_string())),
            tag: tag.to_string(),
        });
        return self;
    }

    /// Walk the path from `root`, returning the element it denotes.
    pub fn resolve<'a>(&self, root: &'a Element) -> Option<&'a Element> {
        let mut current = root;
        for step in &self.steps {
            current = current.children.iter().find(|c| return step_matches(step, c))?;
        }
        return Some(current);
    }

    /// Walk the path from `root`, returning the element it denotes mutably.
    pub fn resolve_mut<'a>(&self, root: &'a mut Element) -> Option<&'a mut Element> {
        let mut current = root;
        for step in &self.steps {
            current = current
                .children
                .iter_mut()
                .find(|c| return step_matches(step, c))?;
        }
        return Some(current);
    }
}

impl fmt::Display for Locator {
    /// Render in an XPath-like form, e.g.
    /// `ObjectData/Object[@name='Spreadsheet']/Properties/...`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for step in &self.steps {
            if !first {
                write!(f, "/")?;
            }
            first = false;
            match &step.predicate {
                None => write!(f, "{}", step.tag)?,
                Some((attribute, value)) => {
                    write!(f, "{}[@{attribute}='{value}']", step.tag)?;
                },
            }
        }
        return Ok(());
    }
}

impl serde::Serialize for Locator {
    /// Serialize as the XPath-like display string.
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        return serializer.collect_str(self);
    }
}

/// Parse a document's XML member into an element tree.
/// Text nodes, comments, and processing instructions are discarded.
///
/// # Errors
///
/// Returns `Error::XmlParse` on malformed XML or when no root element exists.
pub fn parse_document(path: &Path, xml: &str) -> Result<Element, Error> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Err(e) => {
                return Err(Error::XmlParse {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            },
            Ok(Event::Eof) => break,
            Ok(Event::Start(start)) => {
                let element = element_from_start(path, &start)?;
                stack.push(element);
            },
            Ok(Event::Empty(start)) => {
                let element = element_from_start(path, &start)?;
                attach(&mut stack, &mut root, element);
            },
            Ok(Event::End(_)) => {
                let Some(element) = stack.pop() else {
                    return Err(Error::XmlParse {
                        path: path.to_path_buf(),
                        reason: "unbalanced closing tag".to_string(),
                    });
                };
                attach(&mut stack, &mut root, element);
            },
            Ok(_) => {},
        }
    }

    return root.ok_or_else(|| {
        return Error::XmlParse {
            path: path.to_path_buf(),
            reason: "no root element".to_string(),
        };
    });
}

/// Attach a completed element to its parent, or record it as the root.
/// Trailing top-level siblings after the root are ignored.
fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        },
    }
    return;
}

/// Build an element (tag + attributes) from a start or empty-element event.
///
/// # Errors
///
/// Returns `Error::XmlParse` on malformed attribute syntax.
fn element_from_start(path: &Path, start: &BytesStart<'_>) -> Result<Element, Error> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(&tag);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| {
            return Error::XmlParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            };
        })?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| {
                return Error::XmlParse {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                };
            })?
            .into_owned();
        element.attributes.push((key, value));
    }
    return Ok(element);
}

/// Check whether a child element satisfies a locator step.
fn step_matches(step: &LocatorStep, candidate: &Element) -> bool {
    if candidate.tag != step.tag {
        return false;
    }
    return match &step.predicate {
        None => true,
        Some((attribute, value)) => candidate.attribute(attribute) == Some(value.as_str()),
    };
}

/// Recursively write one element through the quick-xml writer.
///
/// # Errors
///
/// Returns `Error::XmlWrite` if the writer fails.
fn write_element<W: std::io::Write>(
    writer: &mut quick_xml::Writer<W>,
    element: &Element,
) -> Result<(), Error> {
    let mut start = BytesStart::new(element.tag.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(|e| {
            return Error::XmlWrite { reason: e.to_string() };
        })?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(|e| {
        return Error::XmlWrite { reason: e.to_string() };
    })?;
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.tag.as_str())))
        .map_err(|e| {
            return Error::XmlWrite { reason: e.to_string() };
        })?;
    return Ok(());
}
