//! Namespace-aware XML reading.
//!
//! quick-xml hands out events with raw prefixed names; XBRL needs resolved
//! namespaces *and* the prefix scope of each element, because QName-valued
//! attributes (`dimension="us-gaap:SegmentAxis"`, `format="ixt:num-dot-decimal"`)
//! must be resolved against the scope of the element that carries them. This
//! module materializes a small tree that keeps the scope per element.
//!
//! No DTD resolution, no external entity expansion.

use compact_str::CompactString;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

use crate::model::QName;
use crate::{Error, Result};

pub const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";
pub const LINK_NS: &str = "http://www.xbrl.org/2003/linkbase";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub const XBRLI_NS: &str = "http://www.xbrl.org/2003/instance";
pub const XBRLDI_NS: &str = "http://xbrl.org/2006/xbrldi";
pub const XBRLDT_NS: &str = "http://xbrl.org/2005/xbrldt";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const IX_NS: &str = "http://www.xbrl.org/2013/inlineXBRL";

#[derive(Debug, Clone)]
pub struct XmlDocument {
    pub source_url: CompactString,
    pub root: XmlElement,
}

#[derive(Debug, Clone)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct XmlAttr {
    pub namespace: CompactString,
    pub local_name: CompactString,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct XmlElement {
    pub namespace: CompactString,
    pub local_name: CompactString,
    pub prefix: CompactString,
    pub attributes: Vec<XmlAttr>,
    pub children: Vec<XmlNode>,
    /// prefix -> namespace URI in scope at this element ("" is the default
    /// namespace).
    pub ns_scope: HashMap<CompactString, CompactString>,
    /// Effective `xml:lang`, inherited from ancestors.
    pub lang: Option<CompactString>,
}

impl XmlElement {
    /// Attribute in the given namespace ("" for unprefixed attributes, which
    /// per XML never inherit the default namespace).
    pub fn attr(&self, namespace: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace == namespace && a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    pub fn attr_local(&self, local_name: &str) -> Option<&str> {
        self.attr("", local_name)
    }

    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.namespace == namespace && self.local_name == local_name
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn find(&self, namespace: &str, local_name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|e| e.is(namespace, local_name))
    }

    pub fn find_all<'a>(
        &'a self,
        namespace: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> {
        self.child_elements().filter(move |e| e.is(namespace, local_name))
    }

    /// Depth-first pre-order walk over this element and all descendants.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a XmlElement)) {
        visit(self);
        for child in self.child_elements() {
            child.walk(visit);
        }
    }

    /// All descendant elements (self included) matching the name, in
    /// document order.
    pub fn descendants(&self, namespace: &str, local_name: &str) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        self.walk(&mut |e| {
            if e.is(namespace, local_name) {
                out.push(e);
            }
        });
        out
    }

    /// Direct text content of this element (child text nodes only).
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let XmlNode::Text(t) = node {
                out.push_str(t);
            }
        }
        out
    }

    /// Descendant text in document order, the value-construction rule for
    /// inline facts.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out, &|_| true);
        out
    }

    /// Like [`text_content`](Self::text_content) but skipping subtrees the
    /// filter rejects (used for `ix:exclude`).
    pub fn text_content_filtered(&self, keep: &dyn Fn(&XmlElement) -> bool) -> String {
        let mut out = String::new();
        self.collect_text(&mut out, keep);
        out
    }

    fn collect_text(&self, out: &mut String, keep: &dyn Fn(&XmlElement) -> bool) {
        for node in &self.children {
            match node {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(e) => {
                    if keep(e) {
                        e.collect_text(out, keep);
                    }
                }
            }
        }
    }

    pub fn resolve_prefix(&self, prefix: &str) -> Option<&str> {
        self.ns_scope.get(prefix).map(|s| s.as_str())
    }

    /// Resolve a QName-valued string like `us-gaap:Assets` against this
    /// element's namespace scope.
    pub fn resolve_qname(&self, value: &str) -> Option<QName> {
        let value = value.trim();
        match value.split_once(':') {
            Some((prefix, local)) => self
                .resolve_prefix(prefix)
                .map(|ns| QName::new(ns, local)),
            None => Some(QName::new(
                self.resolve_prefix("").unwrap_or(""),
                value,
            )),
        }
    }

    pub fn xml_lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    /// Serialize this element back to XML text. Used for typed dimension
    /// member values, which the model carries as literal XML.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        let name = if self.prefix.is_empty() {
            self.local_name.to_string()
        } else {
            format!("{}:{}", self.prefix, self.local_name)
        };
        out.push('<');
        out.push_str(&name);
        for attr in &self.attributes {
            out.push(' ');
            out.push_str(&attr.local_name);
            out.push_str("=\"");
            out.push_str(&escape_attr(&attr.value));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.children {
            match node {
                XmlNode::Text(t) => out.push_str(&escape_text(t)),
                XmlNode::Element(e) => e.write_xml(out),
            }
        }
        out.push_str("</");
        out.push_str(&name);
        out.push('>');
    }
}

fn escape_text(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// HTML named entities seen in inline filings that are not part of XML's
/// builtin five. Everything else unknown is a well-formedness error.
fn resolve_html_entity(entity: &str) -> Option<&'static str> {
    match entity {
        "nbsp" => Some("\u{a0}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        "sect" => Some("\u{a7}"),
        "para" => Some("\u{b6}"),
        "middot" => Some("\u{b7}"),
        "bull" => Some("\u{2022}"),
        "hellip" => Some("\u{2026}"),
        "trade" => Some("\u{2122}"),
        "reg" => Some("\u{ae}"),
        "copy" => Some("\u{a9}"),
        "deg" => Some("\u{b0}"),
        "plusmn" => Some("\u{b1}"),
        "times" => Some("\u{d7}"),
        "divide" => Some("\u{f7}"),
        "cent" => Some("\u{a2}"),
        "pound" => Some("\u{a3}"),
        "euro" => Some("\u{20ac}"),
        "yen" => Some("\u{a5}"),
        _ => None,
    }
}

/// Parse a document from raw bytes. `source_url` is carried into the
/// document and every error.
pub fn read(bytes: &[u8], source_url: &str) -> Result<XmlDocument> {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    let text = std::str::from_utf8(bytes).map_err(|e| Error::XmlWellFormedness {
        url: source_url.to_string(),
        reason: format!("invalid UTF-8: {e}"),
    })?;
    read_str(text, source_url)
}

pub fn read_str(text: &str, source_url: &str) -> Result<XmlDocument> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = false;

    let wf = |reason: String| Error::XmlWellFormedness {
        url: source_url.to_string(),
        reason,
    };

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event().map_err(|e| wf(e.to_string()))? {
            Event::Start(start) => {
                let elem = open_element(&start, stack.last(), source_url)?;
                stack.push(elem);
            }
            Event::Empty(start) => {
                let elem = open_element(&start, stack.last(), source_url)?;
                attach(&mut stack, &mut root, elem);
            }
            Event::End(_) => {
                let elem = stack.pop().ok_or_else(|| wf("unbalanced end tag".into()))?;
                attach(&mut stack, &mut root, elem);
            }
            Event::Text(t) => {
                let text = t
                    .unescape_with(resolve_html_entity)
                    .map_err(|e| wf(e.to_string()))?;
                if let Some(parent) = stack.last_mut() {
                    if !text.is_empty() {
                        parent.children.push(XmlNode::Text(text.into_owned()));
                    }
                }
            }
            Event::CData(t) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(t.as_ref()).into_owned();
                    parent.children.push(XmlNode::Text(text));
                }
            }
            Event::Eof => break,
            // comments, processing instructions, doctype
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(wf("unclosed element at end of document".into()));
    }
    let root = root.ok_or_else(|| wf("document has no root element".into()))?;
    Ok(XmlDocument {
        source_url: source_url.into(),
        root,
    })
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, elem: XmlElement) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(elem));
    } else if root.is_none() {
        *root = Some(elem);
    }
}

fn open_element(
    start: &BytesStart<'_>,
    parent: Option<&XmlElement>,
    source_url: &str,
) -> Result<XmlElement> {
    let wf = |reason: String| Error::XmlWellFormedness {
        url: source_url.to_string(),
        reason,
    };

    let mut scope: HashMap<CompactString, CompactString> = parent
        .map(|p| p.ns_scope.clone())
        .unwrap_or_default();

    // first pass: namespace declarations on this element
    let mut plain_attrs: Vec<(CompactString, CompactString, String)> = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| wf(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| wf(e.to_string()))?
            .to_string();
        let value = attr
            .unescape_value_with(resolve_html_entity)
            .map_err(|e| wf(e.to_string()))?
            .into_owned();
        if key == "xmlns" {
            scope.insert(CompactString::const_new(""), value.into());
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.insert(prefix.into(), value.into());
        } else {
            let (prefix, local) = match key.split_once(':') {
                Some((p, l)) => (CompactString::from(p), CompactString::from(l)),
                None => (CompactString::const_new(""), CompactString::from(key.as_str())),
            };
            plain_attrs.push((prefix, local, value));
        }
    }

    let raw_name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| wf(e.to_string()))?
        .to_string();
    let (prefix, local_name) = match raw_name.split_once(':') {
        Some((p, l)) => (CompactString::from(p), CompactString::from(l)),
        None => (CompactString::const_new(""), CompactString::from(raw_name.as_str())),
    };
    let namespace = if prefix.is_empty() {
        scope.get("").cloned().unwrap_or_default()
    } else {
        scope
            .get(prefix.as_str())
            .cloned()
            .ok_or_else(|| wf(format!("undeclared namespace prefix {prefix}")))?
    };

    // second pass: resolve attribute namespaces against the final scope
    let mut attributes = Vec::with_capacity(plain_attrs.len());
    for (attr_prefix, attr_local, value) in plain_attrs {
        let attr_ns = if attr_prefix.is_empty() {
            // unprefixed attributes have no namespace
            CompactString::const_new("")
        } else if attr_prefix == "xml" {
            CompactString::const_new(XML_NS)
        } else {
            scope
                .get(attr_prefix.as_str())
                .cloned()
                .ok_or_else(|| wf(format!("undeclared attribute prefix {attr_prefix}")))?
        };
        attributes.push(XmlAttr {
            namespace: attr_ns,
            local_name: attr_local,
            value,
        });
    }

    let lang = attributes
        .iter()
        .find(|a| a.namespace == XML_NS && a.local_name == "lang")
        .map(|a| CompactString::from(a.value.as_str()))
        .or_else(|| parent.and_then(|p| p.lang.clone()));

    Ok(XmlElement {
        namespace,
        local_name,
        prefix,
        attributes,
        children: Vec::new(),
        ns_scope: scope,
        lang,
    })
}
