//! Owned element tree over a JATS / OAI-PMH document.
//!
//! Every element remembers the byte range of its inner markup in the source,
//! so rich-text sub-documents can be recovered verbatim with [`Element::inner_xml`].

use std::collections::HashMap;
use std::ops::Range;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::OapmcError;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
    pub inner: Range<usize>,
}

impl Element {
    fn open(start: &BytesStart<'_>, position: usize) -> Result<Self, OapmcError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|err| OapmcError::Xml(err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| OapmcError::Xml(err.to_string()))?
                .into_owned();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            children: Vec::new(),
            inner: position..position,
        })
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    pub fn children_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Element> + use<'a, 'n> {
        self.elements().filter(move |el| el.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    /// Trimmed text content of the first child named `name`, when non-empty.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(Element::text).filter(|text| !text.is_empty())
    }

    /// Every descendant named `name`, in document order.
    pub fn descendants<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        collect_descendants(self, name, &mut found);
        found
    }

    pub fn first_descendant(&self, name: &str) -> Option<&Element> {
        self.elements().find_map(|el| {
            if el.name == name {
                Some(el)
            } else {
                el.first_descendant(name)
            }
        })
    }

    /// Concatenated text of the whole subtree, trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        push_text(self, &mut out);
        out.trim().to_string()
    }

    /// Text nodes directly under this element only, trimmed.
    pub fn own_text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(text) = node {
                out.push_str(text);
            }
        }
        out.trim().to_string()
    }

    pub fn inner_xml<'s>(&self, source: &'s str) -> &'s str {
        source.get(self.inner.clone()).unwrap_or("")
    }
}

fn collect_descendants<'a>(el: &'a Element, name: &str, found: &mut Vec<&'a Element>) {
    for child in el.elements() {
        if child.name == name {
            found.push(child);
        }
        collect_descendants(child, name, found);
    }
}

fn push_text(el: &Element, out: &mut String) {
    for node in &el.children {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(child) => push_text(child, out),
        }
    }
}

/// Parses `source` and returns its document element.
pub fn parse(source: &str) -> Result<Element, OapmcError> {
    let mut reader = Reader::from_str(source);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|err| OapmcError::Xml(format!("at byte {before}: {err}")))?;
        match event {
            Event::Start(start) => {
                let position = reader.buffer_position() as usize;
                stack.push(Element::open(&start, position)?);
            }
            Event::Empty(start) => {
                let position = reader.buffer_position() as usize;
                let el = Element::open(&start, position)?;
                attach(&mut stack, &mut root, el);
            }
            Event::End(_) => {
                let Some(mut el) = stack.pop() else {
                    return Err(OapmcError::Xml("unbalanced end tag".to_string()));
                };
                el.inner.end = before;
                attach(&mut stack, &mut root, el);
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    let value = match text.unescape() {
                        Ok(value) => value.into_owned(),
                        Err(_) => String::from_utf8_lossy(text.as_ref()).into_owned(),
                    };
                    parent.children.push(Node::Text(value));
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    parent.children.push(Node::Text(value));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(OapmcError::Xml("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| OapmcError::Xml("document has no root element".to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(el)),
        None => {
            if root.is_none() {
                *root = Some(el);
            }
        }
    }
}

/// Location of a tag: the element-child index chain from the search root to
/// the parent holding the tag, plus the tag itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath {
    pub parent: Vec<usize>,
    pub tag: String,
}

/// For each of `tags` found anywhere below `root`, the path to its first
/// pre-order occurrence. Tags that never occur are absent from the map.
pub fn find_node_paths(root: &Element, tags: &[&str]) -> HashMap<String, NodePath> {
    let mut found = HashMap::new();
    let mut chain = Vec::new();
    walk_paths(root, tags, &mut chain, &mut found);
    found
}

fn walk_paths(
    el: &Element,
    tags: &[&str],
    chain: &mut Vec<usize>,
    found: &mut HashMap<String, NodePath>,
) {
    for (idx, child) in el.elements().enumerate() {
        if tags.contains(&child.name.as_str()) && !found.contains_key(&child.name) {
            found.insert(
                child.name.clone(),
                NodePath {
                    parent: chain.clone(),
                    tag: child.name.clone(),
                },
            );
        }
        chain.push(idx);
        walk_paths(child, tags, chain, found);
        chain.pop();
    }
}

/// Every element named after `path.tag` under the parent `path` points at.
pub fn elements_at<'a>(root: &'a Element, path: &NodePath) -> Vec<&'a Element> {
    let mut current = root;
    for idx in &path.parent {
        match current.elements().nth(*idx) {
            Some(next) => current = next,
            None => return Vec::new(),
        }
    }
    current.children_named(&path.tag).collect()
}

/// First element at `tag` in a previously computed path map.
pub fn first_at<'a>(
    root: &'a Element,
    paths: &HashMap<String, NodePath>,
    tag: &str,
) -> Option<&'a Element> {
    paths
        .get(tag)
        .and_then(|path| elements_at(root, path).into_iter().next())
}

/// All elements at `tag` in a previously computed path map.
pub fn all_at<'a>(
    root: &'a Element,
    paths: &HashMap<String, NodePath>,
    tag: &str,
) -> Vec<&'a Element> {
    paths
        .get(tag)
        .map(|path| elements_at(root, path))
        .unwrap_or_default()
}
