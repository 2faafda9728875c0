//! The tree document adapter.
//!
//! A [`Document`] is an arena that owns every node parsed from tree text; callers
//! navigate it through [`Node`] views, which are `Copy` borrows and are never freed
//! individually. Dropping the document releases everything at once, including on
//! every error path of the parser.
//!
//! ## Text layout
//!
//! ```text
//! <Point><x>3</x><y>4</y></Point>                       scalar fields
//! <pts><v>1</v><v>2</v></pts>                           vectors
//! <m><entry><key>a</key><val>1</val></entry></m>        maps
//! <shape><Circle><r>2</r></Circle></shape>              polymorphic fields
//! ```
//!
//! Whitespace-only text between elements is discarded and text content is trimmed.
//! A leading `<?xml ...?>` declaration, comments and processing instructions are
//! skipped. Attributes are accepted but ignored.
//!
//! ## Keyed reads
//!
//! The free functions [`read`], [`try_read`], [`read_vector`], [`try_read_vector`] and
//! [`read_map`] look a key up among the children of a node. Required reads fail with
//! [`FactoriaError::Parse`] when the key is missing. Try-reads return
//! [`ReadOutcome::Absent`] instead and leave the destination untouched; if the key
//! is present but its content does not convert, the error is still returned and the
//! destination is still untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::codec::{self, TextValue};
use crate::config::TextConfig;
use crate::error::{FactoriaError, Result};
use crate::io::{file_to_string, string_to_file};

/// Identifies a node inside one [`Document`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Returns the raw arena index.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(String),
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

/// A parsed tree document. Owns all of its nodes.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Document {
    /// The id of the document node itself, parent of all top-level nodes.
    pub const ROOT: NodeId = NodeId(0);

    /// Creates an empty document containing only the document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                first_child: None,
                last_child: None,
                next_sibling: None,
            }],
        }
    }

    /// Returns the document node.
    pub fn root(&self) -> Node<'_> {
        Node {
            doc: self,
            id: Self::ROOT,
        }
    }

    /// Returns the first top-level node.
    pub fn first_child(&self) -> Option<Node<'_>> {
        self.root().first_child()
    }

    /// Returns the first top-level element named `key`.
    pub fn first_child_named(&self, key: &str) -> Option<Node<'_>> {
        self.root().first_child_named(key)
    }

    /// Resolves an id previously handed out by this document.
    pub fn node(&self, id: NodeId) -> Option<Node<'_>> {
        (id.index() < self.nodes.len()).then_some(Node { doc: self, id })
    }

    /// Number of nodes, the document node included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true when the document holds nothing but the document node.
    pub fn is_empty(&self) -> bool {
        self.nodes[0].first_child.is_none()
    }

    /// Appends an element as the last child of `parent`.
    ///
    /// `parent` must be an id handed out by this document.
    pub fn append_element(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        self.push(parent, NodeKind::Element(name.into()))
    }

    /// Appends a text node as the last child of `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        self.push(parent, NodeKind::Text(text.into()))
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            first_child: None,
            last_child: None,
            next_sibling: None,
        });
        let previous_last = self.nodes[parent.index()].last_child.replace(id);
        match previous_last {
            Some(last) => self.nodes[last.index()].next_sibling = Some(id),
            None => self.nodes[parent.index()].first_child = Some(id),
        }
        id
    }

    /// Renders the document on a single line, without a declaration.
    pub fn to_text(&self) -> String {
        self.to_text_with(&TextConfig {
            indent: None,
            ..TextConfig::default()
        })
    }

    /// Renders the document using the indentation of `config`.
    ///
    /// The declaration is only emitted by the file writers.
    pub fn to_text_with(&self, config: &TextConfig) -> String {
        let mut out = String::new();
        let mut child = self.nodes[0].first_child;
        let mut first = true;
        while let Some(id) = child {
            if !first && config.indent.is_some() {
                out.push('\n');
            }
            first = false;
            self.render(id, config, 0, &mut out);
            child = self.nodes[id.index()].next_sibling;
        }
        out
    }

    fn render(&self, id: NodeId, config: &TextConfig, depth: usize, out: &mut String) {
        let data = &self.nodes[id.index()];
        let name = match &data.kind {
            NodeKind::Element(name) => name,
            NodeKind::Text(text) => {
                out.push_str(&escape(text.as_str()));
                return;
            }
            NodeKind::Document => return,
        };

        let Some(first) = data.first_child else {
            out.push('<');
            out.push_str(name);
            out.push_str("/>");
            return;
        };

        write_open(name, out);
        let text_only = data.first_child == data.last_child
            && matches!(self.nodes[first.index()].kind, NodeKind::Text(_));

        if text_only || config.indent.is_none() {
            let mut child = Some(first);
            while let Some(c) = child {
                self.render(c, config, depth + 1, out);
                child = self.nodes[c.index()].next_sibling;
            }
        } else {
            let width = config.indent.unwrap_or(0);
            let mut child = Some(first);
            while let Some(c) = child {
                out.push('\n');
                out.push_str(&" ".repeat(width * (depth + 1)));
                self.render(c, config, depth + 1, out);
                child = self.nodes[c.index()].next_sibling;
            }
            out.push('\n');
            out.push_str(&" ".repeat(width * depth));
        }
        write_close(name, out);
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// A borrowed view of one node of a [`Document`].
#[derive(Clone, Copy)]
pub struct Node<'doc> {
    doc: &'doc Document,
    id: NodeId,
}

impl<'doc> Node<'doc> {
    fn data(&self) -> &'doc NodeData {
        &self.doc.nodes[self.id.index()]
    }

    fn at(&self, id: Option<NodeId>) -> Option<Node<'doc>> {
        id.map(|id| Node { doc: self.doc, id })
    }

    /// The id of this node within its document.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The document this node belongs to.
    pub fn document(&self) -> &'doc Document {
        self.doc
    }

    /// The tag of an element, the content of a text node, or `""` for the
    /// document node.
    pub fn value(&self) -> &'doc str {
        match &self.data().kind {
            NodeKind::Element(name) => name,
            NodeKind::Text(text) => text,
            NodeKind::Document => "",
        }
    }

    /// The tag of an element, `None` for other nodes.
    pub fn name(&self) -> Option<&'doc str> {
        match &self.data().kind {
            NodeKind::Element(name) => Some(name),
            _ => None,
        }
    }

    /// Returns true for element nodes.
    pub fn is_element(&self) -> bool {
        matches!(self.data().kind, NodeKind::Element(_))
    }

    /// Returns true for text nodes.
    pub fn is_text(&self) -> bool {
        matches!(self.data().kind, NodeKind::Text(_))
    }

    /// The text of this element, i.e. the content of its first child when that
    /// child is a text node.
    pub fn text(&self) -> Option<&'doc str> {
        self.first_child()
            .filter(Node::is_text)
            .map(|child| child.value())
    }

    /// The first child of any kind.
    pub fn first_child(&self) -> Option<Node<'doc>> {
        self.at(self.data().first_child)
    }

    /// The first child that is an element.
    pub fn first_element_child(&self) -> Option<Node<'doc>> {
        self.children().find(Node::is_element)
    }

    /// The first child element whose tag is `key`.
    pub fn first_child_named(&self, key: &str) -> Option<Node<'doc>> {
        self.children().find(|child| child.name() == Some(key))
    }

    /// The next node sharing this node's parent.
    pub fn next_sibling(&self) -> Option<Node<'doc>> {
        self.at(self.data().next_sibling)
    }

    /// Iterates over all children in document order.
    pub fn children(&self) -> Children<'doc> {
        Children {
            next: self.first_child(),
        }
    }

    /// Iterates over the element children in document order.
    pub fn element_children(self) -> impl Iterator<Item = Node<'doc>> {
        self.children().filter(Node::is_element)
    }

    fn label(&self) -> &'doc str {
        match &self.data().kind {
            NodeKind::Document => "#document",
            _ => self.value(),
        }
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("value", &self.label())
            .finish()
    }
}

/// Iterator over the children of a node.
#[derive(Debug, Clone)]
pub struct Children<'doc> {
    next: Option<Node<'doc>>,
}

impl<'doc> Iterator for Children<'doc> {
    type Item = Node<'doc>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.next_sibling();
        Some(current)
    }
}

// --- PARSING ---

/// Parses tree text into a document.
///
/// Fails with [`FactoriaError::Parse`] on malformed markup, on unclosed elements and
/// when the text contains no node at all.
pub fn parse_string(text: &str) -> Result<Document> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut doc = Document::new();
    let mut open: Vec<NodeId> = vec![Document::ROOT];

    loop {
        let parent = open.last().copied().unwrap_or(Document::ROOT);
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = utf8_name(e.name().as_ref())?;
                let id = doc.append_element(parent, name);
                open.push(id);
            }
            Ok(Event::Empty(e)) => {
                let name = utf8_name(e.name().as_ref())?;
                doc.append_element(parent, name);
            }
            Ok(Event::End(_)) => {
                if open.len() <= 1 {
                    return Err(FactoriaError::Parse(format!(
                        "unexpected closing tag at byte {}",
                        reader.buffer_position()
                    )));
                }
                open.pop();
            }
            Ok(Event::Text(e)) => {
                let content = e.unescape().map_err(|err| {
                    FactoriaError::Parse(format!("invalid text content: {err}"))
                })?;
                push_text(&mut doc, parent, &content)?;
            }
            Ok(Event::CData(e)) => {
                let content = String::from_utf8(e.into_inner().into_owned()).map_err(|_| {
                    FactoriaError::Parse("CDATA section is not valid UTF-8".into())
                })?;
                push_text(&mut doc, parent, &content)?;
            }
            Ok(Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FactoriaError::Parse(format!(
                    "failed to parse tree text near byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    if let Some(unclosed) = open.get(1).and_then(|id| doc.node(*id)) {
        return Err(FactoriaError::Parse(format!(
            "element '{}' is never closed",
            unclosed.value()
        )));
    }
    if doc.is_empty() {
        return Err(FactoriaError::Parse("no node in the text".into()));
    }

    tracing::trace!(nodes = doc.len(), "parsed tree document");
    Ok(doc)
}

fn utf8_name(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|_| FactoriaError::Parse("element name is not valid UTF-8".into()))
}

fn push_text(doc: &mut Document, parent: NodeId, content: &str) -> Result<()> {
    if content.is_empty() {
        return Ok(());
    }
    if parent == Document::ROOT {
        return Err(FactoriaError::Parse(format!(
            "text '{content}' outside of any element"
        )));
    }
    doc.append_text(parent, content);
    Ok(())
}

/// Reads a file and parses it.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Document> {
    let path = path.as_ref();
    let text = file_to_string(path)?;
    parse_string(&text).map_err(|e| match e {
        FactoriaError::Parse(msg) => {
            FactoriaError::Parse(format!("in file '{}': {msg}", path.display()))
        }
        other => other,
    })
}

/// Saves a document with the default [`TextConfig`].
pub fn save_file<P: AsRef<Path>>(path: P, doc: &Document) -> Result<()> {
    save_file_with(path, doc, &TextConfig::default())
}

/// Saves a document, honoring the declaration and indentation settings.
pub fn save_file_with<P: AsRef<Path>>(path: P, doc: &Document, config: &TextConfig) -> Result<()> {
    let mut text = String::new();
    if config.declaration {
        text.push_str("<?xml version=\"1.0\"?>\n");
    }
    text.push_str(&doc.to_text_with(config));
    text.push('\n');
    string_to_file(path.as_ref(), &text)
}

/// Checks that `text` parses, then saves it as a document file.
pub fn save_text_to_file<P: AsRef<Path>>(path: P, text: &str, config: &TextConfig) -> Result<()> {
    let doc = parse_string(text)?;
    save_file_with(path, &doc, config)
}

// --- KEYED READS ---

/// Outcome of a successful try-read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The key was present and its content was stored in the destination.
    Applied,
    /// The node or the key was absent; the destination was not touched.
    Absent,
}

impl ReadOutcome {
    /// Returns true when the destination was overwritten.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

pub(crate) fn missing_key(node: Node<'_>, key: &str) -> FactoriaError {
    FactoriaError::Parse(format!(
        "could not find node with label '{key}' in node '{}'",
        node.label()
    ))
}

/// Returns the child element named `key`, failing with [`FactoriaError::Parse`].
pub fn require_child<'doc>(node: Node<'doc>, key: &str) -> Result<Node<'doc>> {
    node.first_child_named(key)
        .ok_or_else(|| missing_key(node, key))
}

/// Returns the text of the child element `key`.
///
/// A present but empty element (`<key/>`) yields an empty string.
pub fn element_text(node: Node<'_>, key: &str) -> Result<String> {
    let child = node.first_child_named(key).ok_or_else(|| {
        FactoriaError::Parse(format!(
            "could not get value for label '{key}' in node '{}'",
            node.label()
        ))
    })?;
    Ok(child.text().unwrap_or_default().to_owned())
}

/// Reads and converts the text of the child element `key`.
pub fn read<T: TextValue>(node: Node<'_>, key: &str) -> Result<T> {
    let text = element_text(node, key)?;
    T::parse_text(&text).map_err(|e| in_context(e, node, key))
}

fn in_context(err: FactoriaError, node: Node<'_>, key: &str) -> FactoriaError {
    match err {
        FactoriaError::Conversion(msg) => FactoriaError::Conversion(format!(
            "{msg} (label '{key}' in node '{}')",
            node.label()
        )),
        other => other,
    }
}

/// Reads `key` into `slot` if it is present.
///
/// Returns [`ReadOutcome::Absent`] without touching `slot` when `node` is `None`
/// or has no child `key`. Conversion failures are returned and `slot` keeps its
/// previous value.
pub fn try_read<T: TextValue>(node: Option<Node<'_>>, key: &str, slot: &mut T) -> Result<ReadOutcome> {
    let Some(node) = node.filter(|n| n.first_child_named(key).is_some()) else {
        return Ok(ReadOutcome::Absent);
    };
    *slot = read(node, key)?;
    Ok(ReadOutcome::Applied)
}

/// Reads the vector stored under `key`: one value per child element, in order.
pub fn read_vector<T: TextValue>(node: Node<'_>, key: &str) -> Result<Vec<T>> {
    let values = require_child(node, key)?;
    values
        .element_children()
        .map(|entry| {
            T::parse_text(entry.text().unwrap_or_default()).map_err(|e| in_context(e, values, entry.value()))
        })
        .collect()
}

/// Vector counterpart of [`try_read`].
pub fn try_read_vector<T: TextValue>(
    node: Option<Node<'_>>,
    key: &str,
    slot: &mut Vec<T>,
) -> Result<ReadOutcome> {
    let Some(node) = node.filter(|n| n.first_child_named(key).is_some()) else {
        return Ok(ReadOutcome::Absent);
    };
    *slot = read_vector(node, key)?;
    Ok(ReadOutcome::Applied)
}

/// Reads a map laid out as
/// `<key><entry><key>K</key><val>...</val></entry>...</key>`, handing each `<val>`
/// node to `build`.
///
/// Fails with [`FactoriaError::DuplicateKey`] if the same entry key appears twice.
pub fn read_map_with<'doc, V, F>(node: Node<'doc>, key: &str, mut build: F) -> Result<BTreeMap<String, V>>
where
    F: FnMut(Node<'doc>) -> Result<V>,
{
    let entries = require_child(node, key)?;
    let mut result = BTreeMap::new();
    for entry in entries.element_children() {
        let entry_key: String = read(entry, "key")?;
        let value_node = entry.first_child_named("val").ok_or_else(|| {
            FactoriaError::Parse(format!(
                "missing val in entry '{}' of map '{key}'",
                entry.value()
            ))
        })?;
        if result.contains_key(&entry_key) {
            return Err(FactoriaError::DuplicateKey(format!(
                "key '{entry_key}' found more than once in '{key}'"
            )));
        }
        let value = build(value_node)?;
        result.insert(entry_key, value);
    }
    Ok(result)
}

/// Reads a map of primitive values; see [`read_map_with`].
pub fn read_map<V: TextValue>(node: Node<'_>, key: &str) -> Result<BTreeMap<String, V>> {
    read_map_with(node, key, |val| {
        V::parse_text(val.text().unwrap_or_default()).map_err(|e| in_context(e, val, key))
    })
}

// --- WRITERS ---

/// Appends `<key>`.
pub fn write_open(key: &str, out: &mut String) {
    out.push('<');
    out.push_str(key);
    out.push('>');
}

/// Appends `</key>`.
pub fn write_close(key: &str, out: &mut String) {
    out.push_str("</");
    out.push_str(key);
    out.push('>');
}

/// Appends `<key>value</key>`, escaping the value.
pub fn write<T: TextValue>(key: &str, value: &T, out: &mut String) {
    write_text(key, &value.format_text(), out);
}

fn write_text(key: &str, text: &str, out: &mut String) {
    write_open(key, out);
    out.push_str(&escape(text));
    write_close(key, out);
}

/// Appends a double with a fixed number of significant digits.
pub fn write_f64_with(key: &str, value: f64, precision: usize, out: &mut String) {
    write_text(key, &codec::format_f64(value, precision), out);
}

/// Appends `<key><v>..</v>...</key>`.
pub fn write_vector<T: TextValue>(key: &str, values: &[T], out: &mut String) {
    write_open(key, out);
    for value in values {
        write("v", value, out);
    }
    write_close(key, out);
}

/// Appends a map of primitive values in key order.
pub fn write_map<V: TextValue>(key: &str, map: &BTreeMap<String, V>, out: &mut String) {
    write_open(key, out);
    for (entry_key, value) in map {
        write_open("entry", out);
        write_text("key", entry_key, out);
        write("val", value, out);
        write_close("entry", out);
    }
    write_close(key, out);
}
