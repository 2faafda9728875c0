//! The tree-form object contract.
//!
//! A type implements three primitives: its class tag, how to write its fields, and
//! how to read them back from a node. Everything else (tagged text, file
//! persistence, pretty printing) is derived from those three.
//!
//! ```rust
//! use factoria::tree::{self, Node};
//! use factoria::{Result, TreeSerializable};
//!
//! #[derive(Default, Debug, PartialEq)]
//! struct Point { x: i32, y: i32 }
//!
//! impl TreeSerializable for Point {
//!     fn class_tag(&self) -> &str { "Point" }
//!     fn encode_to(&self, out: &mut String) {
//!         tree::write("x", &self.x, out);
//!         tree::write("y", &self.y, out);
//!     }
//!     fn decode_from(&mut self, node: Node<'_>) -> Result<()> {
//!         self.x = tree::read(node, "x")?;
//!         self.y = tree::read(node, "y")?;
//!         Ok(())
//!     }
//! }
//!
//! let text = Point { x: 3, y: 4 }.to_tagged_text();
//! assert_eq!(text, "<Point><x>3</x><y>4</y></Point>");
//!
//! let mut p = Point::default();
//! p.from_tagged_text(&text)?;
//! assert_eq!(p, Point { x: 3, y: 4 });
//! # Ok::<(), factoria::FactoriaError>(())
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::TextConfig;
use crate::error::{FactoriaError, Result};
use crate::tree::{self, Node, ReadOutcome};

/// A type that can be written to and read from tree text.
pub trait TreeSerializable {
    /// The element name wrapping this type's fields in tagged text.
    fn class_tag(&self) -> &str;

    /// Overwrites the fields of `self` from the children of `node`.
    ///
    /// On error `self` may be partially updated and must not be reused. Use
    /// [`try_read_object`] when the previous state has to survive a failure.
    fn decode_from(&mut self, node: Node<'_>) -> Result<()>;

    /// Appends the inner fields, without the wrapping class tag.
    fn encode_to(&self, out: &mut String);

    /// Returns `<class_tag>fields</class_tag>`.
    fn to_tagged_text(&self) -> String {
        let mut out = String::new();
        write_tagged(self, &mut out);
        out
    }

    /// Parses `text` and decodes from its first node.
    fn from_tagged_text(&mut self, text: &str) -> Result<()> {
        let doc = tree::parse_string(text)?;
        let node = doc
            .first_child()
            .ok_or_else(|| FactoriaError::Parse("failed to find node in tree text".into()))?;
        self.decode_from(node)
    }

    /// Loads the file and decodes from its top-level element named after the class tag.
    fn load_from_file(&mut self, path: &Path) -> Result<()> {
        let doc = tree::load_file(path)?;
        let node = doc.first_child_named(self.class_tag()).ok_or_else(|| {
            FactoriaError::Parse(format!(
                "failed to find node with tag '{}' in file '{}'",
                self.class_tag(),
                path.display()
            ))
        })?;
        self.decode_from(node)
    }

    /// Loads `<class_tag>.xml` from the working directory.
    fn load_default_file(&mut self) -> Result<()> {
        let path = default_path(self.class_tag());
        self.load_from_file(&path)
    }

    /// Saves the tagged text to `path` using the default [`TextConfig`].
    fn save_to_file(&self, path: &Path) -> Result<()> {
        self.save_to_file_with(path, &TextConfig::default())
    }

    /// Saves the tagged text to `path`. The text is parsed once before writing, so
    /// an encoder producing malformed markup fails here rather than at load time.
    fn save_to_file_with(&self, path: &Path, config: &TextConfig) -> Result<()> {
        tree::save_text_to_file(path, &self.to_tagged_text(), config)
    }

    /// Saves to `<class_tag>.xml` in the working directory.
    fn save_default_file(&self) -> Result<()> {
        self.save_to_file(&default_path(self.class_tag()))
    }

    /// Renders the tagged text with indentation.
    fn to_pretty_text(&self) -> Result<String> {
        let doc = tree::parse_string(&self.to_tagged_text())?;
        Ok(doc.to_text_with(&TextConfig::pretty()))
    }
}

fn default_path(class_tag: &str) -> PathBuf {
    PathBuf::from(format!("{class_tag}.xml"))
}

/// Appends `<class_tag>fields</class_tag>` for `obj`.
pub fn write_tagged<T: TreeSerializable + ?Sized>(obj: &T, out: &mut String) {
    let tag = obj.class_tag();
    tree::write_open(tag, out);
    obj.encode_to(out);
    tree::write_close(tag, out);
}

/// Appends a polymorphic field: `<key><ClassTag>...</ClassTag></key>`.
pub fn write_object<T: TreeSerializable + ?Sized>(key: &str, obj: &T, out: &mut String) {
    tree::write_open(key, out);
    write_tagged(obj, out);
    tree::write_close(key, out);
}

/// Appends `<key><v><ClassTag>...</ClassTag></v>...</key>`.
pub fn write_object_vector<'a, T, I>(key: &str, objs: I, out: &mut String)
where
    T: TreeSerializable + ?Sized + 'a,
    I: IntoIterator<Item = &'a T>,
{
    tree::write_open(key, out);
    for obj in objs {
        write_object("v", obj, out);
    }
    tree::write_close(key, out);
}

/// Appends a map whose values are tagged objects, in key order.
pub fn write_object_map<T: TreeSerializable + ?Sized>(
    key: &str,
    map: &BTreeMap<String, Box<T>>,
    out: &mut String,
) {
    tree::write_open(key, out);
    for (entry_key, obj) in map {
        tree::write_open("entry", out);
        tree::write("key", entry_key, out);
        write_object("val", obj.as_ref(), out);
        tree::write_close("entry", out);
    }
    tree::write_close(key, out);
}

/// Decodes a field of a statically known type in place.
///
/// Expects `<key><ClassTag>...</ClassTag></key>` where `ClassTag` is `obj`'s own tag.
pub fn read_object<T: TreeSerializable + ?Sized>(node: Node<'_>, key: &str, obj: &mut T) -> Result<()> {
    let outer = tree::require_child(node, key)?;
    let inner = outer.first_child_named(obj.class_tag()).ok_or_else(|| {
        FactoriaError::MalformedNode(format!(
            "expecting a child '{}' in node '{key}'",
            obj.class_tag()
        ))
    })?;
    obj.decode_from(inner)
}

/// Optional counterpart of [`read_object`] with all-or-nothing semantics.
///
/// Decoding happens on a copy; `slot` is replaced only if the whole decode
/// succeeds. An absent node or key yields [`ReadOutcome::Absent`].
pub fn try_read_object<T: TreeSerializable + Clone>(
    node: Option<Node<'_>>,
    key: &str,
    slot: &mut T,
) -> Result<ReadOutcome> {
    let Some(node) = node.filter(|n| n.first_child_named(key).is_some()) else {
        return Ok(ReadOutcome::Absent);
    };
    let mut candidate = slot.clone();
    read_object(node, key, &mut candidate)?;
    *slot = candidate;
    Ok(ReadOutcome::Applied)
}
