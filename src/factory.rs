//! The type-indexed object factory.
//!
//! A [`Factory<T>`] maps discriminators to construction functions producing
//! `Box<T>`, where `T` is usually a trait object such as `dyn Shape`. Four
//! independent namespaces exist:
//!
//! | Key | Function | Used by |
//! |-----|----------|---------|
//! | name | [`Builder`] (no argument) | [`Factory::default_builder`] |
//! | name | [`TreeBuilder`] | [`Factory::build`], [`Factory::build_by_name`], keyed reads |
//! | id   | [`Builder`] (no argument) | [`Factory::build_default_by_id`] |
//! | id   | [`StreamBuilder`] | [`Factory::read_tagged`], [`Factory::load_from_file`] |
//!
//! Registration never replaces an existing binding: a second registration under
//! the same key fails with [`FactoriaError::DuplicateRegistration`] and the first
//! one stays active.
//!
//! ## Threading
//!
//! Registration needs `&mut self` and is expected to happen once during start-up.
//! After that the factory is only read, and since every stored function is
//! `Send + Sync`, a `Factory` can be shared (e.g. behind an `Arc`) by threads
//! building concurrently. Built objects are always owned by the caller; the
//! factory keeps no reference to them.
//!
//! ## Tree convention
//!
//! A polymorphic value is stored as `<outer><ClassTag>...</ClassTag></outer>`.
//! [`Factory::build`] receives `outer`, looks `ClassTag` up, and hands the *inner*
//! node to the construction function. `outer` must hold exactly one element.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::codec::BinaryValue;
use crate::error::{FactoriaError, Result};
use crate::io::open_binary;
use crate::serializable::TreeSerializable;
use crate::stream::StreamSerializable;
use crate::tree::{self, Node, ReadOutcome};

/// Construction function taking no argument.
pub type Builder<T> = Arc<dyn Fn() -> Box<T> + Send + Sync>;

/// Construction function reading from a tree node.
///
/// It receives `None` when building by name alone, in which case it must produce
/// a default-valued object.
pub type TreeBuilder<T> = Arc<dyn for<'a> Fn(Option<Node<'a>>) -> Result<Box<T>> + Send + Sync>;

/// Construction function reading a payload from a binary stream. Returns the
/// object and the exact number of bytes it consumed.
pub type StreamBuilder<T> = Arc<dyn Fn(&mut dyn Read) -> Result<(Box<T>, usize)> + Send + Sync>;

/// Registry of construction functions for objects of type `T`.
pub struct Factory<T: ?Sized> {
    builders: BTreeMap<String, Builder<T>>,
    tree_builders: BTreeMap<String, TreeBuilder<T>>,
    builders_by_id: BTreeMap<i32, Builder<T>>,
    stream_builders_by_id: BTreeMap<i32, StreamBuilder<T>>,
}

impl<T: ?Sized> Factory<T> {
    /// Creates an empty factory.
    pub fn new() -> Self {
        Self {
            builders: BTreeMap::new(),
            tree_builders: BTreeMap::new(),
            builders_by_id: BTreeMap::new(),
            stream_builders_by_id: BTreeMap::new(),
        }
    }

    // --- REGISTRATION ---

    /// Binds a tree construction function to `class_name`.
    pub fn register_tree_builder<F>(&mut self, class_name: impl Into<String>, builder: F) -> Result<()>
    where
        F: for<'a> Fn(Option<Node<'a>>) -> Result<Box<T>> + Send + Sync + 'static,
    {
        let class_name = class_name.into();
        self.ensure_name_free(&class_name)?;
        tracing::debug!(class_name = %class_name, "registered tree builder");
        self.tree_builders.insert(class_name, Arc::new(builder));
        Ok(())
    }

    /// Binds a stream construction function to `id`.
    pub fn register_stream_builder<F>(&mut self, id: i32, builder: F) -> Result<()>
    where
        F: Fn(&mut dyn Read) -> Result<(Box<T>, usize)> + Send + Sync + 'static,
    {
        if self.stream_builders_by_id.contains_key(&id) {
            return Err(duplicate_id("stream builder", id));
        }
        tracing::debug!(id, "registered stream builder");
        self.stream_builders_by_id.insert(id, Arc::new(builder));
        Ok(())
    }

    fn ensure_name_free(&self, class_name: &str) -> Result<()> {
        if self.tree_builders.contains_key(class_name) || self.builders.contains_key(class_name) {
            return Err(FactoriaError::DuplicateRegistration(format!(
                "a class named '{class_name}' is already registered"
            )));
        }
        Ok(())
    }

    // --- LOOKUP ---

    /// Returns the tree construction function bound to `class_name`.
    pub fn tree_builder(&self, class_name: &str) -> Result<&TreeBuilder<T>> {
        self.tree_builders
            .get(class_name)
            .ok_or_else(|| FactoriaError::UnknownType {
                requested: class_name.to_owned(),
                known: self.tree_builders.keys().cloned().collect(),
            })
    }

    /// Returns the no-argument construction function registered under `class_name`.
    pub fn default_builder(&self, class_name: &str) -> Result<&Builder<T>> {
        self.builders
            .get(class_name)
            .ok_or_else(|| FactoriaError::UnknownType {
                requested: class_name.to_owned(),
                known: self.builders.keys().cloned().collect(),
            })
    }

    /// Returns the no-argument construction function bound to `id`.
    pub fn builder_by_id(&self, id: i32) -> Result<&Builder<T>> {
        self.builders_by_id
            .get(&id)
            .ok_or_else(|| unknown_id(id, self.builders_by_id.keys()))
    }

    /// Returns the stream construction function bound to `id`.
    pub fn stream_builder(&self, id: i32) -> Result<&StreamBuilder<T>> {
        self.stream_builders_by_id
            .get(&id)
            .ok_or_else(|| unknown_id(id, self.stream_builders_by_id.keys()))
    }

    /// Registered class names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tree_builders.keys().map(String::as_str)
    }

    /// Ids with a stream builder, sorted.
    pub fn stream_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.stream_builders_by_id.keys().copied()
    }

    /// Lists every registered identifier, one namespace per section.
    pub fn list_builders(&self) -> String {
        let mut out = String::from("Tree builders:\n");
        for name in self.tree_builders.keys() {
            out.push_str(&format!("\t{name}\n"));
        }
        out.push_str("Default builders:\n");
        for id in self.builders_by_id.keys() {
            out.push_str(&format!("\t{id}\n"));
        }
        out.push_str("Stream builders:\n");
        for id in self.stream_builders_by_id.keys() {
            out.push_str(&format!("\t{id}\n"));
        }
        out
    }

    // --- BUILDING FROM TREES ---

    /// Builds a default-valued object of the class named `class_name`.
    pub fn build_by_name(&self, class_name: &str) -> Result<Box<T>> {
        tracing::trace!(class_name, "building by name");
        (self.tree_builder(class_name)?)(None)
    }

    /// Builds from `node`, whose single child element carries the class tag.
    ///
    /// Fails with [`FactoriaError::MalformedNode`] when `node` has no child element
    /// or more than one, and with [`FactoriaError::UnknownType`] when the tag is
    /// not registered.
    pub fn build(&self, node: Node<'_>) -> Result<Box<T>> {
        let mut elements = node.element_children();
        let content = elements.next().ok_or_else(|| {
            FactoriaError::MalformedNode(format!(
                "expecting a child to node '{}'",
                node.value()
            ))
        })?;
        if let Some(extra) = elements.next() {
            return Err(FactoriaError::MalformedNode(format!(
                "node '{}' holds '{}' and '{}', expecting a single class child",
                node.value(),
                content.value(),
                extra.value()
            )));
        }
        let class_name = content.value();
        tracing::trace!(class_name, "building from node");
        (self.tree_builder(class_name)?)(Some(content))
    }

    /// Loads a tree file and builds from its top-level element `node_name`.
    pub fn build_from_file<P: AsRef<Path>>(&self, path: P, node_name: &str) -> Result<Box<T>> {
        let path = path.as_ref();
        let doc = tree::load_file(path)?;
        let node = doc.first_child_named(node_name).ok_or_else(|| {
            FactoriaError::Parse(format!(
                "failed to find node with tag '{node_name}' in file '{}'",
                path.display()
            ))
        })?;
        self.build(node)
    }

    /// Builds the object stored under the child `key` of `node`.
    pub fn read(&self, node: Node<'_>, key: &str) -> Result<Box<T>> {
        self.build(tree::require_child(node, key)?)
    }

    /// Optional counterpart of [`read`](Self::read).
    ///
    /// A missing `node` or `key` returns [`ReadOutcome::Absent`] and leaves `slot`
    /// untouched. If the key is present but the build fails, the error is returned
    /// and `slot` is still untouched.
    pub fn try_read(
        &self,
        node: Option<Node<'_>>,
        key: &str,
        slot: &mut Option<Box<T>>,
    ) -> Result<ReadOutcome> {
        let Some(child) = node.and_then(|n| n.first_child_named(key)) else {
            return Ok(ReadOutcome::Absent);
        };
        *slot = Some(self.build(child)?);
        Ok(ReadOutcome::Applied)
    }

    /// Builds one object per child element of `key`, in document order.
    pub fn read_vector(&self, node: Node<'_>, key: &str) -> Result<Vec<Box<T>>> {
        let values = tree::require_child(node, key)?;
        values.element_children().map(|entry| self.build(entry)).collect()
    }

    /// Optional counterpart of [`read_vector`](Self::read_vector), replacing
    /// `slot` only when every element builds.
    pub fn try_read_vector(
        &self,
        node: Option<Node<'_>>,
        key: &str,
        slot: &mut Vec<Box<T>>,
    ) -> Result<ReadOutcome> {
        let Some(node) = node.filter(|n| n.first_child_named(key).is_some()) else {
            return Ok(ReadOutcome::Absent);
        };
        *slot = self.read_vector(node, key)?;
        Ok(ReadOutcome::Applied)
    }

    /// Builds a map of objects laid out as `<entry><key>K</key><val>...</val></entry>`.
    pub fn read_map(&self, node: Node<'_>, key: &str) -> Result<BTreeMap<String, Box<T>>> {
        tree::read_map_with(node, key, |val| self.build(val))
    }

    // --- BUILDING FROM STREAMS ---

    /// Builds a default-valued object from the no-argument builder bound to `id`.
    pub fn build_default_by_id(&self, id: i32) -> Result<Box<T>> {
        Ok((self.builder_by_id(id)?)())
    }

    /// Reads one tagged record: the class id, then the payload of the matching type.
    ///
    /// Returns the object and the total number of bytes consumed, tag included, so
    /// that consecutive records can be read from a single stream.
    pub fn read_tagged(&self, source: &mut dyn Read) -> Result<(Box<T>, usize)> {
        let (id, tag_bytes) = i32::read_binary(source)?;
        tracing::trace!(id, "reading tagged record");
        let (object, payload_bytes) = (self.stream_builder(id)?)(source)?;
        Ok((object, tag_bytes + payload_bytes))
    }

    /// Opens a binary file and reads one tagged record from it.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(Box<T>, usize)> {
        let mut input = open_binary(path.as_ref())?;
        self.read_tagged(&mut input)
    }
}

impl<T: TreeSerializable + ?Sized + 'static> Factory<T> {
    /// Registers a no-argument builder under `class_name`, and derives a tree
    /// builder from it.
    ///
    /// The derived tree builder creates a fresh object and, when `parse_tree` is set
    /// and a node is supplied, decodes it from that node.
    pub fn register_builder<F>(
        &mut self,
        class_name: impl Into<String>,
        builder: F,
        parse_tree: bool,
    ) -> Result<()>
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        let class_name = class_name.into();
        self.ensure_name_free(&class_name)?;
        let builder: Builder<T> = Arc::new(builder);
        self.tree_builders
            .insert(class_name.clone(), to_tree_builder(builder.clone(), parse_tree));
        tracing::debug!(class_name = %class_name, parse_tree, "registered builder");
        self.builders.insert(class_name, builder);
        Ok(())
    }
}

impl<T: StreamSerializable + ?Sized + 'static> Factory<T> {
    /// Registers a no-argument builder under `id`.
    ///
    /// When `with_stream_builder` is set, a stream builder is derived as well; it
    /// creates a fresh object and decodes its payload from the stream. Both slots
    /// are checked before anything is inserted.
    pub fn register_builder_by_id<F>(
        &mut self,
        id: i32,
        builder: F,
        with_stream_builder: bool,
    ) -> Result<()>
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        if self.builders_by_id.contains_key(&id) {
            return Err(duplicate_id("builder", id));
        }
        if with_stream_builder && self.stream_builders_by_id.contains_key(&id) {
            return Err(duplicate_id("stream builder", id));
        }
        let builder: Builder<T> = Arc::new(builder);
        if with_stream_builder {
            self.stream_builders_by_id
                .insert(id, to_stream_builder(builder.clone()));
        }
        tracing::debug!(id, with_stream_builder, "registered builder");
        self.builders_by_id.insert(id, builder);
        Ok(())
    }
}

/// Wraps a no-argument builder into a tree builder.
pub fn to_tree_builder<T>(builder: Builder<T>, parse_tree: bool) -> TreeBuilder<T>
where
    T: TreeSerializable + ?Sized + 'static,
{
    Arc::new(move |node: Option<Node<'_>>| -> Result<Box<T>> {
        let mut object = builder();
        if let Some(node) = node.filter(|_| parse_tree) {
            object.decode_from(node)?;
        }
        Ok(object)
    })
}

/// Wraps a no-argument builder into a stream builder.
pub fn to_stream_builder<T>(builder: Builder<T>) -> StreamBuilder<T>
where
    T: StreamSerializable + ?Sized + 'static,
{
    Arc::new(move |source: &mut dyn Read| -> Result<(Box<T>, usize)> {
        let mut object = builder();
        let consumed = object.decode_payload(source)?;
        Ok((object, consumed))
    })
}

fn duplicate_id(kind: &str, id: i32) -> FactoriaError {
    FactoriaError::DuplicateRegistration(format!(
        "a {kind} with id '{id}' is already registered"
    ))
}

fn unknown_id<'a>(id: i32, known: impl Iterator<Item = &'a i32>) -> FactoriaError {
    FactoriaError::UnknownType {
        requested: id.to_string(),
        known: known.map(i32::to_string).collect(),
    }
}

impl<T: ?Sized> Default for Factory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Factory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("builders", &self.builders.keys().collect::<Vec<_>>())
            .field("tree_builders", &self.tree_builders.keys().collect::<Vec<_>>())
            .field("builders_by_id", &self.builders_by_id.keys().collect::<Vec<_>>())
            .field(
                "stream_builders_by_id",
                &self.stream_builders_by_id.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}
