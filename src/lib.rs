//! # Factoria
//!
//! Polymorphic object construction with two serialization formats: a human-editable
//! tree text format (XML-like) and a compact binary stream with explicit type tags.
//!
//! ## Overview
//!
//! A [`Factory<T>`] is a registry of construction functions producing `Box<T>`,
//! usually for a trait object such as `dyn Shape`. It dispatches on the class tag
//! found in a tree document (`<shape><Circle>...</Circle></shape>`) or on the integer
//! class id prefixing a binary record, and hands back an object owned exclusively
//! by the caller.
//!
//! Every buildable type implements one or both object contracts:
//!
//! *   [`TreeSerializable`]: class tag, encode fields to text, decode fields from a
//!     [`tree::Node`]. Tagged text, file persistence and pretty printing are derived.
//! *   [`StreamSerializable`]: class id, encode payload, decode payload with an exact
//!     byte count. The tagged envelope and binary file saving are derived.
//!
//! Both contracts can be generated for plain record structs with
//! `#[derive(TreeObject, StreamObject)]`.
//!
//! ## Usage
//!
//! ```rust
//! use factoria::{Factory, TreeObject, StreamObject, TreeSerializable, StreamSerializable};
//!
//! trait Shape: TreeSerializable + StreamSerializable + Send + Sync {}
//!
//! #[derive(Default, Debug, PartialEq, TreeObject, StreamObject)]
//! #[factoria(class = "Point", id = 1)]
//! struct Point { x: i32, y: i32 }
//!
//! impl Shape for Point {}
//!
//! let mut factory: Factory<dyn Shape> = Factory::new();
//! factory.register_builder("Point", || Box::new(Point::default()), true)?;
//! factory.register_builder_by_id(1, || Box::new(Point::default()), true)?;
//!
//! // Tree form
//! let doc = factoria::tree::parse_string("<root><Point><x>3</x><y>4</y></Point></root>")?;
//! let root = doc.first_child().expect("root");
//! let shape = factory.build(root)?;
//! assert_eq!(shape.to_tagged_text(), "<Point><x>3</x><y>4</y></Point>");
//!
//! // Binary form
//! let mut bytes = Vec::new();
//! let written = shape.write_tagged(&mut bytes)?;
//! let (copy, read) = factory.read_tagged(&mut bytes.as_slice())?;
//! assert_eq!(written, read);
//! assert_eq!(copy.class_id(), 1);
//! # Ok::<(), factoria::FactoriaError>(())
//! ```
//!
//! ## Error handling
//!
//! All failures are reported as [`FactoriaError`]. Optional reads (`try_read*`)
//! return [`tree::ReadOutcome`]: a missing key is `Absent` and never an error, while
//! a present-but-invalid key is always an error and never modifies the destination.
//!
//! ## Portability
//!
//! Binary values use the host's native byte order; see [`codec`].

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod error;
pub mod factory;
pub mod io;
pub mod serializable;
pub mod stream;
pub mod tree;

pub use config::TextConfig;
pub use error::{FactoriaError, Result};
pub use factory::{Builder, Factory, StreamBuilder, TreeBuilder};
pub use serializable::TreeSerializable;
pub use stream::StreamSerializable;
pub use tree::{Document, Node, ReadOutcome};

// Re-export the derive macros so they are accessible as `factoria::TreeObject`.
pub use factoria_derive::{StreamObject, TreeObject};
