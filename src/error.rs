//! Centralized error handling for Factoria.
//!
//! Every fallible operation in the crate returns [`Result`], and no library path
//! panics. The error kinds mirror the failure domains of the framework:
//!
//! - **Registration** ([`FactoriaError::DuplicateRegistration`]): a builder was bound
//!   twice under the same name or id. This is a start-up bug, not a user condition.
//! - **Dispatch** ([`FactoriaError::UnknownType`]): a build was requested for a name or
//!   tag nobody registered. Recoverable; the error lists every known identifier.
//! - **Structure** ([`FactoriaError::Parse`], [`FactoriaError::MalformedNode`],
//!   [`FactoriaError::DuplicateKey`]): the tree document does not follow the expected
//!   layout (missing key, missing class child, repeated map key, invalid markup).
//! - **Values** ([`FactoriaError::Conversion`]): a primitive could not be parsed from text.
//! - **I/O** ([`FactoriaError::Io`]): a file could not be opened, read or written, or a
//!   binary stream ended early.
//!
//! ## Matching on the kind
//!
//! ```rust
//! use factoria::FactoriaError;
//!
//! fn describe(err: &FactoriaError) -> &'static str {
//!     match err {
//!         FactoriaError::UnknownType { .. } => "unregistered type",
//!         FactoriaError::Io(_) => "i/o",
//!         _ => "other",
//!     }
//! }
//!
//! let err = factoria::tree::parse_string("").unwrap_err();
//! assert_eq!(describe(&err), "other");
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for Factoria operations.
pub type Result<T> = std::result::Result<T, FactoriaError>;

/// The master error enum covering all failure domains in Factoria.
///
/// The type is `Clone` so errors can be stored or shared across threads after a
/// parallel batch of builds. I/O errors are wrapped in `Arc` for that reason.
#[derive(Debug, Clone)]
pub enum FactoriaError {
    /// Low-level I/O failure, including a binary stream that ended prematurely.
    Io(Arc<io::Error>),

    /// The tree text is not well formed, or a required key is missing.
    ///
    /// The message names the offending key and the node it was looked up in.
    Parse(String),

    /// A node does not follow the `<outer><ClassName>...</ClassName></outer>`
    /// convention, e.g. it has no child carrying the class tag.
    MalformedNode(String),

    /// A primitive value's text could not be converted to the requested type.
    Conversion(String),

    /// A build was requested for a name or id that is not registered.
    UnknownType {
        /// The identifier that was looked up, rendered as text.
        requested: String,
        /// Every identifier registered in the namespace that was searched.
        known: Vec<String>,
    },

    /// A builder is already bound to this name or id. The first binding is kept.
    DuplicateRegistration(String),

    /// The same key appeared twice within one map element.
    DuplicateKey(String),
}

impl FactoriaError {
    /// Returns true for the error kinds produced while reading tree documents.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Parse(_) | Self::MalformedNode(_) | Self::DuplicateKey(_)
        )
    }
}

impl fmt::Display for FactoriaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::Parse(s) => write!(f, "Parse Error: {s}"),
            Self::MalformedNode(s) => write!(f, "Malformed Node: {s}"),
            Self::Conversion(s) => write!(f, "Conversion Error: {s}"),
            Self::UnknownType { requested, known } => {
                write!(f, "Unknown Type: '{requested}' is not registered")?;
                if known.is_empty() {
                    write!(f, " (no builders registered)")
                } else {
                    write!(f, " (known: {})", known.join(", "))
                }
            }
            Self::DuplicateRegistration(s) => write!(f, "Duplicate Registration: {s}"),
            Self::DuplicateKey(s) => write!(f, "Duplicate Key: {s}"),
        }
    }
}

impl std::error::Error for FactoriaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FactoriaError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<quick_xml::Error> for FactoriaError {
    fn from(err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(e) => Self::Io(e),
            other => Self::Parse(other.to_string()),
        }
    }
}
