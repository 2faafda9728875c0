//! The binary-form object contract.
//!
//! A tagged record is the 4-byte class id followed by the payload the type writes
//! itself. Payloads carry no length prefix, so each type must read back exactly
//! what it wrote and report the byte count it consumed.
//!
//! There is no tagged read at the object level: the concrete type is not known
//! until the tag has been resolved, which is the job of
//! [`Factory::read_tagged`](crate::Factory::read_tagged).

use std::io::{Read, Write};
use std::path::Path;

use crate::codec::BinaryValue;
use crate::error::Result;
use crate::io::create_binary;

/// Width in bytes of the class id prefix.
pub const CLASS_ID_WIDTH: usize = <i32 as BinaryValue>::WIDTH;

/// A type that can be written to and read from a binary stream.
pub trait StreamSerializable {
    /// Numeric tag identifying the concrete type within its factory.
    ///
    /// Ids only need to be unique within one hierarchy of buildable types.
    fn class_id(&self) -> i32;

    /// Writes the payload and returns the number of bytes written.
    fn encode_payload(&self, sink: &mut dyn Write) -> Result<usize>;

    /// Reads the payload into `self` and returns the number of bytes consumed.
    fn decode_payload(&mut self, source: &mut dyn Read) -> Result<usize>;

    /// Writes the class id followed by the payload. Returns the total byte count.
    fn write_tagged(&self, sink: &mut dyn Write) -> Result<usize> {
        let mut written = self.class_id().write_binary(sink)?;
        written += self.encode_payload(sink)?;
        Ok(written)
    }

    /// Saves to a binary file, with or without the leading class id.
    fn save(&self, path: &Path, with_class_id: bool) -> Result<usize> {
        let mut out = create_binary(path)?;
        let written = if with_class_id {
            self.write_tagged(&mut out)?
        } else {
            self.encode_payload(&mut out)?
        };
        out.flush()?;
        Ok(written)
    }
}
