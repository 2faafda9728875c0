//! Primitive value codec.
//!
//! Two independent encodings live here:
//!
//! * [`TextValue`]: conversion between a primitive and the text stored inside a tree
//!   element. `bool` accepts exactly `true`/`false`; `char` is stored as its integer
//!   code point; floating point values use the shortest text that reads back to the
//!   same value unless a precision is requested through [`format_f64`].
//! * [`BinaryValue`]: fixed-width binary primitives and fixed-length arrays of them.
//!
//! # Byte order
//!
//! Binary values are written in the **native** byte order of the host, with no
//! normalization. Streams are therefore only portable between hosts of the same
//! endianness. On the little-endian targets this crate is normally deployed on, an
//! `i32` of `3` is written as `[3, 0, 0, 0]`.

use std::io::{Read, Write};

use crate::error::{FactoriaError, Result};

/// A primitive that can be stored as the text content of a tree element.
pub trait TextValue: Sized {
    /// Parses the value from element text.
    fn parse_text(text: &str) -> Result<Self>;

    /// Formats the value as element text (unescaped).
    fn format_text(&self) -> String;
}

/// Parses `text` as `T`. Shorthand for [`TextValue::parse_text`].
pub fn parse<T: TextValue>(text: &str) -> Result<T> {
    T::parse_text(text)
}

/// Formats `value` as text. Shorthand for [`TextValue::format_text`].
pub fn format<T: TextValue>(value: &T) -> String {
    value.format_text()
}

/// Strings are stored verbatim, except that the tree parser trims element text:
/// leading and trailing whitespace does not survive a round trip through a
/// document, and a whitespace-only string reads back empty.
impl TextValue for String {
    fn parse_text(text: &str) -> Result<Self> {
        Ok(text.to_owned())
    }

    fn format_text(&self) -> String {
        self.clone()
    }
}

impl TextValue for bool {
    fn parse_text(text: &str) -> Result<Self> {
        match text {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(FactoriaError::Conversion(format!(
                "cannot convert '{text}' to bool"
            ))),
        }
    }

    fn format_text(&self) -> String {
        if *self { "true" } else { "false" }.to_owned()
    }
}

impl TextValue for char {
    fn parse_text(text: &str) -> Result<Self> {
        let code = u32::parse_text(text)?;
        char::from_u32(code).ok_or_else(|| {
            FactoriaError::Conversion(format!("'{text}' is not a valid character code"))
        })
    }

    fn format_text(&self) -> String {
        u32::from(*self).to_string()
    }
}

macro_rules! impl_text_number {
    ($($t:ty),*) => {
        $(
            impl TextValue for $t {
                fn parse_text(text: &str) -> Result<Self> {
                    text.trim().parse::<$t>().map_err(|e| {
                        FactoriaError::Conversion(format!(
                            "cannot convert '{}' to {}: {}",
                            text,
                            stringify!($t),
                            e
                        ))
                    })
                }

                fn format_text(&self) -> String {
                    self.to_string()
                }
            }
        )*
    }
}

impl_text_number!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);

/// Formats a double with `precision` significant digits, switching to scientific
/// notation for very large or very small magnitudes. Trailing zeros are dropped,
/// so `format_f64(0.5, 10)` is `"0.5"` and `format_f64(1234567.0, 3)` is `"1.23e6"`.
pub fn format_f64(value: f64, precision: usize) -> String {
    if !value.is_finite() || value == 0.0 {
        return value.to_string();
    }
    let precision = precision.max(1);

    // Round once in scientific form so the exponent reflects the rounded value.
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return sci,
    };
    let exponent: i64 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i64 {
        format!("{}e{}", trim_fraction(mantissa), exponent)
    } else {
        let decimals = (precision as i64 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_owned()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// A fixed-width primitive with a raw binary representation.
pub trait BinaryValue: Sized {
    /// Number of bytes one value occupies on the wire.
    const WIDTH: usize;

    /// Writes the value and returns the number of bytes written.
    fn write_binary<W: Write + ?Sized>(&self, sink: &mut W) -> Result<usize>;

    /// Reads one value and returns it with the number of bytes consumed.
    ///
    /// A stream that ends before `WIDTH` bytes are available yields
    /// [`FactoriaError::Io`] with kind `UnexpectedEof`.
    fn read_binary<R: Read + ?Sized>(source: &mut R) -> Result<(Self, usize)>;
}

macro_rules! impl_binary_primitive {
    ($($t:ty),*) => {
        $(
            impl BinaryValue for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();

                fn write_binary<W: Write + ?Sized>(&self, sink: &mut W) -> Result<usize> {
                    sink.write_all(&self.to_ne_bytes())?;
                    Ok(Self::WIDTH)
                }

                fn read_binary<R: Read + ?Sized>(source: &mut R) -> Result<(Self, usize)> {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    source.read_exact(&mut buf)?;
                    Ok((<$t>::from_ne_bytes(buf), Self::WIDTH))
                }
            }
        )*
    }
}

impl_binary_primitive!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl<T: BinaryValue, const N: usize> BinaryValue for [T; N] {
    const WIDTH: usize = T::WIDTH * N;

    fn write_binary<W: Write + ?Sized>(&self, sink: &mut W) -> Result<usize> {
        write_slice(sink, self)
    }

    fn read_binary<R: Read + ?Sized>(source: &mut R) -> Result<(Self, usize)> {
        let (values, bytes) = read_vec::<T, R>(source, N)?;
        let array: [T; N] = values.try_into().map_err(|_| {
            FactoriaError::Conversion(format!("expected exactly {N} array elements"))
        })?;
        Ok((array, bytes))
    }
}

/// Writes every element of `values` back to back, without a length prefix.
pub fn write_slice<T: BinaryValue, W: Write + ?Sized>(sink: &mut W, values: &[T]) -> Result<usize> {
    let mut written = 0;
    for value in values {
        written += value.write_binary(sink)?;
    }
    Ok(written)
}

/// Upper bound on the elements reserved up front by [`read_vec`]. Counts come
/// from the stream itself, so a larger count only grows the vector as elements
/// actually arrive.
const MAX_PREALLOC: usize = 4096;

/// Reads exactly `count` elements. The caller must know the count, since
/// arrays carry no length prefix.
///
/// A stream holding fewer than `count` elements fails with
/// [`FactoriaError::Io`] (`UnexpectedEof`), however large `count` is.
pub fn read_vec<T: BinaryValue, R: Read + ?Sized>(
    source: &mut R,
    count: usize,
) -> Result<(Vec<T>, usize)> {
    let mut values = Vec::with_capacity(count.min(MAX_PREALLOC));
    let mut read = 0;
    for _ in 0..count {
        let (value, bytes) = T::read_binary(source)?;
        values.push(value);
        read += bytes;
    }
    Ok((values, read))
}

/// Fills `values` in place from the stream.
pub fn read_into<T: BinaryValue, R: Read + ?Sized>(source: &mut R, values: &mut [T]) -> Result<usize> {
    let mut read = 0;
    for slot in values.iter_mut() {
        let (value, bytes) = T::read_binary(source)?;
        *slot = value;
        read += bytes;
    }
    Ok(read)
}

/// Writes a collection length as the `u32` prefix used by variable-length fields.
///
/// Lengths that do not fit in a `u32` are a [`FactoriaError::Conversion`] error
/// rather than a truncated prefix disagreeing with the payload.
pub fn write_len<W: Write + ?Sized>(sink: &mut W, len: usize) -> Result<usize> {
    let count = u32::try_from(len).map_err(|_| {
        FactoriaError::Conversion(format!("length {len} does not fit in a u32 prefix"))
    })?;
    count.write_binary(sink)
}

/// Reads a `u32` length prefix written by [`write_len`].
pub fn read_len<R: Read + ?Sized>(source: &mut R) -> Result<(usize, usize)> {
    let (count, bytes) = u32::read_binary(source)?;
    Ok((count as usize, bytes))
}
