//! # javaser
//!
//! A pure Rust decoder for the Java Object Serialization Stream Protocol
//! (stream magic `0xACED`, version `0x0005`).
//!
//! This crate reads the wire format a `java.io.ObjectOutputStream`
//! produces and reduces it to a host-language-shaped [`Value`] tree —
//! nulls, booleans, integers, doubles, byte strings, text strings,
//! ordered sequences, field mappings, and sets — without ever
//! instantiating a JVM or depending on Java class bytecode.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use javaser::decode_bytes;
//!
//! let value = decode_bytes(&stream_bytes)?;
//! println!("{value:?}");
//! # Ok::<(), javaser::error::DecodeError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`reader::ByteReader`] — big-endian primitive reads with short-read
//!   detection.
//! - [`handle::HandleTable`] — the append-only back-reference store every
//!   class descriptor, string, object, and array is registered in.
//! - [`node::TypeNode`] — the tagged sum type stored per handle.
//! - [`walker::GrammarWalker`] — the recursive reducer over `TC_*`
//!   typecodes; this is where the protocol's grammar actually lives.
//! - [`collections`] — specialised block-data decoders for the handful
//!   of `java.util.*` classes whose custom serial form is known
//!   (`ArrayList`, `HashMap`, `BitSet`, ...).
//! - [`value::Value`] — the output tree.
//!
//! ## Non-goals
//!
//! `TC_RESET`, `TC_EXCEPTION`, `TC_PROXYCLASSDESC`, `TC_CLASS`, and
//! `TC_ENUM` are recognised but not decoded — a stream that uses them
//! stops with [`error::ErrorKind::UnsupportedTypecode`] rather than being
//! silently misread. `Externalizable` payloads and Java Modified UTF-8
//! are likewise out of scope; string bytes are surfaced as standard
//! UTF-8.

#![warn(missing_docs)]

pub mod collections;
pub mod error;
pub mod handle;
pub mod node;
pub mod reader;
pub mod typecode;
pub mod value;
pub mod walker;

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

pub use error::{DecodeError, Result};
pub use value::Value;
pub use walker::DecoderOptions;

use walker::GrammarWalker;

/// Decode the first top-level value from an in-memory byte buffer, using
/// default [`DecoderOptions`].
pub fn decode_bytes(bytes: &[u8]) -> Result<Value> {
    decode_bytes_with_options(bytes, DecoderOptions::default())
}

/// Decode the first top-level value from an in-memory byte buffer with
/// explicit options.
pub fn decode_bytes_with_options(bytes: &[u8], options: DecoderOptions) -> Result<Value> {
    decode_reader_with_options(Cursor::new(bytes), options)
}

/// Decode every top-level value an in-memory byte buffer carries. A
/// single stream may contain more than one object written back-to-back
/// by repeated `ObjectOutputStream.writeObject` calls sharing one
/// handle table.
pub fn decode_all_bytes(bytes: &[u8]) -> Result<Vec<Value>> {
    decode_all_bytes_with_options(bytes, DecoderOptions::default())
}

/// [`decode_all_bytes`] with explicit options.
pub fn decode_all_bytes_with_options(bytes: &[u8], options: DecoderOptions) -> Result<Vec<Value>> {
    decode_all_reader_with_options(Cursor::new(bytes), options)
}

/// Decode the first top-level value from a file, using default
/// [`DecoderOptions`].
pub fn decode_file(path: impl AsRef<Path>) -> Result<Value> {
    decode_file_with_options(path, DecoderOptions::default())
}

/// [`decode_file`] with explicit options.
pub fn decode_file_with_options(path: impl AsRef<Path>, options: DecoderOptions) -> Result<Value> {
    let file = File::open(path)?;
    decode_reader_with_options(BufReader::new(file), options)
}

/// Decode the first top-level value from any byte source, using default
/// [`DecoderOptions`].
pub fn decode_reader<R: Read>(reader: R) -> Result<Value> {
    decode_reader_with_options(reader, DecoderOptions::default())
}

/// [`decode_reader`] with explicit options.
pub fn decode_reader_with_options<R: Read>(reader: R, options: DecoderOptions) -> Result<Value> {
    let mut walker = GrammarWalker::new(reader, options);
    walker.read_header()?;
    walker.read_item()
}

/// Decode every top-level value any byte source carries, using default
/// [`DecoderOptions`].
pub fn decode_all_reader<R: Read>(reader: R) -> Result<Vec<Value>> {
    decode_all_reader_with_options(reader, DecoderOptions::default())
}

/// [`decode_all_reader`] with explicit options.
pub fn decode_all_reader_with_options<R: Read>(reader: R, options: DecoderOptions) -> Result<Vec<Value>> {
    let mut walker = GrammarWalker::new(reader, options);
    walker.read_header()?;
    let mut values = Vec::new();
    while let Some(value) = walker.try_read_item()? {
        values.push(value);
    }
    Ok(values)
}
