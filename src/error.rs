//! Error types for the javaser decoder.

use std::fmt;
use thiserror::Error;

/// The distinct, non-recoverable failure kinds a decode can produce.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ErrorKind {
    /// Stream magic or version did not match `0xACED 0x0005`.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// The byte source ended in the middle of a token.
    #[error("short read: expected {expected} more byte(s)")]
    ShortRead {
        /// How many more bytes the current token needed.
        expected: usize,
    },

    /// A typecode byte outside the closed `TC_*` set.
    #[error("unknown typecode: {0:#04X}")]
    UnknownTypecode(u8),

    /// A typecode that is part of the protocol but not implemented here.
    #[error("unsupported typecode: {0}")]
    UnsupportedTypecode(&'static str),

    /// `TC_REFERENCE` cited a handle that was never assigned.
    #[error("handle not found: {0:#010X}")]
    HandleNotFound(u32),

    /// A handle resolved to an entity of the wrong kind for its context.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// What the caller needed (e.g. "class descriptor").
        expected: &'static str,
        /// What the handle actually resolved to.
        found: &'static str,
    },

    /// A `Z` (boolean) byte was neither 0 nor 1.
    #[error("invalid boolean byte: {0:#04X}")]
    InvalidBoolean(u8),

    /// A collection specialiser's block-data layout did not match its
    /// expected prefix byte, or some other block-data inconsistency.
    #[error("invalid block data: {0}")]
    InvalidBlockData(String),

    /// An object or class annotation region was not terminated by
    /// `TC_ENDBLOCKDATA`.
    #[error("unexpected end of block (missing TC_ENDBLOCKDATA)")]
    UnexpectedEndOfBlock,

    /// Grammar recursion exceeded `DecoderOptions::max_depth`.
    #[error("recursion limit exceeded (max depth {0})")]
    RecursionLimitExceeded(usize),
}

/// A single decode failure: a kind plus where and in what context it
/// occurred.
///
/// Every variant of [`ErrorKind`] aborts the decode in progress; the
/// decoder never substitutes a default value and continues.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    /// The failure kind.
    pub kind: ErrorKind,
    /// Byte offset in the source at which the failure was detected, when
    /// the reader was able to report one.
    pub offset: Option<u64>,
    /// Breadcrumbs naming the class and/or field being parsed when the
    /// failure occurred, outermost first.
    pub context: Vec<String>,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(offset) = self.offset {
            write!(f, " (at offset {offset})")?;
        }
        if !self.context.is_empty() {
            write!(f, " [{}]", self.context.join(" > "))?;
        }
        Ok(())
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl DecodeError {
    /// Build an error with no offset or context attached.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            offset: None,
            context: Vec::new(),
        }
    }

    /// Attach a byte offset to this error.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Push a context breadcrumb (innermost last).
    pub fn with_context(mut self, frame: impl Into<String>) -> Self {
        self.context.push(frame.into());
        self
    }
}

impl From<ErrorKind> for DecodeError {
    fn from(kind: ErrorKind) -> Self {
        DecodeError::new(kind)
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind as IoKind;
        match e.kind() {
            IoKind::UnexpectedEof => DecodeError::new(ErrorKind::ShortRead { expected: 0 }),
            _ => DecodeError::new(ErrorKind::InvalidBlockData(e.to_string())),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DecodeError>;
