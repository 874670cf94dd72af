//! Error types for zbind

use std::fmt;
use thiserror::Error;

/// Position in source text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pos {
    pub offset: usize,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

impl Pos {
    pub const fn new(offset: usize, line: u32, col: u32) -> Self {
        Self { offset, line, col }
    }
}

/// Span representing a range in source text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub const fn at(pos: Pos) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    pub const fn empty() -> Self {
        Self {
            start: Pos::new(0, 0, 0),
            end: Pos::new(0, 0, 0),
        }
    }

    /// True for spans that do not point into source text
    pub const fn is_empty(&self) -> bool {
        self.start.line == 0
    }
}

/// Error kind for detailed categorization
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The parser could not make sense of the document structure
    MalformedDocument,
    /// The underlying reader or writer failed
    Io(std::io::ErrorKind),
    /// No scalar, container or composite mapping applies to the type
    UnsupportedType { type_name: String },
    /// Text could not be converted into the expected type
    InvalidValue { expected: String, found: String },
    /// A composite could not be constructed
    Instantiation { type_name: String },
    /// A user supplied adapter failed
    Adapter { adapter: String },
    MaxDepthExceeded { max: u16 },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedDocument => write!(f, "malformed document"),
            Self::Io(kind) => write!(f, "i/o failure: {kind}"),
            Self::UnsupportedType { type_name } => write!(f, "unsupported type: {type_name}"),
            Self::InvalidValue { expected, found } => {
                write!(f, "invalid value: expected {expected}, found {found:?}")
            }
            Self::Instantiation { type_name } => {
                write!(f, "cannot instantiate {type_name}")
            }
            Self::Adapter { adapter } => write!(f, "adapter {adapter} failed"),
            Self::MaxDepthExceeded { max } => write!(f, "max depth exceeded: {max}"),
        }
    }
}

/// Main error type for zbind
#[derive(Error, Clone, Debug, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    span: Span,
    message: String,
    path: Vec<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            span,
            message,
            path: Vec::new(),
        }
    }

    pub fn with_message(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
            path: Vec::new(),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Field/element names leading to the failure, outermost first
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Create error at specific position
    pub fn at(kind: ErrorKind, offset: usize, line: u32, col: u32) -> Self {
        let pos = Pos::new(offset, line, col);
        Self::new(kind, Span::at(pos))
    }

    pub fn malformed(pos: Pos, message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::MalformedDocument, Span::at(pos), message)
    }

    pub fn unsupported_type(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_message(
            ErrorKind::UnsupportedType {
                type_name: type_name.into(),
            },
            Span::empty(),
            message,
        )
    }

    pub fn invalid_value(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::InvalidValue {
                expected: expected.into(),
                found: found.into(),
            },
            Span::empty(),
        )
    }

    pub fn instantiation(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_message(
            ErrorKind::Instantiation {
                type_name: type_name.into(),
            },
            Span::empty(),
            message,
        )
    }

    pub fn adapter(adapter: impl Into<String>, cause: impl fmt::Display) -> Self {
        let adapter = adapter.into();
        let message = format!("adapter {adapter} failed: {cause}");
        Self::with_message(ErrorKind::Adapter { adapter }, Span::empty(), message)
    }

    /// Prefix the error path with the element or field the failure occurred in
    pub fn in_element(mut self, name: impl Into<String>) -> Self {
        self.path.insert(0, name.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.path.is_empty() {
            write!(f, "error in `{}`: {}", self.path.join("/"), self.message)
        } else if self.span.is_empty() {
            write!(f, "error: {}", self.message)
        } else {
            write!(f, "error at {}: {}", self.span.start, self.message)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::with_message(ErrorKind::Io(err.kind()), Span::empty(), err.to_string())
    }
}

/// Result type alias for zbind
pub type Result<T> = std::result::Result<T, Error>;
