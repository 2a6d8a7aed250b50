//! Error types for assertions and the accept pipeline

use std::fmt;
use std::path::PathBuf;

use crate::syntax::SyntaxKind;

/// The call site of a failing assertion could not be determined
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    /// The captured stack did not reach the caller's frame
    StackTooShort { frames: usize },
    /// The caller's frame has no `(path:line:column)` position
    NoSourcePosition { frame: String },
    /// The position names a file that is not Rust source
    UnsupportedExtension { path: PathBuf },
    /// A relative path that exists under none of the search roots
    SourceNotFound { path: PathBuf },
}

impl fmt::Display for LocateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocateError::StackTooShort { frames } => write!(
                f,
                "couldn't locate the caller: the captured stack has only {} frame(s)",
                frames
            ),
            LocateError::NoSourcePosition { frame } => write!(
                f,
                "couldn't find a source position in stack frame `{}`; \
                 the file must be a .rs file and debug info must be enabled",
                frame
            ),
            LocateError::UnsupportedExtension { path } => {
                write!(f, "{} is not a Rust source file", path.display())
            }
            LocateError::SourceNotFound { path } => {
                write!(f, "couldn't find {} on disk", path.display())
            }
        }
    }
}

impl std::error::Error for LocateError {}

/// The located call could not be rewritten
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
    /// The last argument of a matched call is not a string literal
    NotRewritable {
        callee: String,
        line: usize,
        /// `None` when the call has no arguments at all
        kind: Option<SyntaxKind>,
    },
    /// No call to the callee starts on the reported line
    NoCallFound {
        callee: String,
        path: PathBuf,
        line: usize,
        column: usize,
    },
    OverlappingEdits { path: PathBuf },
}

impl fmt::Display for RewriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteError::Io { path, message } => {
                write!(f, "IO error on {}: {}", path.display(), message)
            }
            RewriteError::Parse { path, message } => {
                write!(f, "couldn't parse {}: {}", path.display(), message)
            }
            RewriteError::NotRewritable { callee, line, kind } => {
                let found = kind.map_or("nothing", SyntaxKind::name);
                write!(
                    f,
                    "the last argument of '{}(...)' on line {} was not a string literal but was {}",
                    callee, line, found
                )
            }
            RewriteError::NoCallFound {
                callee,
                path,
                line,
                column,
            } => write!(
                f,
                "no call to '{}' found at {}:{}:{}",
                callee,
                path.display(),
                line,
                column
            ),
            RewriteError::OverlappingEdits { path } => {
                write!(f, "overlapping rewrites in {}", path.display())
            }
        }
    }
}

impl std::error::Error for RewriteError {}

/// Any failure of the accept pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptError {
    Locate(LocateError),
    Rewrite(RewriteError),
}

impl fmt::Display for AcceptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceptError::Locate(err) => err.fmt(f),
            AcceptError::Rewrite(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for AcceptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AcceptError::Locate(err) => Some(err),
            AcceptError::Rewrite(err) => Some(err),
        }
    }
}

impl From<LocateError> for AcceptError {
    fn from(err: LocateError) -> Self {
        AcceptError::Locate(err)
    }
}

impl From<RewriteError> for AcceptError {
    fn from(err: RewriteError) -> Self {
        AcceptError::Rewrite(err)
    }
}

/// A failed golden assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub actual: String,
    pub expected: String,
    pub hint: String,
    /// Why accept mode could not rewrite the expected value
    pub reason: Option<AcceptError>,
}

impl Mismatch {
    pub fn new(actual: impl Into<String>, expected: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            actual: actual.into(),
            expected: expected.into(),
            hint: hint.into(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: AcceptError) -> Self {
        self.reason = Some(reason);
        self
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "golden value mismatch: {}", self.hint)?;
        if let Some(reason) = &self.reason {
            write!(f, " {}", reason)?;
        }
        write!(
            f,
            "\n  actual: `{}`\nexpected: `{}`",
            self.actual, self.expected
        )
    }
}

impl std::error::Error for Mismatch {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.reason
            .as_ref()
            .map(|reason| reason as &(dyn std::error::Error + 'static))
    }
}
