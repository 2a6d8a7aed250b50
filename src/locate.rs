//! Locating the call site of a failing assertion
//!
//! Two strategies produce a [`CallSite`]:
//!
//! - [`CallSite::from_location`] takes the compiler-provided location of a
//!   `#[track_caller]` entry point. This is the default.
//! - [`locate`] reads a [`CapturedStack`] and takes the position printed for
//!   frame [`CALLER_FRAME`]. Frame 0 is [`CapturedStack::capture`] itself and
//!   frame 1 is the assertion entry point, so frame 2 is the test author's
//!   call. Entry points must capture the stack directly in their own body for
//!   that offset to hold.
//!
//! Both report the path the way rustc saw it, which is usually relative to
//! the workspace root. [`CallSite::resolve`] turns it into an absolute path
//! that exists in a [`DocumentStore`].

use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::LocateError;
use crate::store::{normalize_path, DocumentStore};

/// Index of the test author's frame in a [`CapturedStack`]
pub const CALLER_FRAME: usize = 2;

/// File extensions a call site may point at
pub const SOURCE_EXTENSIONS: &[&str] = &["rs"];

/// `(path.ext:line:column)` at the end of a rendered frame
static FRAME_POSITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(((?:\w:)?[-_\w \\/\.]+\.(\w+)):(\d+):(\d+)\)")
        .expect("frame position pattern is valid")
});

/// `N: symbol` header line of the standard backtrace rendering
static FRAME_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+:\s+(.*)$").expect("frame header pattern is valid"));

/// Where an assertion was called: 1-based line and column
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallSite {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl CallSite {
    pub fn new(path: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            path: path.into(),
            line,
            column,
        }
    }

    /// Call site of a `#[track_caller]` function
    pub fn from_location(location: &Location<'_>) -> Result<Self, LocateError> {
        let path = PathBuf::from(location.file());
        check_extension(&path)?;
        Ok(Self::new(
            path,
            location.line() as usize,
            location.column() as usize,
        ))
    }

    /// Make the path absolute and check that the store has it
    pub fn resolve<S: DocumentStore + ?Sized>(self, store: &S) -> Result<Self, LocateError> {
        let path = resolve_source_path(&self.path, store)?;
        Ok(Self { path, ..self })
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.line, self.column)
    }
}

fn check_extension(path: &Path) -> Result<(), LocateError> {
    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext));
    if supported {
        Ok(())
    } else {
        Err(LocateError::UnsupportedExtension {
            path: path.to_path_buf(),
        })
    }
}

/// Ordered stack frames, each rendered as `symbol (path:line:column)` when
/// the position is known and as the bare symbol otherwise
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedStack {
    frames: Vec<String>,
}

impl CapturedStack {
    pub fn from_frames<I, F>(frames: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        Self {
            frames: frames.into_iter().map(Into::into).collect(),
        }
    }

    /// Capture the current stack. The returned stack starts at this function.
    #[inline(never)]
    pub fn capture() -> Self {
        let rendered = Backtrace::force_capture().to_string();
        let mut stack = Self::parse(&rendered);

        if let Some(start) = stack
            .frames
            .iter()
            .position(|frame| frame.contains("CapturedStack::capture"))
        {
            stack.frames.drain(..start);
        }
        stack
    }

    /// Read the standard library's backtrace rendering:
    ///
    /// ```text
    ///    0: crate::module::function
    ///              at ./src/module.rs:10:5
    /// ```
    pub fn parse(rendered: &str) -> Self {
        let mut frames: Vec<String> = Vec::new();
        let mut positioned = false;

        for line in rendered.lines() {
            if let Some(header) = FRAME_HEADER.captures(line) {
                frames.push(header[1].trim().to_string());
                positioned = false;
                continue;
            }

            let Some(position) = line.trim().strip_prefix("at ") else {
                continue;
            };
            // inlined symbols repeat `at`; the first position belongs to the frame
            if let (Some(frame), false) = (frames.last_mut(), positioned) {
                frame.push_str(&format!(" ({})", position.trim()));
                positioned = true;
            }
        }

        Self { frames }
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl fmt::Display for CapturedStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, frame) in self.frames.iter().enumerate() {
            writeln!(f, "{:4}: {}", index, frame)?;
        }
        Ok(())
    }
}

/// Read the test author's call site out of a captured stack
pub fn locate(stack: &CapturedStack) -> Result<CallSite, LocateError> {
    let frame = stack
        .frames()
        .get(CALLER_FRAME)
        .ok_or(LocateError::StackTooShort {
            frames: stack.len(),
        })?;

    let captures = FRAME_POSITION
        .captures(frame)
        .ok_or_else(|| LocateError::NoSourcePosition {
            frame: frame.clone(),
        })?;

    let path = PathBuf::from(&captures[1]);
    if !SOURCE_EXTENSIONS.contains(&&captures[2]) {
        return Err(LocateError::UnsupportedExtension { path });
    }

    let number = |index: usize| {
        captures[index]
            .parse::<usize>()
            .map_err(|_| LocateError::NoSourcePosition {
                frame: frame.clone(),
            })
    };
    let site = CallSite::new(path, number(3)?, number(4)?);

    tracing::debug!(site = %site, "located call site from captured stack");
    Ok(site)
}

/// Directories a relative source path is resolved against, in order
pub fn search_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(manifest_dir) = std::env::var_os("CARGO_MANIFEST_DIR") {
        roots.extend(Path::new(&manifest_dir).ancestors().map(Path::to_path_buf));
    }
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    roots
}

/// Turn a reported source path into an absolute one the store knows about
pub fn resolve_source_path<S: DocumentStore + ?Sized>(
    path: &Path,
    store: &S,
) -> Result<PathBuf, LocateError> {
    resolve_source_path_in(path, &search_roots(), store)
}

/// [`resolve_source_path`] against explicit roots
pub fn resolve_source_path_in<S: DocumentStore + ?Sized>(
    path: &Path,
    roots: &[PathBuf],
    store: &S,
) -> Result<PathBuf, LocateError> {
    if path.is_absolute() {
        return Ok(normalize_path(path));
    }

    roots
        .iter()
        .map(|root| normalize_path(&root.join(path)))
        .find(|candidate| store.exists(candidate))
        .ok_or_else(|| LocateError::SourceNotFound {
            path: path.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rstest::rstest;

    fn stack(frames: &[&str]) -> CapturedStack {
        CapturedStack::from_frames(frames.iter().copied())
    }

    #[rstest]
    #[case(&[])]
    #[case(&["golden::locate::CapturedStack::capture (./src/locate.rs:1:1)"])]
    #[case(&[
        "golden::locate::CapturedStack::capture (./src/locate.rs:1:1)",
        "golden::dispatch::Dispatcher::check (./src/dispatch.rs:2:2)",
    ])]
    fn test_short_stacks_are_rejected(#[case] frames: &[&str]) {
        assert_eq!(
            locate(&stack(frames)),
            Err(LocateError::StackTooShort {
                frames: frames.len()
            })
        );
    }

    #[test]
    fn test_locates_third_frame() {
        let site = locate(&stack(&[
            "capture (./src/locate.rs:1:1)",
            "check (./src/dispatch.rs:2:2)",
            "example::second (./tests/example.rs:14:5)",
            "test::run (/rustc/library/test/src/lib.rs:600:5)",
        ]))
        .unwrap();

        assert_eq!(site, CallSite::new("./tests/example.rs", 14, 5));
        assert_eq!(site.to_string(), "./tests/example.rs:14:5");
    }

    #[rstest]
    #[case("example::second")]
    #[case("example::second (./tests/example.rs)")]
    #[case("example::second (./tests/example.rs:14)")]
    fn test_frame_without_position(#[case] frame: &str) {
        let result = locate(&stack(&["a", "b", frame]));
        assert!(matches!(result, Err(LocateError::NoSourcePosition { .. })));
    }

    #[rstest]
    #[case("handler (./src/lib.py:3:1)")]
    #[case("main (C:\\work\\main.c:10:2)")]
    fn test_unsupported_extension(#[case] frame: &str) {
        let result = locate(&stack(&["a", "b", frame]));
        assert!(matches!(
            result,
            Err(LocateError::UnsupportedExtension { .. })
        ));
    }

    #[test]
    fn test_windows_drive_path() {
        let site = locate(&stack(&["a", "b", "t (C:\\work\\tests\\t.rs:7:9)"])).unwrap();
        assert_eq!(site.path, PathBuf::from("C:\\work\\tests\\t.rs"));
        assert_eq!((site.line, site.column), (7, 9));
    }

    #[test]
    fn test_parse_std_rendering() {
        let rendered = "\
   0: golden::locate::CapturedStack::capture
             at ./src/locate.rs:120:24
   1: golden::dispatch::Dispatcher<S>::check
             at ./src/dispatch.rs:88:22
   2: example::second
             at ./tests/example.rs:14:5
             at ./tests/example.rs:12:1
   3: core::ops::function::FnOnce::call_once
";
        let stack = CapturedStack::parse(rendered);

        assert_eq!(
            stack.frames(),
            &[
                "golden::locate::CapturedStack::capture (./src/locate.rs:120:24)",
                "golden::dispatch::Dispatcher<S>::check (./src/dispatch.rs:88:22)",
                "example::second (./tests/example.rs:14:5)",
                "core::ops::function::FnOnce::call_once",
            ]
        );
        assert_eq!(
            locate(&stack).unwrap(),
            CallSite::new("./tests/example.rs", 14, 5)
        );
    }

    #[test]
    fn test_capture_is_not_empty() {
        let stack = CapturedStack::capture();
        assert!(!stack.is_empty());
    }

    #[track_caller]
    fn here() -> &'static Location<'static> {
        Location::caller()
    }

    #[test]
    fn test_from_location() {
        let line = line!() + 1;
        let site = CallSite::from_location(here()).unwrap();
        assert!(site.path.to_string_lossy().ends_with("locate.rs"));
        assert_eq!(site.line, line as usize);
        assert_eq!(site.column, 44);
    }

    #[test]
    fn test_resolves_relative_path_against_roots() {
        let store = MemoryStore::new().with_file("/work/crate/tests/example.rs", "");
        let roots = vec![
            PathBuf::from("/work/crate"),
            PathBuf::from("/work"),
        ];

        let resolved = resolve_source_path_in(Path::new("./tests/example.rs"), &roots, &store);
        assert_eq!(resolved, Ok(PathBuf::from("/work/crate/tests/example.rs")));

        // workspace-relative path, found from the workspace root
        let resolved = resolve_source_path_in(Path::new("crate/tests/example.rs"), &roots, &store);
        assert_eq!(resolved, Ok(PathBuf::from("/work/crate/tests/example.rs")));
    }

    #[test]
    fn test_unresolvable_path() {
        let store = MemoryStore::new();
        let result = resolve_source_path_in(
            Path::new("tests/missing.rs"),
            &[PathBuf::from("/work")],
            &store,
        );
        assert_eq!(
            result,
            Err(LocateError::SourceNotFound {
                path: PathBuf::from("tests/missing.rs")
            })
        );
    }

    #[test]
    fn test_absolute_path_is_normalized() {
        let store = MemoryStore::new();
        let resolved = resolve_source_path_in(Path::new("/work/./tests/../tests/a.rs"), &[], &store);
        assert_eq!(resolved, Ok(PathBuf::from("/work/tests/a.rs")));
    }
}
