//! Rewriting matched literals
//!
//! An [`Edit`] replaces the bytes of one literal with a quoted value. Edits
//! are applied back to front so earlier byte offsets stay valid, and every
//! byte outside the replaced ranges is copied through unchanged.

use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::RewriteError;
use crate::matcher::TargetArgument;
use crate::syntax::Position;

/// Render `value` as a single-line Rust string literal
pub fn quote(value: &str) -> String {
    format!("{:?}", value)
}

/// Replace `range` of the source with `replacement`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
    pub start: Position,
    pub end: Position,
}

impl Edit {
    /// Replace the target literal with `value`, quoted
    pub fn replace(target: &TargetArgument, value: &str) -> Self {
        Self {
            range: target.range.span.clone(),
            replacement: quote(value),
            start: target.range.start,
            end: target.range.end,
        }
    }

    /// Lines added (positive) or removed (negative) by this edit
    pub fn line_delta(&self, source: &str) -> isize {
        let original = source.get(self.range.clone()).unwrap_or("");
        count_newlines(&self.replacement) as isize - count_newlines(original) as isize
    }

    /// How this edit moves the text after it
    pub fn shift(&self) -> Shift {
        let last_line = self
            .replacement
            .rsplit('\n')
            .next()
            .unwrap_or(&self.replacement);
        Shift {
            start: self.start,
            end: self.end,
            inserted_lines: count_newlines(&self.replacement),
            last_line_chars: last_line.chars().count(),
        }
    }
}

fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|&byte| byte == b'\n').count()
}

/// Apply edits to `source`. Identical duplicates collapse into one edit; any
/// other overlap is an error.
pub fn apply_edits(path: &Path, source: &str, edits: &[Edit]) -> Result<String, RewriteError> {
    let ordered = back_to_front(edits);

    let out_of_bounds = ordered
        .iter()
        .any(|edit| source.get(edit.range.clone()).is_none());
    let overlapping = ordered
        .windows(2)
        .any(|pair| pair[1].range.end > pair[0].range.start);
    if out_of_bounds || overlapping {
        return Err(RewriteError::OverlappingEdits {
            path: path.to_path_buf(),
        });
    }

    let mut result = source.to_string();
    for edit in ordered {
        result.replace_range(edit.range.clone(), &edit.replacement);
    }
    Ok(result)
}

/// Edits sorted from the end of the file to the start, duplicates removed
pub fn back_to_front(edits: &[Edit]) -> Vec<&Edit> {
    let mut ordered: Vec<&Edit> = edits.iter().collect();
    ordered.sort_by(|a, b| b.range.start.cmp(&a.range.start));
    ordered.dedup_by(|a, b| a == b);
    ordered
}

/// A saved edit, in the positions of the file before it was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub start: Position,
    pub end: Position,
    pub inserted_lines: usize,
    /// Characters after the last inserted newline (or in total, without one)
    pub last_line_chars: usize,
}

impl Shift {
    /// Where `position`, which lies outside the replaced text, ends up
    pub fn apply(&self, position: Position) -> Position {
        if position < self.end {
            return position;
        }

        if position.line > self.end.line {
            let line = position.line - (self.end.line - self.start.line) + self.inserted_lines;
            return Position::new(line, position.column);
        }

        let line_start = if self.inserted_lines == 0 {
            self.start.column
        } else {
            0
        };
        Position::new(
            self.start.line + self.inserted_lines,
            line_start + self.last_line_chars + (position.column - self.end.column),
        )
    }
}

/// Map a 1-based `(line, column)` of the source as compiled to the same spot
/// in the current file. `shifts` are in the order they were applied.
pub fn translate(shifts: &[Shift], line: usize, column: usize) -> (usize, usize) {
    let compiled = Position::new(line.saturating_sub(1), column.saturating_sub(1));
    let current = shifts.iter().fold(compiled, |position, shift| shift.apply(position));
    (current.display_line(), current.display_column())
}

/// Saved edits per file, in the order they were applied
pub type Shifts = HashMap<PathBuf, Vec<Shift>>;

/// Shifts of every file behind one store.
///
/// The ledger belongs to the files, not to a dispatcher: every dispatcher
/// on the same store translates call sites through it, and holding its lock
/// from reading a file until the rewrite is written back serializes accept
/// cycles across them.
#[derive(Debug, Default)]
pub struct ShiftLedger {
    files: Mutex<Shifts>,
}

impl ShiftLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panic mid-rewrite leaves the recorded shifts usable, so poisoning
    /// is ignored
    pub fn lock(&self) -> MutexGuard<'_, Shifts> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Disambiguation;
    use crate::locate::CallSite;
    use crate::matcher::find_rewrite_targets;
    use crate::syntax::SourceDocument;
    use proptest::prelude::*;
    use rstest::rstest;

    fn rewrite(source: &str, line: usize, value: &str) -> String {
        let doc = SourceDocument::parse("/t.rs", source.to_string()).unwrap();
        let site = CallSite::new("/t.rs", line, 1);
        let targets = find_rewrite_targets(&doc, &site, "expect", Disambiguation::Line).unwrap();
        let edits: Vec<Edit> = targets.iter().map(|t| Edit::replace(t, value)).collect();
        apply_edits(Path::new("/t.rs"), source, &edits).unwrap()
    }

    #[rstest]
    #[case("SECOND", r#""SECOND""#)]
    #[case("a \"b\"", r#""a \"b\"""#)]
    #[case("back\\slash", r#""back\\slash""#)]
    #[case("two\nlines", r#""two\nlines""#)]
    #[case("tab\there", r#""tab\there""#)]
    #[case("", r#""""#)]
    #[case("ünïcödé", r#""ünïcödé""#)]
    fn test_quote(#[case] value: &str, #[case] expected: &str) {
        assert_eq!(quote(value), expected);
    }

    #[test]
    fn test_rewrite_keeps_surrounding_bytes() {
        let source = "\
#[test]
fn second() {
    // upper-case the input
    expect(\"SECOND\",   upper,  \"wrong\" ); // trailing
}
";
        insta::assert_snapshot!(rewrite(source, 4, "SECOND"), @r###"
        #[test]
        fn second() {
            // upper-case the input
            expect("SECOND",   upper,  "SECOND" ); // trailing
        }
        "###);
    }

    #[test]
    fn test_rewrite_replaces_multiline_raw_string() {
        let source = "expect(x, f, r#\"\nold\nvalue\n\"#);\nexpect(y, f, \"z\");\n";
        let rewritten = rewrite(source, 1, "new\nvalue");

        assert_eq!(rewritten, "expect(x, f, \"new\\nvalue\");\nexpect(y, f, \"z\");\n");
    }

    #[test]
    fn test_line_delta() {
        let source = "expect(x, f, r#\"\na\nb\n\"#);";
        let doc = SourceDocument::parse("/t.rs", source.to_string()).unwrap();
        let site = CallSite::new("/t.rs", 1, 1);
        let targets = find_rewrite_targets(&doc, &site, "expect", Disambiguation::Column).unwrap();

        let edit = Edit::replace(&targets[0], "a\nb");
        assert_eq!(edit.start, Position::new(0, 13));
        assert_eq!(edit.end, Position::new(3, 2));
        assert_eq!(edit.line_delta(source), -3);
    }

    #[test]
    fn test_overlapping_edits_are_rejected() {
        let edits = [
            Edit {
                range: 0..4,
                replacement: "\"a\"".to_string(),
                start: Position::default(),
                end: Position::default(),
            },
            Edit {
                range: 2..6,
                replacement: "\"b\"".to_string(),
                start: Position::default(),
                end: Position::default(),
            },
        ];
        let result = apply_edits(Path::new("/t.rs"), "0123456789", &edits);

        assert_eq!(
            result,
            Err(RewriteError::OverlappingEdits {
                path: "/t.rs".into()
            })
        );
    }

    #[test]
    fn test_identical_edits_collapse() {
        let edit = Edit {
            range: 1..3,
            replacement: "\"x\"".to_string(),
            start: Position::new(0, 1),
            end: Position::new(0, 3),
        };
        let result = apply_edits(Path::new("/t.rs"), "a\"\"b", &[edit.clone(), edit]);
        assert_eq!(result.unwrap(), "a\"x\"b");
    }

    #[test]
    fn test_edits_apply_in_any_order() {
        let edits = [
            Edit {
                range: 0..1,
                replacement: "A".to_string(),
                start: Position::default(),
                end: Position::default(),
            },
            Edit {
                range: 4..5,
                replacement: "EEE".to_string(),
                start: Position::default(),
                end: Position::default(),
            },
        ];
        let result = apply_edits(Path::new("/t.rs"), "abcde", &edits);
        assert_eq!(result.unwrap(), "AbcdEEE");
    }

    fn shift(start: (usize, usize), end: (usize, usize), replacement: &str) -> Shift {
        Edit {
            range: 0..0,
            replacement: replacement.to_string(),
            start: Position::new(start.0, start.1),
            end: Position::new(end.0, end.1),
        }
        .shift()
    }

    #[test]
    fn test_translate_after_multiline_literal() {
        // r#"..."# on lines 3-5 (1-based) collapsed into one line
        let shifts = [shift((2, 10), (4, 2), "\"ab\"")];

        assert_eq!(translate(&shifts, 1, 5), (1, 5));
        assert_eq!(translate(&shifts, 3, 1), (3, 1));
        assert_eq!(translate(&shifts, 8, 5), (6, 5));
        // code after the literal on its closing line
        assert_eq!(translate(&shifts, 5, 5), (3, 17));
    }

    #[test]
    fn test_translate_on_the_same_line() {
        // "old-left" (10 chars) replaced by "LEFT" (6 chars)
        let shifts = [shift((0, 30), (0, 40), "\"LEFT\"")];

        assert_eq!(translate(&shifts, 1, 10), (1, 10));
        assert_eq!(translate(&shifts, 1, 44), (1, 40));
        assert_eq!(translate(&shifts, 2, 44), (2, 44));
    }

    #[test]
    fn test_translate_composes_in_order() {
        let shifts = [
            shift((0, 0), (2, 1), "\"\""),
            // recorded after the first shift moved everything up two lines
            shift((0, 10), (0, 13), "\"long value\""),
        ];

        assert_eq!(translate(&shifts, 3, 20), (1, 30));
        assert_eq!(translate(&shifts, 4, 1), (2, 1));
        assert_eq!(translate(&[], 12, 3), (12, 3));
    }

    proptest! {
        #[test]
        fn quoted_values_are_single_line(value in ".*") {
            prop_assert!(!quote(&value).contains('\n'));
        }
    }
}
