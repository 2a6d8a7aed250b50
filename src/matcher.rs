//! Finding the asserting call in a parsed document
//!
//! A candidate is an identifier with the callee's name that starts on the
//! call site's line and is the name of a call expression. The literal to
//! rewrite is the last argument of that call.

use crate::config::Disambiguation;
use crate::error::RewriteError;
use crate::locate::CallSite;
use crate::syntax::{Range, SourceDocument, SyntaxKind, SyntaxNode};

/// A call whose name matched, before its last argument is checked
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'d> {
    pub name: &'d SyntaxNode,
    pub call: &'d SyntaxNode,
}

impl<'d> Candidate<'d> {
    /// Last non-comma argument of the call, if it has any
    pub fn last_argument(&self) -> Option<&'d SyntaxNode> {
        self.call
            .last_child_of_kind(SyntaxKind::ArgumentList)?
            .last_child(|node| node.kind() != SyntaxKind::Comma)
    }
}

/// The literal of a matched call that a rewrite will replace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetArgument {
    pub kind: SyntaxKind,
    pub range: Range,
    /// Range of the callee name, used for column disambiguation
    pub name: Range,
}

/// Calls named `callee` whose name starts on `line` (1-based), lazily
pub fn candidates<'d>(
    document: &'d SourceDocument,
    line: usize,
    callee: &'d str,
) -> impl Iterator<Item = Candidate<'d>> + 'd {
    document.descendants().filter_map(move |(node, parent)| {
        if node.kind() != SyntaxKind::Identifier || document.text(node) != callee {
            return None;
        }

        let start = node.range().start;
        if start.display_line() != line {
            tracing::debug!(
                callee,
                found_line = start.display_line(),
                line,
                "skipping identifier on another line"
            );
            return None;
        }

        if parent.kind() != SyntaxKind::CallExpression {
            tracing::debug!(
                callee,
                line,
                parent = %parent.kind(),
                "skipping identifier that is not a call"
            );
            return None;
        }

        Some(Candidate { name: node, call: parent })
    })
}

fn validate(candidate: &Candidate<'_>, callee: &str, line: usize) -> Result<TargetArgument, RewriteError> {
    let argument = candidate.last_argument();
    match argument {
        Some(node) if node.kind().is_rewritable_literal() => Ok(TargetArgument {
            kind: node.kind(),
            range: node.range().clone(),
            name: candidate.name.range().clone(),
        }),
        _ => Err(RewriteError::NotRewritable {
            callee: callee.to_string(),
            line,
            kind: argument.map(SyntaxNode::kind),
        }),
    }
}

/// Literals to rewrite for the assertion at `site`.
///
/// Fails if a selected call's last argument is not a string literal, or if
/// no call is selected at all.
pub fn find_rewrite_targets(
    document: &SourceDocument,
    site: &CallSite,
    callee: &str,
    disambiguation: Disambiguation,
) -> Result<Vec<TargetArgument>, RewriteError> {
    let mut found = candidates(document, site.line, callee);

    let targets: Vec<TargetArgument> = match disambiguation {
        Disambiguation::Column => found
            .find(|candidate| candidate.name.range().start.display_column() >= site.column)
            .map(|candidate| validate(&candidate, callee, site.line))
            .transpose()?
            .into_iter()
            .collect(),
        Disambiguation::Line => found
            .map(|candidate| validate(&candidate, callee, site.line))
            .collect::<Result<Vec<_>, _>>()?,
    };

    if targets.is_empty() {
        return Err(RewriteError::NoCallFound {
            callee: callee.to_string(),
            path: document.path().to_path_buf(),
            line: site.line,
            column: site.column,
        });
    }

    Ok(targets)
}
