//! Syntax layer for Rust source files
//!
//! Parsing runs in three stages:
//!
//!     1. Tokenization with logos. See [tokens] and [lexer]. Comments are
//!        dropped here, so text inside them can never be mistaken for a call.
//!
//!     2. Token trees with chumsky. See [tree]. Delimiters are balanced and
//!        nothing else is interpreted. Unbalanced input is a parse error.
//!
//!     3. The concrete syntax tree. See [node]. Calls, argument lists and
//!        argument shapes are recognized on top of the token trees.
//!
//! Every node carries a byte span and line:column positions, so a rewrite
//! can replace exactly the bytes of one literal and leave the rest of the
//! file untouched.

pub mod lexer;
pub mod node;
pub mod span;
pub mod tokens;
pub mod tree;

use std::path::{Path, PathBuf};

pub use node::{Descendants, SyntaxKind, SyntaxNode};
pub use span::{Position, Range, SourceLocation};
pub use tokens::Token;
pub use tree::TreeError;

/// Parse source text into a syntax tree rooted at a `SourceFile` node
pub fn parse_source(source: &str) -> Result<SyntaxNode, TreeError> {
    let tokens = lexer::tokenize_with_spans(source);
    let trees = tree::parse_trees(tokens, source.len())?;
    Ok(node::TreeBuilder::new(source).build_file(&trees))
}

/// One parsed file: its path, its text and the tree over that text
#[derive(Debug, Clone)]
pub struct SourceDocument {
    path: PathBuf,
    source: String,
    root: SyntaxNode,
}

impl SourceDocument {
    pub fn parse(path: impl Into<PathBuf>, source: String) -> Result<Self, TreeError> {
        let root = parse_source(&source)?;
        Ok(Self {
            path: path.into(),
            source,
            root,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn text(&self, node: &SyntaxNode) -> &str {
        node.text(&self.source)
    }

    pub fn descendants(&self) -> Descendants<'_> {
        self.root.descendants()
    }
}
