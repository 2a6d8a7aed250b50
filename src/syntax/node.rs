//! Concrete syntax tree for Rust source
//!
//! Built on top of token trees. The tree is deliberately shallow: it knows
//! about call expressions (`path(args)`, `name!(args)`, `.method(args)`),
//! their argument lists and the shape of each argument, and treats every
//! other group as an opaque sequence of nodes. That is all the call matcher
//! needs, and it never has to understand statements or types.
//!
//! Every node keeps its [`Range`], so text is recovered by slicing the
//! source rather than stored in the tree.

use std::fmt;

use super::span::{Range, SourceLocation};
use super::tokens::Token;
use super::tree::{Delimiter, TokenTree};

/// Keywords that may be followed by a parenthesized group without forming a call
const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
    "pub", "ref", "return", "static", "struct", "trait", "type", "unsafe", "use", "where",
    "while", "yield",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    SourceFile,
    Identifier,
    CallExpression,
    ArgumentList,
    ClosureExpression,
    Expression,
    ParenGroup,
    BracketGroup,
    BraceGroup,
    StringLiteral,
    RawStringLiteral,
    ByteStringLiteral,
    CharLiteral,
    NumericLiteral,
    Lifetime,
    Comma,
    PathSeparator,
    Bang,
    Dot,
    Pipe,
    Punctuation,
    Unknown,
}

impl SyntaxKind {
    pub fn name(self) -> &'static str {
        match self {
            SyntaxKind::SourceFile => "source file",
            SyntaxKind::Identifier => "identifier",
            SyntaxKind::CallExpression => "call expression",
            SyntaxKind::ArgumentList => "argument list",
            SyntaxKind::ClosureExpression => "closure expression",
            SyntaxKind::Expression => "expression",
            SyntaxKind::ParenGroup => "parenthesized group",
            SyntaxKind::BracketGroup => "bracketed group",
            SyntaxKind::BraceGroup => "block",
            SyntaxKind::StringLiteral => "string literal",
            SyntaxKind::RawStringLiteral => "raw string literal",
            SyntaxKind::ByteStringLiteral => "byte string literal",
            SyntaxKind::CharLiteral => "char literal",
            SyntaxKind::NumericLiteral => "numeric literal",
            SyntaxKind::Lifetime => "lifetime",
            SyntaxKind::Comma => "comma",
            SyntaxKind::PathSeparator => "path separator",
            SyntaxKind::Bang => "bang",
            SyntaxKind::Dot => "dot",
            SyntaxKind::Pipe => "pipe",
            SyntaxKind::Punctuation => "punctuation",
            SyntaxKind::Unknown => "unknown token",
        }
    }

    /// String literal kinds whose text can be replaced by a quoted `&str`
    pub fn is_rewritable_literal(self) -> bool {
        matches!(self, SyntaxKind::StringLiteral | SyntaxKind::RawStringLiteral)
    }

    fn from_token(token: Token) -> Self {
        match token {
            Token::Identifier | Token::RawIdentifier => SyntaxKind::Identifier,
            Token::Lifetime => SyntaxKind::Lifetime,
            Token::String => SyntaxKind::StringLiteral,
            Token::RawString => SyntaxKind::RawStringLiteral,
            Token::ByteString => SyntaxKind::ByteStringLiteral,
            Token::Char => SyntaxKind::CharLiteral,
            Token::Number => SyntaxKind::NumericLiteral,
            Token::Comma => SyntaxKind::Comma,
            Token::PathSep => SyntaxKind::PathSeparator,
            Token::Bang => SyntaxKind::Bang,
            Token::Dot => SyntaxKind::Dot,
            Token::Pipe | Token::OrOr => SyntaxKind::Pipe,
            Token::Semicolon | Token::Punct => SyntaxKind::Punctuation,
            // Delimiters and trivia never reach the tree as leaves
            Token::OpenParen
            | Token::CloseParen
            | Token::OpenBracket
            | Token::CloseBracket
            | Token::OpenBrace
            | Token::CloseBrace
            | Token::LineComment
            | Token::BlockComment
            | Token::Unknown => SyntaxKind::Unknown,
        }
    }
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    kind: SyntaxKind,
    range: Range,
    children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    fn new(kind: SyntaxKind, range: Range, children: Vec<SyntaxNode>) -> Self {
        Self {
            kind,
            range,
            children,
        }
    }

    pub fn kind(&self) -> SyntaxKind {
        self.kind
    }

    pub fn range(&self) -> &Range {
        &self.range
    }

    pub fn children(&self) -> &[SyntaxNode] {
        &self.children
    }

    /// The source text this node spans
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        source.get(self.range.span.clone()).unwrap_or("")
    }

    /// Last child of the given kind
    pub fn last_child_of_kind(&self, kind: SyntaxKind) -> Option<&SyntaxNode> {
        self.children.iter().rev().find(|child| child.kind == kind)
    }

    /// Last child matching the predicate
    pub fn last_child<P>(&self, predicate: P) -> Option<&SyntaxNode>
    where
        P: Fn(&SyntaxNode) -> bool,
    {
        self.children.iter().rev().find(|child| predicate(child))
    }

    /// All nodes below this one in document order, each paired with its parent
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack = Vec::with_capacity(self.children.len());
        stack.extend(self.children.iter().rev().map(|child| (child, self)));
        Descendants { stack }
    }
}

/// Depth-first, document-order walk over a subtree
pub struct Descendants<'a> {
    stack: Vec<(&'a SyntaxNode, &'a SyntaxNode)>,
}

impl<'a> Iterator for Descendants<'a> {
    /// `(node, parent)`
    type Item = (&'a SyntaxNode, &'a SyntaxNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, parent) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|child| (child, node)));
        Some((node, parent))
    }
}

/// Builds syntax nodes from token trees
pub(crate) struct TreeBuilder<'s> {
    source: &'s str,
    location: SourceLocation<'s>,
}

impl<'s> TreeBuilder<'s> {
    pub(crate) fn new(source: &'s str) -> Self {
        Self {
            source,
            location: SourceLocation::new(source),
        }
    }

    pub(crate) fn build_file(&self, trees: &[TokenTree]) -> SyntaxNode {
        let children = self.build_sequence(trees);
        let range = self.location.byte_range_to_range(&(0..self.source.len()));
        SyntaxNode::new(SyntaxKind::SourceFile, range, children)
    }

    fn leaf(&self, token: Token, span: &std::ops::Range<usize>) -> SyntaxNode {
        SyntaxNode::new(
            SyntaxKind::from_token(token),
            self.location.byte_range_to_range(span),
            Vec::new(),
        )
    }

    fn text(&self, tree: &TokenTree) -> &'s str {
        self.source.get(tree.span()).unwrap_or("")
    }

    fn is_callee_name(&self, tree: &TokenTree) -> bool {
        match tree.token() {
            Some(token) if token.is_name() => {
                token == Token::RawIdentifier || !KEYWORDS.contains(&self.text(tree))
            }
            _ => false,
        }
    }

    fn is_punct(&self, tree: &TokenTree, text: &str) -> bool {
        tree.is_token(Token::Punct) && self.text(tree) == text
    }

    /// Length of a `::<...>` generic argument run at the start of `trees`.
    /// Angle brackets are not delimiters, so they are counted here.
    fn turbofish_length(&self, trees: &[TokenTree]) -> Option<usize> {
        if !trees.first()?.is_token(Token::PathSep) || !self.is_punct(trees.get(1)?, "<") {
            return None;
        }

        let mut depth = 0usize;
        for (i, tree) in trees.iter().enumerate().skip(1) {
            if self.is_punct(tree, "<") {
                depth += 1;
            } else if self.is_punct(tree, ">") {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            } else if tree.is_token(Token::Semicolon) {
                return None;
            }
        }
        None
    }

    /// Length of the call starting at `trees[0]`, if one starts there.
    ///
    /// A call is `name (:: name | ::<generics>)* !? group`, where the group
    /// must be parenthesized unless the `!` marks a macro invocation.
    fn call_length(&self, trees: &[TokenTree]) -> Option<usize> {
        if !self.is_callee_name(trees.first()?) {
            return None;
        }

        let mut i = 1;
        loop {
            if let Some(len) = self.turbofish_length(&trees[i..]) {
                i += len;
            } else if i + 1 < trees.len()
                && trees[i].is_token(Token::PathSep)
                && self.is_callee_name(&trees[i + 1])
            {
                i += 2;
            } else {
                break;
            }
        }

        let is_macro = trees.get(i).is_some_and(|tree| tree.is_token(Token::Bang));
        if is_macro {
            i += 1;
        }

        match trees.get(i)? {
            TokenTree::Group { delimiter, .. } if is_macro || *delimiter == Delimiter::Paren => {
                Some(i + 1)
            }
            _ => None,
        }
    }

    fn build_sequence(&self, trees: &[TokenTree]) -> Vec<SyntaxNode> {
        let mut nodes = Vec::with_capacity(trees.len());
        let mut i = 0;

        while i < trees.len() {
            let after_fn = i > 0 && trees[i - 1].is_token(Token::Identifier) && self.text(&trees[i - 1]) == "fn";
            if !after_fn {
                if let Some(len) = self.call_length(&trees[i..]) {
                    nodes.push(self.build_call(&trees[i..i + len]));
                    i += len;
                    continue;
                }
            }

            nodes.push(self.build_tree(&trees[i]));
            i += 1;
        }

        nodes
    }

    fn build_tree(&self, tree: &TokenTree) -> SyntaxNode {
        match tree {
            TokenTree::Leaf(token, span) => self.leaf(*token, span),
            TokenTree::Group {
                delimiter,
                span,
                children,
            } => {
                let kind = match delimiter {
                    Delimiter::Paren => SyntaxKind::ParenGroup,
                    Delimiter::Bracket => SyntaxKind::BracketGroup,
                    Delimiter::Brace => SyntaxKind::BraceGroup,
                };
                SyntaxNode::new(
                    kind,
                    self.location.byte_range_to_range(span),
                    self.build_sequence(children),
                )
            }
        }
    }

    /// `trees` is the callee path, an optional `!` and the argument group
    fn build_call(&self, trees: &[TokenTree]) -> SyntaxNode {
        let (group, path) = match trees.split_last() {
            Some(split) => split,
            None => return SyntaxNode::new(SyntaxKind::Unknown, Range::default(), Vec::new()),
        };

        let mut children: Vec<SyntaxNode> = path.iter().map(|tree| self.build_tree(tree)).collect();
        children.push(self.build_arguments(group));

        let start = trees[0].span().start;
        let end = group.span().end;
        SyntaxNode::new(
            SyntaxKind::CallExpression,
            self.location.byte_range_to_range(&(start..end)),
            children,
        )
    }

    fn build_arguments(&self, group: &TokenTree) -> SyntaxNode {
        let inner: &[TokenTree] = match group {
            TokenTree::Group { children, .. } => children,
            TokenTree::Leaf(..) => &[],
        };

        let mut children = Vec::new();
        for segment in inner.split_inclusive(|tree| tree.is_token(Token::Comma)) {
            let (comma, argument) = match segment.split_last() {
                Some((last, rest)) if last.is_token(Token::Comma) => (Some(last), rest),
                _ => (None, segment),
            };

            if !argument.is_empty() {
                children.push(self.build_argument(argument));
            }
            if let Some(comma) = comma {
                children.push(self.build_tree(comma));
            }
        }

        SyntaxNode::new(
            SyntaxKind::ArgumentList,
            self.location.byte_range_to_range(&group.span()),
            children,
        )
    }

    /// One argument: a lone node keeps its own kind, longer runs get wrapped
    fn build_argument(&self, trees: &[TokenTree]) -> SyntaxNode {
        let mut nodes = self.build_sequence(trees);
        if nodes.len() == 1 {
            return nodes.remove(0);
        }

        let is_closure = match trees.first() {
            Some(first) if first.is_token(Token::Pipe) || first.is_token(Token::OrOr) => true,
            Some(first) => {
                first.is_token(Token::Identifier)
                    && self.text(first) == "move"
                    && trees
                        .get(1)
                        .is_some_and(|next| next.is_token(Token::Pipe) || next.is_token(Token::OrOr))
            }
            None => false,
        };
        let kind = if is_closure {
            SyntaxKind::ClosureExpression
        } else {
            SyntaxKind::Expression
        };

        let range = Range::bounding_box(nodes.iter().map(|node| &node.range)).unwrap_or_default();
        SyntaxNode::new(kind, range, nodes)
    }
}
