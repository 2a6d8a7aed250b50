//! Token trees
//!
//! The first parsing stage only balances delimiters: `(`, `[` and `{` groups
//! nest, every other token is a leaf. Anything finer (calls, argument lists)
//! is recognized later on top of the trees, which keeps this grammar small
//! enough to express as a handful of chumsky combinators.

use chumsky::prelude::*;
use std::fmt;
use std::ops::Range;

use super::lexer::TokenSpan;
use super::tokens::Token;

/// Type alias for parser error
type ParserError = Simple<TokenSpan>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Delimiter {
    Paren,
    Bracket,
    Brace,
}

impl Delimiter {
    fn tokens(self) -> (Token, Token) {
        match self {
            Delimiter::Paren => (Token::OpenParen, Token::CloseParen),
            Delimiter::Bracket => (Token::OpenBracket, Token::CloseBracket),
            Delimiter::Brace => (Token::OpenBrace, Token::CloseBrace),
        }
    }
}

/// A leaf token or a delimited group of trees
#[derive(Debug, Clone, PartialEq)]
pub enum TokenTree {
    Leaf(Token, Range<usize>),
    Group {
        delimiter: Delimiter,
        /// Byte span including both delimiters
        span: Range<usize>,
        children: Vec<TokenTree>,
    },
}

impl TokenTree {
    pub fn span(&self) -> Range<usize> {
        match self {
            TokenTree::Leaf(_, span) => span.clone(),
            TokenTree::Group { span, .. } => span.clone(),
        }
    }

    pub fn token(&self) -> Option<Token> {
        match self {
            TokenTree::Leaf(token, _) => Some(*token),
            TokenTree::Group { .. } => None,
        }
    }

    pub fn is_token(&self, expected: Token) -> bool {
        self.token() == Some(expected)
    }
}

/// Unbalanced or otherwise unparseable token stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeError {
    pub message: String,
    /// Byte offset of the offending token, end of input when absent
    pub offset: usize,
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.message, self.offset)
    }
}

impl std::error::Error for TreeError {}

/// Parse a single token of the given kind, yielding its byte span
fn token(t: Token) -> impl Parser<TokenSpan, Range<usize>, Error = ParserError> + Clone {
    filter(move |(tok, _): &TokenSpan| *tok == t).map(|(_, span)| span)
}

fn group<P>(
    tree: P,
    delimiter: Delimiter,
) -> impl Parser<TokenSpan, TokenTree, Error = ParserError> + Clone
where
    P: Parser<TokenSpan, TokenTree, Error = ParserError> + Clone,
{
    let (open, close) = delimiter.tokens();
    token(open)
        .then(tree.repeated())
        .then(token(close))
        .map(move |((open, children), close)| TokenTree::Group {
            delimiter,
            span: open.start..close.end,
            children,
        })
}

fn token_trees() -> impl Parser<TokenSpan, Vec<TokenTree>, Error = ParserError> + Clone {
    let tree = recursive(|tree| {
        let leaf = filter(|(t, _): &TokenSpan| !t.is_delimiter())
            .map(|(token, span)| TokenTree::Leaf(token, span));

        choice((
            group(tree.clone(), Delimiter::Paren),
            group(tree.clone(), Delimiter::Bracket),
            group(tree, Delimiter::Brace),
            leaf,
        ))
    });

    tree.repeated().then_ignore(end())
}

/// Parse a token stream into balanced token trees
pub fn parse_trees(tokens: Vec<TokenSpan>, source_len: usize) -> Result<Vec<TokenTree>, TreeError> {
    let spans: Vec<Range<usize>> = tokens.iter().map(|(_, span)| span.clone()).collect();

    token_trees().parse(tokens).map_err(|errors| {
        let error = &errors[0];
        let offset = error
            .found()
            .map(|(_, span)| span.start)
            .or_else(|| spans.get(error.span().start).map(|span| span.start))
            .unwrap_or(source_len);
        let message = match error.found() {
            Some((found, _)) if found.is_open_delimiter() => "unclosed delimiter".to_string(),
            Some((found, _)) if found.is_close_delimiter() => {
                format!("unexpected closing delimiter {:?}", found)
            }
            Some((found, _)) => format!("unexpected token {:?}", found),
            None => "unclosed delimiter".to_string(),
        };
        TreeError { message, offset }
    })
}
