//! Implementation of the Rust source lexer
//!
//! Tokenization is handled entirely by logos. This module only collects the
//! results: comments are dropped and unmatched input becomes [`Token::Unknown`]
//! so that every byte of the source is either trivia or covered by a token.

use super::tokens::Token;
use logos::Logos;
use std::ops::Range;

/// Type alias for token with its byte span
pub type TokenSpan = (Token, Range<usize>);

/// Convenience function to tokenize a string and collect all significant tokens
pub fn tokenize(source: &str) -> Vec<Token> {
    tokenize_with_spans(source)
        .into_iter()
        .map(|(token, _)| token)
        .collect()
}

/// Tokenize a string and collect significant tokens with their byte spans
pub fn tokenize_with_spans(source: &str) -> Vec<TokenSpan> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let token = result.unwrap_or(Token::Unknown);
        if !token.is_trivia() {
            tokens.push((token, lexer.span()));
        }
    }

    tokens
}
