//! Token definitions for Rust source text
//!
//! Only the distinctions the call matcher needs are kept: identifiers, every
//! literal flavour, delimiters, commas and the punctuation that builds paths,
//! macro calls and closures. Everything else collapses into `Punct`.
//! Comments are tokens too so that their contents never leak into the tree;
//! [`tokenize_with_spans`](super::lexer::tokenize_with_spans) drops them.
use logos::{Lexer, Logos};

/// All tokens produced by the Rust source lexer
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // Trivia
    #[regex(r"//[^\n]*")]
    LineComment,
    #[token("/*", block_comment)]
    BlockComment,

    // Names
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,
    #[regex(r"r#[A-Za-z_][A-Za-z0-9_]*")]
    RawIdentifier,
    #[regex(r"'[A-Za-z_][A-Za-z0-9_]*")]
    Lifetime,

    // Literals
    #[regex(r#""([^"\\]|\\(.|\n))*""#)]
    String,
    #[regex(r##"r#*""##, raw_string)]
    RawString,
    #[regex(r#"[bc]"([^"\\]|\\(.|\n))*""#)]
    #[regex(r##"[bc]r#*""##, raw_string)]
    ByteString,
    #[regex(r"b?'([^'\\\n]|\\[^\n]|\\x[0-9a-fA-F][0-9a-fA-F]|\\u\{[0-9a-fA-F_]+\})'")]
    Char,
    #[regex(r"[0-9][0-9_]*(\.[0-9][0-9_]*)?([eE][+-]?[0-9][0-9_]*)?([A-Za-z_][A-Za-z0-9_]*)?")]
    Number,

    // Delimiters
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,
    #[token("[")]
    OpenBracket,
    #[token("]")]
    CloseBracket,
    #[token("{")]
    OpenBrace,
    #[token("}")]
    CloseBrace,

    // Punctuation the tree builder looks at
    #[token(",")]
    Comma,
    #[token("::")]
    PathSep,
    #[token("!")]
    Bang,
    #[token(".")]
    Dot,
    #[token("|")]
    Pipe,
    #[token("||")]
    OrOr,
    #[token(";")]
    Semicolon,
    #[regex(r"[=<>+\-*/%^&@$~?#:]|!=|==|<=|>=|=>|->|&&|\.\.|\.\.=|\.\.\.")]
    Punct,

    /// Anything logos could not match (non-ASCII identifiers, stray quotes)
    Unknown,
}

impl Token {
    pub fn is_trivia(&self) -> bool {
        matches!(self, Token::LineComment | Token::BlockComment)
    }

    pub fn is_open_delimiter(&self) -> bool {
        matches!(
            self,
            Token::OpenParen | Token::OpenBracket | Token::OpenBrace
        )
    }

    pub fn is_close_delimiter(&self) -> bool {
        matches!(
            self,
            Token::CloseParen | Token::CloseBracket | Token::CloseBrace
        )
    }

    pub fn is_delimiter(&self) -> bool {
        self.is_open_delimiter() || self.is_close_delimiter()
    }

    pub fn is_name(&self) -> bool {
        matches!(self, Token::Identifier | Token::RawIdentifier)
    }
}

/// Consume a (possibly nested) block comment after its opening `/*`
fn block_comment(lex: &mut Lexer<Token>) -> bool {
    let bytes = lex.remainder().as_bytes();
    let mut depth = 1usize;
    let mut i = 0;

    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1)) {
            (b'/', Some(b'*')) => {
                depth += 1;
                i += 2;
            }
            (b'*', Some(b'/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    lex.bump(i);
                    return true;
                }
            }
            _ => i += 1,
        }
    }

    false
}

/// Consume a raw string body up to the quote followed by the same number of hashes
fn raw_string(lex: &mut Lexer<Token>) -> bool {
    let hashes = lex.slice().bytes().filter(|b| *b == b'#').count();
    let terminator = format!("\"{}", "#".repeat(hashes));

    match lex.remainder().find(&terminator) {
        Some(end) => {
            lex.bump(end + terminator.len());
            true
        }
        None => false,
    }
}
