//! Tokenizer for the scripting language, built on logos.
//!
//! Newlines are tokens because they separate statements. Other whitespace and
//! `#` / `//` comments are skipped.

use crate::utils::error::ScriptError;
use logos::Logos;
use std::fmt;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("if")]
    If,
    #[token("else")]
    Else,

    #[token("=")]
    Assign,
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token("..")]
    DotDot,
    #[token("\n")]
    Newline,

    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::For => "for",
            Token::In => "in",
            Token::If => "if",
            Token::Else => "else",
            Token::Assign => "=",
            Token::Eq => "==",
            Token::Ne => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Comma => ",",
            Token::Semi => ";",
            Token::DotDot => "..",
            Token::Newline => "newline",
            Token::Number(n) => return write!(f, "{}", n),
            Token::Ident(name) => return write!(f, "{}", name),
        };
        f.write_str(text)
    }
}

/// A token with the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub line: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Lexeme>, ScriptError> {
    let mut lexer = Token::lexer(source);
    let mut lexemes = Vec::new();
    let mut line = 1;

    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => {
                let is_newline = token == Token::Newline;
                lexemes.push(Lexeme { token, line });
                if is_newline {
                    line += 1;
                }
            }
            Err(()) => {
                return Err(ScriptError::Lex {
                    line,
                    text: lexer.slice().to_string(),
                })
            }
        }
    }

    Ok(lexemes)
}
