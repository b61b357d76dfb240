//! Parser for reconstructed Java source.
//!
//! Decompiler output is well formed but stylistically narrow, and this
//! parser is scoped to that dialect: declarations, statements, and
//! expressions as the common engines emit them. Parsing is all or
//! nothing. Any error aborts the parse and the caller renders the
//! document without hyperlinks instead.
//!
//! Spans are 1-based line/column pairs as produced by the lexer, with
//! exclusive end columns.

#![forbid(unsafe_code)]

pub mod ast;
mod lexer;
mod parser;

pub use parser::ParseError;

/// Parses one reconstructed compilation unit.
pub fn parse(text: &str) -> Result<ast::CompilationUnit, ParseError> {
    let tokens = lexer::lex(text);
    parser::Parser::new(tokens).parse_compilation_unit()
}
