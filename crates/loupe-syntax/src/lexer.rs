use loupe_core::{SourcePos, SourceSpan};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) text: String,
    pub(crate) span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident,
    Number,
    Str,
    Char,
    At,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    Question,
    Colon,
    ColonColon,
    Arrow,
    Eq,
    EqEq,
    Bang,
    BangEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    PlusPlus,
    PlusEq,
    Minus,
    MinusMinus,
    MinusEq,
    Star,
    StarEq,
    Slash,
    SlashEq,
    Percent,
    PercentEq,
    Amp,
    AmpAmp,
    AmpEq,
    Pipe,
    PipePipe,
    PipeEq,
    Caret,
    CaretEq,
    Tilde,
    Unknown,
}

pub(crate) fn lex(text: &str) -> Vec<Token> {
    Lexer::new(text).collect()
}

/// Produces tokens tagged with 1-based (line, column) spans, end exclusive.
///
/// `<` and `>` are always single tokens so the parser can balance generic
/// argument lists; shift operators are reassembled from adjacent tokens at
/// parse time.
struct Lexer<'a> {
    text: &'a str,
    pos: usize,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_char2(&self) -> Option<char> {
        let mut chars = self.remaining().chars();
        chars.next();
        chars.next()
    }

    fn bump_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn here(&self) -> SourcePos {
        SourcePos::new(self.line, self.col)
    }

    fn eat_char(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.bump_char();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
                self.bump_char();
            }

            let rem = self.remaining();
            if rem.starts_with("//") {
                while let Some(c) = self.bump_char() {
                    if c == '\n' {
                        break;
                    }
                }
                continue;
            }

            if rem.starts_with("/*") {
                self.bump_char();
                self.bump_char();
                while !self.remaining().is_empty() && !self.remaining().starts_with("*/") {
                    self.bump_char();
                }
                if self.remaining().starts_with("*/") {
                    self.bump_char();
                    self.bump_char();
                }
                continue;
            }

            break;
        }
    }

    fn lex_identifier(&mut self, first: char) -> String {
        let mut out = String::new();
        out.push(first);
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                out.push(c);
                self.bump_char();
            } else {
                break;
            }
        }
        out
    }

    fn lex_number(&mut self, first: char) -> String {
        let mut out = String::new();
        out.push(first);

        if first == '0' && matches!(self.peek_char(), Some('x' | 'X' | 'b' | 'B')) {
            out.push(self.bump_char().unwrap_or_default());
            while let Some(c) = self.peek_char() {
                if c.is_ascii_hexdigit() || c == '_' {
                    out.push(c);
                    self.bump_char();
                } else {
                    break;
                }
            }
        } else {
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() || c == '_' {
                    out.push(c);
                    self.bump_char();
                } else {
                    break;
                }
            }
            if self.peek_char() == Some('.')
                && self.peek_char2().is_some_and(|c| c.is_ascii_digit())
            {
                out.push(self.bump_char().unwrap_or_default());
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_digit() || c == '_' {
                        out.push(c);
                        self.bump_char();
                    } else {
                        break;
                    }
                }
            }
            if matches!(self.peek_char(), Some('e' | 'E')) {
                out.push(self.bump_char().unwrap_or_default());
                if matches!(self.peek_char(), Some('+' | '-')) {
                    out.push(self.bump_char().unwrap_or_default());
                }
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_digit() {
                        out.push(c);
                        self.bump_char();
                    } else {
                        break;
                    }
                }
            }
        }

        if matches!(self.peek_char(), Some('l' | 'L' | 'f' | 'F' | 'd' | 'D')) {
            out.push(self.bump_char().unwrap_or_default());
        }
        out
    }

    fn lex_quoted(&mut self, quote: char) -> String {
        let mut out = String::new();
        out.push(quote);
        while let Some(c) = self.bump_char() {
            out.push(c);
            if c == quote {
                break;
            }
            if c == '\\' {
                if let Some(escaped) = self.bump_char() {
                    out.push(escaped);
                }
            }
        }
        out
    }

    fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace_and_comments();
        if self.remaining().is_empty() {
            return None;
        }

        let start = self.here();
        let ch = self.bump_char()?;

        let (kind, text) = match ch {
            '{' => (TokenKind::LBrace, "{".to_string()),
            '}' => (TokenKind::RBrace, "}".to_string()),
            '(' => (TokenKind::LParen, "(".to_string()),
            ')' => (TokenKind::RParen, ")".to_string()),
            '[' => (TokenKind::LBracket, "[".to_string()),
            ']' => (TokenKind::RBracket, "]".to_string()),
            ';' => (TokenKind::Semi, ";".to_string()),
            ',' => (TokenKind::Comma, ",".to_string()),
            '.' => (TokenKind::Dot, ".".to_string()),
            '@' => (TokenKind::At, "@".to_string()),
            '?' => (TokenKind::Question, "?".to_string()),
            '~' => (TokenKind::Tilde, "~".to_string()),
            ':' => {
                if self.eat_char(':') {
                    (TokenKind::ColonColon, "::".to_string())
                } else {
                    (TokenKind::Colon, ":".to_string())
                }
            }
            '=' => {
                if self.eat_char('=') {
                    (TokenKind::EqEq, "==".to_string())
                } else {
                    (TokenKind::Eq, "=".to_string())
                }
            }
            '!' => {
                if self.eat_char('=') {
                    (TokenKind::BangEq, "!=".to_string())
                } else {
                    (TokenKind::Bang, "!".to_string())
                }
            }
            '<' => {
                if self.eat_char('=') {
                    (TokenKind::LtEq, "<=".to_string())
                } else {
                    (TokenKind::Lt, "<".to_string())
                }
            }
            '>' => {
                if self.eat_char('=') {
                    (TokenKind::GtEq, ">=".to_string())
                } else {
                    (TokenKind::Gt, ">".to_string())
                }
            }
            '+' => {
                if self.eat_char('+') {
                    (TokenKind::PlusPlus, "++".to_string())
                } else if self.eat_char('=') {
                    (TokenKind::PlusEq, "+=".to_string())
                } else {
                    (TokenKind::Plus, "+".to_string())
                }
            }
            '-' => {
                if self.eat_char('-') {
                    (TokenKind::MinusMinus, "--".to_string())
                } else if self.eat_char('=') {
                    (TokenKind::MinusEq, "-=".to_string())
                } else if self.eat_char('>') {
                    (TokenKind::Arrow, "->".to_string())
                } else {
                    (TokenKind::Minus, "-".to_string())
                }
            }
            '*' => {
                if self.eat_char('=') {
                    (TokenKind::StarEq, "*=".to_string())
                } else {
                    (TokenKind::Star, "*".to_string())
                }
            }
            '/' => {
                if self.eat_char('=') {
                    (TokenKind::SlashEq, "/=".to_string())
                } else {
                    (TokenKind::Slash, "/".to_string())
                }
            }
            '%' => {
                if self.eat_char('=') {
                    (TokenKind::PercentEq, "%=".to_string())
                } else {
                    (TokenKind::Percent, "%".to_string())
                }
            }
            '&' => {
                if self.eat_char('&') {
                    (TokenKind::AmpAmp, "&&".to_string())
                } else if self.eat_char('=') {
                    (TokenKind::AmpEq, "&=".to_string())
                } else {
                    (TokenKind::Amp, "&".to_string())
                }
            }
            '|' => {
                if self.eat_char('|') {
                    (TokenKind::PipePipe, "||".to_string())
                } else if self.eat_char('=') {
                    (TokenKind::PipeEq, "|=".to_string())
                } else {
                    (TokenKind::Pipe, "|".to_string())
                }
            }
            '^' => {
                if self.eat_char('=') {
                    (TokenKind::CaretEq, "^=".to_string())
                } else {
                    (TokenKind::Caret, "^".to_string())
                }
            }
            '"' => (TokenKind::Str, self.lex_quoted('"')),
            '\'' => (TokenKind::Char, self.lex_quoted('\'')),
            c if c.is_ascii_digit() => (TokenKind::Number, self.lex_number(c)),
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                (TokenKind::Ident, self.lex_identifier(c))
            }
            other => (TokenKind::Unknown, other.to_string()),
        };

        let span = SourceSpan::new(start, self.here());
        Some(Token { kind, text, span })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        lex(text).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tracks_lines_and_columns() {
        let tokens = lex("foo\n  bar");
        assert_eq!(tokens[0].span, SourceSpan::new(SourcePos::new(1, 1), SourcePos::new(1, 4)));
        assert_eq!(tokens[1].span, SourceSpan::new(SourcePos::new(2, 3), SourcePos::new(2, 6)));
    }

    #[test]
    fn comments_and_whitespace_produce_no_tokens() {
        assert_eq!(kinds("// line\n/* block\nstill */ x"), vec![TokenKind::Ident]);
    }

    #[test]
    fn angle_brackets_stay_single() {
        assert_eq!(
            kinds("a >> b"),
            vec![TokenKind::Ident, TokenKind::Gt, TokenKind::Gt, TokenKind::Ident]
        );
        assert_eq!(kinds(">="), vec![TokenKind::GtEq]);
    }

    #[test]
    fn composite_operators() {
        assert_eq!(
            kinds("-> :: ++ != &&"),
            vec![
                TokenKind::Arrow,
                TokenKind::ColonColon,
                TokenKind::PlusPlus,
                TokenKind::BangEq,
                TokenKind::AmpAmp,
            ]
        );
    }

    #[test]
    fn literals_keep_their_text() {
        let tokens = lex(r#""a\"b" 'c' 0x1F 1.5e3 42L"#);
        assert_eq!(tokens[0].text, r#""a\"b""#);
        assert_eq!(tokens[1].text, "'c'");
        assert_eq!(tokens[2].text, "0x1F");
        assert_eq!(tokens[3].text, "1.5e3");
        assert_eq!(tokens[4].text, "42L");
    }
}
