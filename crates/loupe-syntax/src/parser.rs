use loupe_core::{SourcePos, SourceSpan};

use crate::ast;
use crate::lexer::{Token, TokenKind};

/// Fail-fast parse error. There is no recovery: the caller falls back to
/// rendering the document as plain text with this error appended.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at {pos}")]
pub struct ParseError {
    pub message: String,
    pub pos: SourcePos,
}

type Result<T> = std::result::Result<T, ParseError>;

/// Identifiers that can never start a type reference. Used to keep the
/// speculative local-variable parse from swallowing statements.
const RESERVED_NON_TYPE: &[&str] = &[
    "new",
    "return",
    "if",
    "else",
    "while",
    "do",
    "for",
    "switch",
    "case",
    "default",
    "try",
    "catch",
    "finally",
    "throw",
    "throws",
    "this",
    "super",
    "instanceof",
    "true",
    "false",
    "null",
    "break",
    "continue",
    "assert",
    "synchronized",
    "class",
    "interface",
    "enum",
    "extends",
    "implements",
    "import",
    "package",
];

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_n(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn at_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|token| token.kind == kind)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek()
            .is_some_and(|token| token.kind == TokenKind::Ident && token.text == keyword)
    }

    fn nth_is_kind(&self, n: usize, kind: TokenKind) -> bool {
        self.peek_n(n).is_some_and(|token| token.kind == kind)
    }

    fn nth_is_keyword(&self, n: usize, keyword: &str) -> bool {
        self.peek_n(n)
            .is_some_and(|token| token.kind == TokenKind::Ident && token.text == keyword)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        Some(tok)
    }

    fn bump_any(&mut self, what: &str) -> Result<Token> {
        match self.bump() {
            Some(tok) => Ok(tok),
            None => self.error(format!("expected {what}, found end of file")),
        }
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at_kind(kind) {
            self.bump()
        } else {
            None
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> Option<Token> {
        if self.at_keyword(keyword) {
            self.bump()
        } else {
            None
        }
    }

    fn here(&self) -> SourcePos {
        if let Some(tok) = self.peek() {
            tok.span.start
        } else if let Some(tok) = self.tokens.last() {
            tok.span.end
        } else {
            SourcePos::new(1, 1)
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(ParseError {
            message: message.into(),
            pos: self.here(),
        })
    }

    fn found(&self) -> String {
        match self.peek() {
            Some(tok) => format!("`{}`", tok.text),
            None => "end of file".to_string(),
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        if self.at_kind(kind) {
            self.bump_any(what)
        } else {
            self.error(format!("expected {what}, found {}", self.found()))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<Token> {
        if self.at_kind(TokenKind::Ident) {
            self.bump_any(what)
        } else {
            self.error(format!("expected {what}, found {}", self.found()))
        }
    }

    /// True when the `count` tokens starting at the cursor have the given
    /// kinds and no whitespace between them. Shift operators are lexed as
    /// separate angle brackets and reassembled here.
    fn adjacent_kinds(&self, kinds: &[TokenKind]) -> bool {
        for (i, kind) in kinds.iter().enumerate() {
            let Some(tok) = self.peek_n(i) else {
                return false;
            };
            if tok.kind != *kind {
                return false;
            }
            if i > 0 {
                let prev = self.peek_n(i - 1).expect("earlier token exists");
                if prev.span.end != tok.span.start {
                    return false;
                }
            }
        }
        true
    }

    // ---- declarations ----------------------------------------------------

    pub(crate) fn parse_compilation_unit(&mut self) -> Result<ast::CompilationUnit> {
        let span = match (self.tokens.first(), self.tokens.last()) {
            (Some(first), Some(last)) => SourceSpan::new(first.span.start, last.span.end),
            _ => SourceSpan::new(SourcePos::new(1, 1), SourcePos::new(1, 1)),
        };

        let package = if self.at_keyword("package") {
            Some(self.parse_package_decl()?)
        } else {
            None
        };

        let mut imports = Vec::new();
        while self.at_keyword("import") {
            imports.push(self.parse_import_decl()?);
        }

        let mut types = Vec::new();
        while !self.is_eof() {
            if self.eat(TokenKind::Semi).is_some() {
                continue;
            }
            types.push(self.parse_type_decl()?);
        }

        Ok(ast::CompilationUnit {
            package,
            imports,
            types,
            span,
        })
    }

    fn parse_package_decl(&mut self) -> Result<ast::PackageDecl> {
        let kw = self.expect_ident("`package`")?;
        let (name, _) = self.parse_qualified_name()?;
        let semi = self.expect_kind(TokenKind::Semi, "`;`")?;
        Ok(ast::PackageDecl {
            name,
            span: SourceSpan::new(kw.span.start, semi.span.end),
        })
    }

    fn parse_import_decl(&mut self) -> Result<ast::ImportDecl> {
        let kw = self.expect_ident("`import`")?;
        let is_static = self.eat_keyword("static").is_some();

        let first = self.expect_ident("import path")?;
        let mut parts = vec![first.text];
        let path_start = first.span.start;
        let mut path_end = first.span.end;

        let mut is_star = false;
        while self.eat(TokenKind::Dot).is_some() {
            if self.eat(TokenKind::Star).is_some() {
                is_star = true;
                break;
            }
            let part = self.expect_ident("import path segment")?;
            path_end = part.span.end;
            parts.push(part.text);
        }

        let semi = self.expect_kind(TokenKind::Semi, "`;`")?;
        Ok(ast::ImportDecl {
            is_static,
            is_star,
            path: parts.join("."),
            path_span: SourceSpan::new(path_start, path_end),
            span: SourceSpan::new(kw.span.start, semi.span.end),
        })
    }

    fn parse_qualified_name(&mut self) -> Result<(String, SourceSpan)> {
        let first = self.expect_ident("name")?;
        let start = first.span.start;
        let mut end = first.span.end;
        let mut parts = vec![first.text];

        while self.at_kind(TokenKind::Dot) && self.nth_is_kind(1, TokenKind::Ident) {
            self.bump();
            let part = self.expect_ident("name segment")?;
            end = part.span.end;
            parts.push(part.text);
        }

        Ok((parts.join("."), SourceSpan::new(start, end)))
    }

    fn parse_type_decl(&mut self) -> Result<ast::TypeDecl> {
        let start = self.here();
        self.skip_modifiers_and_annotations()?;

        if self.at_kind(TokenKind::At) && self.nth_is_keyword(1, "interface") {
            self.bump();
            self.bump();
            let name = self.expect_ident("annotation type name")?;
            let (members, end) = self.parse_type_body(&name.text, false)?;
            return Ok(ast::TypeDecl::Annotation(ast::ClassDecl {
                name: name.text,
                name_span: name.span,
                supers: Vec::new(),
                members,
                span: SourceSpan::new(start, end),
            }));
        }

        let kind = if self.at_keyword("class") || self.at_keyword("interface") || self.at_keyword("enum")
        {
            self.bump_any("token")?.text
        } else {
            return self.error(format!("expected type declaration, found {}", self.found()));
        };

        let name = self.expect_ident("type name")?;
        if self.at_kind(TokenKind::Lt) {
            self.skip_balanced(TokenKind::Lt, TokenKind::Gt);
        }
        let supers = self.parse_heritage()?;
        let is_enum = kind == "enum";
        let (members, end) = self.parse_type_body(&name.text, is_enum)?;
        let span = SourceSpan::new(start, end);

        let decl = ast::ClassDecl {
            name: name.text,
            name_span: name.span,
            supers,
            members,
            span,
        };
        Ok(match kind.as_str() {
            "class" => ast::TypeDecl::Class(decl),
            "interface" => ast::TypeDecl::Interface(decl),
            _ => ast::TypeDecl::Enum(decl),
        })
    }

    /// `extends`/`implements`/`permits` type lists, in source order.
    fn parse_heritage(&mut self) -> Result<Vec<ast::TypeRef>> {
        let mut supers = Vec::new();
        for clause in ["extends", "implements", "permits"] {
            if self.eat_keyword(clause).is_some() {
                loop {
                    supers.push(self.parse_type_ref()?);
                    if self.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
            }
        }
        Ok(supers)
    }

    fn parse_type_body(&mut self, type_name: &str, is_enum: bool) -> Result<(Vec<ast::MemberDecl>, SourcePos)> {
        self.expect_kind(TokenKind::LBrace, "`{`")?;

        if is_enum {
            self.skip_enum_constants();
        }

        let mut members = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RBrace) {
            if self.eat(TokenKind::Semi).is_some() {
                continue;
            }
            members.push(self.parse_member_decl(type_name)?);
        }

        let rbrace = self.expect_kind(TokenKind::RBrace, "`}`")?;
        Ok((members, rbrace.span.end))
    }

    fn skip_enum_constants(&mut self) {
        // Constants come first in an enum body; they are skipped, not
        // modeled. A leading `;` means there are none.
        if self.eat(TokenKind::Semi).is_some() {
            return;
        }

        loop {
            if self.eat(TokenKind::Semi).is_some() {
                break;
            }
            if self.at_kind(TokenKind::RBrace) || self.is_eof() {
                break;
            }

            while self.at_kind(TokenKind::At) {
                self.bump();
                if self.at_kind(TokenKind::Ident) {
                    let _ = self.parse_qualified_name();
                }
                if self.at_kind(TokenKind::LParen) {
                    self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
                }
            }
            if !self.at_kind(TokenKind::Ident) {
                break;
            }

            self.bump();
            if self.at_kind(TokenKind::LParen) {
                self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
            }
            if self.at_kind(TokenKind::LBrace) {
                self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
            }

            if self.eat(TokenKind::Comma).is_some() {
                continue;
            }
        }
    }

    fn parse_member_decl(&mut self, enclosing_type: &str) -> Result<ast::MemberDecl> {
        let start = self.here();
        self.skip_modifiers_and_annotations()?;

        if self.at_kind(TokenKind::Lt) {
            self.skip_balanced(TokenKind::Lt, TokenKind::Gt);
        }

        if self.at_keyword("static") && self.nth_is_kind(1, TokenKind::LBrace) {
            self.bump();
            let body = self.parse_block()?;
            let span = SourceSpan::new(start, body.span.end);
            return Ok(ast::MemberDecl::Initializer(ast::InitializerDecl {
                is_static: true,
                body,
                span,
            }));
        }

        if self.at_kind(TokenKind::LBrace) {
            let body = self.parse_block()?;
            let span = SourceSpan::new(start, body.span.end);
            return Ok(ast::MemberDecl::Initializer(ast::InitializerDecl {
                is_static: false,
                body,
                span,
            }));
        }

        let is_annotation_type = self.at_kind(TokenKind::At) && self.nth_is_keyword(1, "interface");
        let is_nested_type =
            self.at_keyword("class") || self.at_keyword("interface") || self.at_keyword("enum");
        if is_annotation_type || is_nested_type {
            return Ok(ast::MemberDecl::Type(self.parse_type_decl()?));
        }

        if self.at_kind(TokenKind::Ident)
            && self.nth_is_kind(1, TokenKind::LParen)
            && self.peek().is_some_and(|t| t.text == enclosing_type)
        {
            let name = self.expect_ident("constructor name")?;
            let params = self.parse_param_list()?;
            let throws = self.parse_throws()?;
            let body = self.parse_block()?;
            let span = SourceSpan::new(start, body.span.end);
            return Ok(ast::MemberDecl::Constructor(ast::ConstructorDecl {
                name: name.text,
                name_span: name.span,
                params,
                throws,
                body,
                span,
            }));
        }

        let return_ty = self.parse_type_ref()?;
        let name = self.expect_ident("member name")?;

        if self.at_kind(TokenKind::LParen) {
            let params = self.parse_param_list()?;
            let throws = self.parse_throws()?;

            if self.eat_keyword("default").is_some() {
                // Annotation element default value; skipped.
                while !self.is_eof() && !self.at_kind(TokenKind::Semi) {
                    if self.at_kind(TokenKind::LParen) {
                        self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
                        continue;
                    }
                    if self.at_kind(TokenKind::LBrace) {
                        self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
                        continue;
                    }
                    self.bump();
                }
                let semi = self.expect_kind(TokenKind::Semi, "`;`")?;
                return Ok(ast::MemberDecl::Method(ast::MethodDecl {
                    return_ty,
                    name: name.text,
                    name_span: name.span,
                    params,
                    throws,
                    body: None,
                    span: SourceSpan::new(start, semi.span.end),
                }));
            }

            if let Some(semi) = self.eat(TokenKind::Semi) {
                return Ok(ast::MemberDecl::Method(ast::MethodDecl {
                    return_ty,
                    name: name.text,
                    name_span: name.span,
                    params,
                    throws,
                    body: None,
                    span: SourceSpan::new(start, semi.span.end),
                }));
            }

            let body = self.parse_block()?;
            let span = SourceSpan::new(start, body.span.end);
            return Ok(ast::MemberDecl::Method(ast::MethodDecl {
                return_ty,
                name: name.text,
                name_span: name.span,
                params,
                throws,
                body: Some(body),
                span,
            }));
        }

        let declarators = self.parse_declarators(name)?;
        let semi = self.expect_kind(TokenKind::Semi, "`;`")?;
        Ok(ast::MemberDecl::Field(ast::FieldDecl {
            ty: return_ty,
            declarators,
            span: SourceSpan::new(start, semi.span.end),
        }))
    }

    /// Declarator list after the first declared name has been consumed.
    fn parse_declarators(&mut self, first_name: Token) -> Result<Vec<ast::Declarator>> {
        let mut declarators = vec![self.parse_declarator_rest(first_name)?];
        while self.eat(TokenKind::Comma).is_some() {
            let name = self.expect_ident("declarator name")?;
            declarators.push(self.parse_declarator_rest(name)?);
        }
        Ok(declarators)
    }

    fn parse_declarator_rest(&mut self, name: Token) -> Result<ast::Declarator> {
        let mut dims = 0u8;
        while self.at_kind(TokenKind::LBracket) && self.nth_is_kind(1, TokenKind::RBracket) {
            self.bump();
            self.bump();
            dims = dims.saturating_add(1);
        }

        let initializer = if self.eat(TokenKind::Eq).is_some() {
            if self.at_kind(TokenKind::LBrace) {
                Some(ast::Expr::ArrayInit(self.parse_array_init()?))
            } else {
                Some(self.parse_expr()?)
            }
        } else {
            None
        };

        Ok(ast::Declarator {
            name: name.text,
            name_span: name.span,
            dims,
            initializer,
        })
    }

    fn parse_throws(&mut self) -> Result<Vec<ast::TypeRef>> {
        let mut throws = Vec::new();
        if self.eat_keyword("throws").is_some() {
            loop {
                throws.push(self.parse_type_ref()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        Ok(throws)
    }

    fn parse_param_list(&mut self) -> Result<Vec<ast::ParamDecl>> {
        self.expect_kind(TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RParen) {
            self.skip_variable_modifiers_and_annotations()?;
            let mut ty = self.parse_type_ref()?;

            // Varargs are an array of the element type.
            if self.adjacent_kinds(&[TokenKind::Dot, TokenKind::Dot, TokenKind::Dot]) {
                self.bump();
                self.bump();
                let last = self.bump_any("token")?;
                ty.dims = ty.dims.saturating_add(1);
                ty.span = SourceSpan::new(ty.span.start, last.span.end);
            }

            let name = self.expect_ident("parameter name")?;
            while self.at_kind(TokenKind::LBracket) && self.nth_is_kind(1, TokenKind::RBracket) {
                self.bump();
                self.bump();
                ty.dims = ty.dims.saturating_add(1);
            }

            let span = SourceSpan::new(ty.span.start, name.span.end);
            params.push(ast::ParamDecl {
                ty,
                name: name.text,
                name_span: name.span,
                span,
            });

            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect_kind(TokenKind::RParen, "`)`")?;
        Ok(params)
    }

    fn skip_modifiers_and_annotations(&mut self) -> Result<()> {
        loop {
            if self.at_kind(TokenKind::At) {
                if self.nth_is_keyword(1, "interface") {
                    break;
                }
                self.bump();
                if self.at_kind(TokenKind::Ident) {
                    self.parse_qualified_name()?;
                }
                if self.at_kind(TokenKind::LParen) {
                    self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
                }
                continue;
            }

            if self.peek().is_some_and(|tok| {
                tok.kind == TokenKind::Ident
                    && matches!(
                        tok.text.as_str(),
                        "public"
                            | "protected"
                            | "private"
                            | "static"
                            | "final"
                            | "abstract"
                            | "default"
                            | "synchronized"
                            | "native"
                            | "transient"
                            | "volatile"
                            | "sealed"
                            | "non"
                            | "strictfp"
                    )
            }) {
                if self.at_keyword("non")
                    && self.nth_is_kind(1, TokenKind::Minus)
                    && self.nth_is_keyword(2, "sealed")
                {
                    self.bump();
                    self.bump();
                    self.bump();
                    continue;
                }
                if self.at_keyword("static") && self.nth_is_kind(1, TokenKind::LBrace) {
                    break;
                }
                self.bump();
                continue;
            }

            break;
        }
        Ok(())
    }

    fn skip_variable_modifiers_and_annotations(&mut self) -> Result<()> {
        loop {
            if self.at_kind(TokenKind::At) {
                self.bump();
                if self.at_kind(TokenKind::Ident) {
                    self.parse_qualified_name()?;
                }
                if self.at_kind(TokenKind::LParen) {
                    self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
                }
                continue;
            }
            if self.at_keyword("final") {
                self.bump();
                continue;
            }
            break;
        }
        Ok(())
    }

    // ---- types -----------------------------------------------------------

    fn parse_type_ref(&mut self) -> Result<ast::TypeRef> {
        while self.at_kind(TokenKind::At) {
            self.bump();
            if self.at_kind(TokenKind::Ident) {
                self.parse_qualified_name()?;
            }
            if self.at_kind(TokenKind::LParen) {
                self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
            }
        }

        if self
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Ident && RESERVED_NON_TYPE.contains(&t.text.as_str()))
        {
            return self.error(format!("expected type, found {}", self.found()));
        }

        let first = self.expect_ident("type name")?;
        let start = first.span.start;
        let mut name_end = first.span.end;
        let mut name = first.text;

        while self.at_kind(TokenKind::Dot) && self.nth_is_kind(1, TokenKind::Ident) {
            self.bump();
            let part = self.expect_ident("type name segment")?;
            name.push('.');
            name.push_str(&part.text);
            name_end = part.span.end;
        }

        let name_span = SourceSpan::new(start, name_end);
        let mut end = name_end;

        let mut args = Vec::new();
        if self.at_kind(TokenKind::Lt) {
            let (parsed, args_end) = self.parse_type_args()?;
            args = parsed;
            end = args_end;
        }

        let mut dims = 0u8;
        while self.at_kind(TokenKind::LBracket) && self.nth_is_kind(1, TokenKind::RBracket) {
            self.bump();
            let rb = self.bump_any("token")?;
            dims = dims.saturating_add(1);
            end = rb.span.end;
        }

        Ok(ast::TypeRef {
            name,
            name_span,
            args,
            dims,
            span: SourceSpan::new(start, end),
        })
    }

    /// Generic argument list. Wildcard bounds are flattened into the result;
    /// a bare `?` contributes nothing.
    fn parse_type_args(&mut self) -> Result<(Vec<ast::TypeRef>, SourcePos)> {
        self.expect_kind(TokenKind::Lt, "`<`")?;
        let mut args = Vec::new();

        if let Some(gt) = self.eat(TokenKind::Gt) {
            return Ok((args, gt.span.end));
        }

        loop {
            if self.eat(TokenKind::Question).is_some() {
                if self.eat_keyword("extends").is_some() || self.eat_keyword("super").is_some() {
                    args.push(self.parse_type_ref()?);
                }
            } else {
                args.push(self.parse_type_ref()?);
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        let gt = self.expect_kind(TokenKind::Gt, "`>`")?;
        Ok((args, gt.span.end))
    }

    // ---- statements ------------------------------------------------------

    fn parse_block(&mut self) -> Result<ast::Block> {
        let lbrace = self.expect_kind(TokenKind::LBrace, "`{`")?;
        let mut statements = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RBrace) {
            statements.push(self.parse_stmt()?);
        }
        let rbrace = self.expect_kind(TokenKind::RBrace, "`}`")?;
        Ok(ast::Block {
            statements,
            span: SourceSpan::new(lbrace.span.start, rbrace.span.end),
        })
    }

    fn parse_stmt(&mut self) -> Result<ast::Stmt> {
        if let Some(semi) = self.eat(TokenKind::Semi) {
            return Ok(ast::Stmt::Empty(semi.span));
        }
        if self.at_kind(TokenKind::LBrace) {
            return Ok(ast::Stmt::Block(self.parse_block()?));
        }
        if self.at_keyword("return") {
            return self.parse_return_stmt();
        }
        if self.at_keyword("if") {
            return self.parse_if_stmt();
        }
        if self.at_keyword("while") {
            return self.parse_while_stmt();
        }
        if self.at_keyword("do") {
            return self.parse_do_while_stmt();
        }
        if self.at_keyword("for") {
            return self.parse_for_stmt();
        }
        if self.at_keyword("switch") {
            return self.parse_switch_stmt();
        }
        if self.at_keyword("try") {
            return self.parse_try_stmt();
        }
        if self.at_keyword("throw") {
            let kw = self.bump_any("token")?;
            let expr = self.parse_expr()?;
            let semi = self.expect_kind(TokenKind::Semi, "`;`")?;
            return Ok(ast::Stmt::Throw(ast::ThrowStmt {
                expr,
                span: SourceSpan::new(kw.span.start, semi.span.end),
            }));
        }
        if self.at_keyword("synchronized") && self.nth_is_kind(1, TokenKind::LParen) {
            let kw = self.bump_any("token")?;
            self.expect_kind(TokenKind::LParen, "`(`")?;
            let lock = self.parse_expr()?;
            self.expect_kind(TokenKind::RParen, "`)`")?;
            let block = self.parse_block()?;
            let span = SourceSpan::new(kw.span.start, block.span.end);
            return Ok(ast::Stmt::Synchronized(ast::SynchronizedStmt { lock, block, span }));
        }
        if self.at_keyword("break") || self.at_keyword("continue") {
            let kw = self.bump_any("token")?;
            let label = if self.at_kind(TokenKind::Ident) {
                self.bump().map(|t| t.text)
            } else {
                None
            };
            let semi = self.expect_kind(TokenKind::Semi, "`;`")?;
            let stmt = ast::BranchStmt {
                label,
                span: SourceSpan::new(kw.span.start, semi.span.end),
            };
            return Ok(if kw.text == "break" {
                ast::Stmt::Break(stmt)
            } else {
                ast::Stmt::Continue(stmt)
            });
        }
        if self.at_keyword("assert") {
            let kw = self.bump_any("token")?;
            let condition = self.parse_expr()?;
            let message = if self.eat(TokenKind::Colon).is_some() {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let semi = self.expect_kind(TokenKind::Semi, "`;`")?;
            return Ok(ast::Stmt::Assert(ast::AssertStmt {
                condition,
                message,
                span: SourceSpan::new(kw.span.start, semi.span.end),
            }));
        }

        // `this(...)` / `super(...)` constructor delegation.
        if (self.at_keyword("this") || self.at_keyword("super")) && self.nth_is_kind(1, TokenKind::LParen)
        {
            let kw = self.bump_any("token")?;
            let target = if kw.text == "this" {
                ast::ConstructorTarget::This
            } else {
                ast::ConstructorTarget::Super
            };
            let (args, args_end) = self.parse_arg_list()?;
            let semi = self.expect_kind(TokenKind::Semi, "`;`")?;
            let expr = ast::Expr::ConstructorInvocation(ast::ConstructorInvocationExpr {
                target,
                args,
                span: SourceSpan::new(kw.span.start, args_end),
            });
            return Ok(ast::Stmt::Expr(ast::ExprStmt {
                expr,
                span: SourceSpan::new(kw.span.start, semi.span.end),
            }));
        }

        if self.at_kind(TokenKind::Ident)
            && self.nth_is_kind(1, TokenKind::Colon)
            && !self.at_keyword("default")
            && !self.at_keyword("case")
        {
            let label = self.bump_any("token")?;
            self.bump();
            let stmt = self.parse_stmt()?;
            let span = SourceSpan::new(label.span.start, stmt.span().end);
            return Ok(ast::Stmt::Labeled(ast::LabeledStmt {
                label: label.text,
                stmt: Box::new(stmt),
                span,
            }));
        }

        // Local type declaration, possibly behind modifiers.
        let save = self.pos;
        let local_type = self.skip_modifiers_and_annotations().is_ok()
            && (self.at_keyword("class") || self.at_keyword("interface") || self.at_keyword("enum"));
        self.pos = save;
        if local_type {
            return Ok(ast::Stmt::LocalType(self.parse_type_decl()?));
        }

        if let Some(local) = self.try_parse_local_var_stmt()? {
            return Ok(local);
        }

        let expr = self.parse_expr()?;
        let start = expr.span().start;
        let semi = self.expect_kind(TokenKind::Semi, "`;`")?;
        Ok(ast::Stmt::Expr(ast::ExprStmt {
            expr,
            span: SourceSpan::new(start, semi.span.end),
        }))
    }

    fn parse_return_stmt(&mut self) -> Result<ast::Stmt> {
        let kw = self.bump_any("token")?;
        if let Some(semi) = self.eat(TokenKind::Semi) {
            return Ok(ast::Stmt::Return(ast::ReturnStmt {
                expr: None,
                span: SourceSpan::new(kw.span.start, semi.span.end),
            }));
        }
        let expr = self.parse_expr()?;
        let semi = self.expect_kind(TokenKind::Semi, "`;`")?;
        Ok(ast::Stmt::Return(ast::ReturnStmt {
            expr: Some(expr),
            span: SourceSpan::new(kw.span.start, semi.span.end),
        }))
    }

    fn parse_if_stmt(&mut self) -> Result<ast::Stmt> {
        let kw = self.bump_any("token")?;
        self.expect_kind(TokenKind::LParen, "`(`")?;
        let condition = self.parse_expr()?;
        self.expect_kind(TokenKind::RParen, "`)`")?;
        let then_branch = Box::new(self.parse_stmt()?);
        let else_branch = if self.eat_keyword("else").is_some() {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        let end = else_branch
            .as_ref()
            .map(|s| s.span().end)
            .unwrap_or(then_branch.span().end);
        Ok(ast::Stmt::If(ast::IfStmt {
            condition,
            then_branch,
            else_branch,
            span: SourceSpan::new(kw.span.start, end),
        }))
    }

    fn parse_while_stmt(&mut self) -> Result<ast::Stmt> {
        let kw = self.bump_any("token")?;
        self.expect_kind(TokenKind::LParen, "`(`")?;
        let condition = self.parse_expr()?;
        self.expect_kind(TokenKind::RParen, "`)`")?;
        let body = Box::new(self.parse_stmt()?);
        let span = SourceSpan::new(kw.span.start, body.span().end);
        Ok(ast::Stmt::While(ast::WhileStmt {
            condition,
            body,
            span,
        }))
    }

    fn parse_do_while_stmt(&mut self) -> Result<ast::Stmt> {
        let kw = self.bump_any("token")?;
        let body = Box::new(self.parse_stmt()?);
        if self.eat_keyword("while").is_none() {
            return self.error(format!("expected `while`, found {}", self.found()));
        }
        self.expect_kind(TokenKind::LParen, "`(`")?;
        let condition = self.parse_expr()?;
        self.expect_kind(TokenKind::RParen, "`)`")?;
        let semi = self.expect_kind(TokenKind::Semi, "`;`")?;
        Ok(ast::Stmt::DoWhile(ast::DoWhileStmt {
            body,
            condition,
            span: SourceSpan::new(kw.span.start, semi.span.end),
        }))
    }

    fn parse_for_stmt(&mut self) -> Result<ast::Stmt> {
        let kw = self.bump_any("token")?;
        self.expect_kind(TokenKind::LParen, "`(`")?;

        // Enhanced for: `for (Type name : iterable)`.
        let save = self.pos;
        if self.skip_variable_modifiers_and_annotations().is_ok() {
            if let Ok(ty) = self.parse_type_ref() {
                if self.at_kind(TokenKind::Ident) && self.nth_is_kind(1, TokenKind::Colon) {
                    let name = self.expect_ident("loop variable")?;
                    self.bump();
                    let iterable = self.parse_expr()?;
                    self.expect_kind(TokenKind::RParen, "`)`")?;
                    let body = Box::new(self.parse_stmt()?);
                    let span = SourceSpan::new(kw.span.start, body.span().end);
                    return Ok(ast::Stmt::ForEach(ast::ForEachStmt {
                        ty,
                        name: name.text,
                        name_span: name.span,
                        iterable,
                        body,
                        span,
                    }));
                }
            }
        }
        self.pos = save;

        let init = if self.at_kind(TokenKind::Semi) {
            None
        } else if let Some(decl) = self.try_parse_local_var_decl()? {
            Some(ast::ForInit::LocalVar(decl))
        } else {
            let mut exprs = vec![self.parse_expr()?];
            while self.eat(TokenKind::Comma).is_some() {
                exprs.push(self.parse_expr()?);
            }
            Some(ast::ForInit::Exprs(exprs))
        };
        self.expect_kind(TokenKind::Semi, "`;`")?;

        let condition = if self.at_kind(TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect_kind(TokenKind::Semi, "`;`")?;

        let mut update = Vec::new();
        if !self.at_kind(TokenKind::RParen) {
            update.push(self.parse_expr()?);
            while self.eat(TokenKind::Comma).is_some() {
                update.push(self.parse_expr()?);
            }
        }
        self.expect_kind(TokenKind::RParen, "`)`")?;

        let body = Box::new(self.parse_stmt()?);
        let span = SourceSpan::new(kw.span.start, body.span().end);
        Ok(ast::Stmt::For(ast::ForStmt {
            init,
            condition,
            update,
            body,
            span,
        }))
    }

    fn parse_switch_stmt(&mut self) -> Result<ast::Stmt> {
        let kw = self.bump_any("token")?;
        self.expect_kind(TokenKind::LParen, "`(`")?;
        let scrutinee = self.parse_expr()?;
        self.expect_kind(TokenKind::RParen, "`)`")?;
        self.expect_kind(TokenKind::LBrace, "`{`")?;

        let mut cases = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RBrace) {
            cases.push(self.parse_switch_case()?);
        }

        let rbrace = self.expect_kind(TokenKind::RBrace, "`}`")?;
        Ok(ast::Stmt::Switch(ast::SwitchStmt {
            scrutinee,
            cases,
            span: SourceSpan::new(kw.span.start, rbrace.span.end),
        }))
    }

    fn parse_switch_case(&mut self) -> Result<ast::SwitchCase> {
        let start = self.here();
        let mut labels = Vec::new();
        let mut is_default = false;

        if self.eat_keyword("case").is_some() {
            loop {
                if self.eat_keyword("default").is_some() {
                    is_default = true;
                } else {
                    labels.push(self.parse_conditional()?);
                }
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        } else if self.eat_keyword("default").is_some() {
            is_default = true;
        } else {
            return self.error(format!("expected `case` or `default`, found {}", self.found()));
        }

        let mut body = Vec::new();
        let end;
        if let Some(colon) = self.eat(TokenKind::Colon) {
            let mut last = colon.span.end;
            while !self.is_eof()
                && !self.at_kind(TokenKind::RBrace)
                && !self.at_keyword("case")
                && !self.at_keyword("default")
            {
                let stmt = self.parse_stmt()?;
                last = stmt.span().end;
                body.push(stmt);
            }
            end = last;
        } else {
            self.expect_kind(TokenKind::Arrow, "`:` or `->`")?;
            if self.at_kind(TokenKind::LBrace) {
                let block = self.parse_block()?;
                end = block.span.end;
                body.push(ast::Stmt::Block(block));
            } else if self.at_keyword("throw") {
                let stmt = self.parse_stmt()?;
                end = stmt.span().end;
                body.push(stmt);
            } else {
                let expr = self.parse_expr()?;
                let expr_start = expr.span().start;
                let semi = self.expect_kind(TokenKind::Semi, "`;`")?;
                end = semi.span.end;
                body.push(ast::Stmt::Expr(ast::ExprStmt {
                    expr,
                    span: SourceSpan::new(expr_start, semi.span.end),
                }));
            }
        }

        Ok(ast::SwitchCase {
            labels,
            is_default,
            body,
            span: SourceSpan::new(start, end),
        })
    }

    fn parse_try_stmt(&mut self) -> Result<ast::Stmt> {
        let kw = self.bump_any("token")?;

        let mut resources = Vec::new();
        if self.eat(TokenKind::LParen).is_some() {
            while !self.is_eof() && !self.at_kind(TokenKind::RParen) {
                let start = self.here();
                self.skip_variable_modifiers_and_annotations()?;
                let ty = self.parse_type_ref()?;
                let name = self.expect_ident("resource name")?;
                self.expect_kind(TokenKind::Eq, "`=`")?;
                let init = self.parse_expr()?;
                let end = init.span().end;
                resources.push(ast::LocalVarStmt {
                    ty,
                    declarators: vec![ast::Declarator {
                        name: name.text,
                        name_span: name.span,
                        dims: 0,
                        initializer: Some(init),
                    }],
                    span: SourceSpan::new(start, end),
                });
                if self.eat(TokenKind::Semi).is_none() {
                    break;
                }
            }
            self.expect_kind(TokenKind::RParen, "`)`")?;
        }

        let block = self.parse_block()?;
        let mut end = block.span.end;

        let mut catches = Vec::new();
        while self.at_keyword("catch") {
            let catch_kw = self.bump_any("token")?;
            self.expect_kind(TokenKind::LParen, "`(`")?;
            self.skip_variable_modifiers_and_annotations()?;
            let mut types = vec![self.parse_type_ref()?];
            while self.eat(TokenKind::Pipe).is_some() {
                types.push(self.parse_type_ref()?);
            }
            let name = self.expect_ident("catch parameter name")?;
            self.expect_kind(TokenKind::RParen, "`)`")?;
            let catch_block = self.parse_block()?;
            end = catch_block.span.end;
            let span = SourceSpan::new(catch_kw.span.start, catch_block.span.end);
            catches.push(ast::CatchClause {
                types,
                name: name.text,
                name_span: name.span,
                block: catch_block,
                span,
            });
        }

        let finally_block = if self.eat_keyword("finally").is_some() {
            let block = self.parse_block()?;
            end = block.span.end;
            Some(block)
        } else {
            None
        };

        Ok(ast::Stmt::Try(ast::TryStmt {
            resources,
            block,
            catches,
            finally_block,
            span: SourceSpan::new(kw.span.start, end),
        }))
    }

    /// Speculative local-variable statement. Backtracks and returns `None`
    /// until the shape is committed (a declared name followed by `=`, `;`,
    /// `,`, or `[]`); errors after that point are real.
    fn try_parse_local_var_stmt(&mut self) -> Result<Option<ast::Stmt>> {
        let start = self.here();
        let Some(decl) = self.try_parse_local_var_decl()? else {
            return Ok(None);
        };
        let semi = self.expect_kind(TokenKind::Semi, "`;`")?;
        Ok(Some(ast::Stmt::LocalVar(ast::LocalVarStmt {
            span: SourceSpan::new(start, semi.span.end),
            ..decl
        })))
    }

    fn try_parse_local_var_decl(&mut self) -> Result<Option<ast::LocalVarStmt>> {
        let save = self.pos;
        let start = self.here();

        if self.skip_variable_modifiers_and_annotations().is_err() {
            self.pos = save;
            return Ok(None);
        }
        let ty = match self.parse_type_ref() {
            Ok(ty) => ty,
            Err(_) => {
                self.pos = save;
                return Ok(None);
            }
        };
        if !self.at_kind(TokenKind::Ident) {
            self.pos = save;
            return Ok(None);
        }
        let committed = matches!(
            self.peek_n(1).map(|t| t.kind),
            Some(TokenKind::Eq) | Some(TokenKind::Semi) | Some(TokenKind::Comma)
        ) || (self.nth_is_kind(1, TokenKind::LBracket) && self.nth_is_kind(2, TokenKind::RBracket));
        if !committed {
            self.pos = save;
            return Ok(None);
        }

        let name = self.expect_ident("variable name")?;
        let declarators = self.parse_declarators(name)?;
        let end = self.here();
        Ok(Some(ast::LocalVarStmt {
            ty,
            declarators,
            span: SourceSpan::new(start, end),
        }))
    }

    // ---- expressions -----------------------------------------------------

    fn parse_expr(&mut self) -> Result<ast::Expr> {
        if let Some(lambda) = self.try_parse_lambda()? {
            return Ok(lambda);
        }

        let target = self.parse_conditional()?;

        if let Some((op, ntokens)) = self.peek_assign_op() {
            for _ in 0..ntokens {
                self.bump();
            }
            let value = self.parse_expr()?;
            let span = SourceSpan::new(target.span().start, value.span().end);
            return Ok(ast::Expr::Assign(ast::AssignExpr {
                target: Box::new(target),
                op,
                value: Box::new(value),
                span,
            }));
        }

        Ok(target)
    }

    fn peek_assign_op(&self) -> Option<(ast::AssignOp, usize)> {
        use TokenKind::*;
        let kind = self.peek()?.kind;
        Some(match kind {
            Eq => (ast::AssignOp::Assign, 1),
            PlusEq => (ast::AssignOp::Add, 1),
            MinusEq => (ast::AssignOp::Sub, 1),
            StarEq => (ast::AssignOp::Mul, 1),
            SlashEq => (ast::AssignOp::Div, 1),
            PercentEq => (ast::AssignOp::Rem, 1),
            AmpEq => (ast::AssignOp::BitAnd, 1),
            PipeEq => (ast::AssignOp::BitOr, 1),
            CaretEq => (ast::AssignOp::BitXor, 1),
            Lt if self.adjacent_kinds(&[Lt, LtEq]) => (ast::AssignOp::Shl, 2),
            Gt if self.adjacent_kinds(&[Gt, Gt, GtEq]) => (ast::AssignOp::UShr, 3),
            Gt if self.adjacent_kinds(&[Gt, GtEq]) => (ast::AssignOp::Shr, 2),
            _ => return None,
        })
    }

    fn parse_conditional(&mut self) -> Result<ast::Expr> {
        let condition = self.parse_binary(1)?;
        if self.eat(TokenKind::Question).is_none() {
            return Ok(condition);
        }
        let then_expr = self.parse_expr()?;
        self.expect_kind(TokenKind::Colon, "`:`")?;
        let else_expr = self.parse_expr()?;
        let span = SourceSpan::new(condition.span().start, else_expr.span().end);
        Ok(ast::Expr::Conditional(ast::ConditionalExpr {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
            span,
        }))
    }

    fn peek_binary_op(&self) -> Option<(ast::BinaryOp, u8, usize)> {
        use TokenKind::*;
        let kind = self.peek()?.kind;
        Some(match kind {
            PipePipe => (ast::BinaryOp::Or, 1, 1),
            AmpAmp => (ast::BinaryOp::And, 2, 1),
            Pipe => (ast::BinaryOp::BitOr, 3, 1),
            Caret => (ast::BinaryOp::BitXor, 4, 1),
            Amp => (ast::BinaryOp::BitAnd, 5, 1),
            EqEq => (ast::BinaryOp::Eq, 6, 1),
            BangEq => (ast::BinaryOp::Ne, 6, 1),
            LtEq => (ast::BinaryOp::Le, 7, 1),
            GtEq => (ast::BinaryOp::Ge, 7, 1),
            Lt => {
                if self.adjacent_kinds(&[Lt, LtEq]) {
                    return None; // `<<=`, handled as an assignment
                } else if self.adjacent_kinds(&[Lt, Lt]) {
                    (ast::BinaryOp::Shl, 8, 2)
                } else {
                    (ast::BinaryOp::Lt, 7, 1)
                }
            }
            Gt => {
                if self.adjacent_kinds(&[Gt, Gt, GtEq]) || self.adjacent_kinds(&[Gt, GtEq]) {
                    return None; // `>>>=` / `>>=`
                } else if self.adjacent_kinds(&[Gt, Gt, Gt]) {
                    (ast::BinaryOp::UShr, 8, 3)
                } else if self.adjacent_kinds(&[Gt, Gt]) {
                    (ast::BinaryOp::Shr, 8, 2)
                } else {
                    (ast::BinaryOp::Gt, 7, 1)
                }
            }
            Plus => (ast::BinaryOp::Add, 9, 1),
            Minus => (ast::BinaryOp::Sub, 9, 1),
            Star => (ast::BinaryOp::Mul, 10, 1),
            Slash => (ast::BinaryOp::Div, 10, 1),
            Percent => (ast::BinaryOp::Rem, 10, 1),
            _ => return None,
        })
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<ast::Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            if self.at_keyword("instanceof") && min_prec <= 7 {
                self.bump();
                let ty = self.parse_type_ref()?;
                let binding = if self
                    .peek()
                    .is_some_and(|t| t.kind == TokenKind::Ident && !RESERVED_NON_TYPE.contains(&t.text.as_str()))
                {
                    self.bump().map(|t| t.text)
                } else {
                    None
                };
                let span = SourceSpan::new(lhs.span().start, ty.span.end);
                lhs = ast::Expr::InstanceOf(ast::InstanceOfExpr {
                    expr: Box::new(lhs),
                    ty,
                    binding,
                    span,
                });
                continue;
            }

            let Some((op, prec, ntokens)) = self.peek_binary_op() else {
                break;
            };
            if prec < min_prec {
                break;
            }
            for _ in 0..ntokens {
                self.bump();
            }
            let rhs = self.parse_binary(prec + 1)?;
            let span = SourceSpan::new(lhs.span().start, rhs.span().end);
            lhs = ast::Expr::Binary(ast::BinaryExpr {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            });
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<ast::Expr> {
        use TokenKind::*;
        let op = match self.peek().map(|t| t.kind) {
            Some(Bang) => Some(ast::UnaryOp::Not),
            Some(Tilde) => Some(ast::UnaryOp::BitNot),
            Some(Plus) => Some(ast::UnaryOp::Pos),
            Some(Minus) => Some(ast::UnaryOp::Neg),
            Some(PlusPlus) => Some(ast::UnaryOp::PreInc),
            Some(MinusMinus) => Some(ast::UnaryOp::PreDec),
            _ => None,
        };
        if let Some(op) = op {
            let tok = self.bump_any("token")?;
            let operand = self.parse_unary()?;
            let span = SourceSpan::new(tok.span.start, operand.span().end);
            return Ok(ast::Expr::Unary(ast::UnaryExpr {
                op,
                operand: Box::new(operand),
                span,
            }));
        }

        if self.at_kind(TokenKind::LParen) && self.cast_ahead() {
            let lparen = self.expect_kind(TokenKind::LParen, "`(`")?;
            let ty = self.parse_type_ref()?;
            self.expect_kind(TokenKind::RParen, "`)`")?;
            // `(Runnable) () -> {}`: the operand may itself be a lambda.
            let expr = match self.try_parse_lambda()? {
                Some(lambda) => lambda,
                None => self.parse_unary()?,
            };
            let span = SourceSpan::new(lparen.span.start, expr.span().end);
            return Ok(ast::Expr::Cast(ast::CastExpr {
                ty,
                expr: Box::new(expr),
                span,
            }));
        }

        self.parse_postfix_expr()
    }

    /// Disambiguates `(Type) operand` from a parenthesized expression by
    /// looking at what follows the closing parenthesis. `+`/`-` only mean a
    /// cast when the type is primitive (`(int) -1` vs `(a) - b`).
    fn cast_ahead(&mut self) -> bool {
        let save = self.pos;
        let verdict = (|| {
            if self.eat(TokenKind::LParen).is_none() {
                return false;
            }
            let Ok(ty) = self.parse_type_ref() else {
                return false;
            };
            if self.eat(TokenKind::RParen).is_none() {
                return false;
            }
            match self.peek().map(|t| t.kind) {
                Some(
                    TokenKind::Ident
                    | TokenKind::Number
                    | TokenKind::Str
                    | TokenKind::Char
                    | TokenKind::LParen
                    | TokenKind::Bang
                    | TokenKind::Tilde,
                ) => true,
                Some(TokenKind::Plus | TokenKind::Minus) => ty.is_primitive(),
                _ => false,
            }
        })();
        self.pos = save;
        verdict
    }

    fn parse_postfix_expr(&mut self) -> Result<ast::Expr> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            if self.at_kind(TokenKind::Dot) {
                if self.nth_is_kind(1, TokenKind::Lt) {
                    // Explicit type witness: `receiver.<T>method(...)`.
                    self.bump();
                    self.skip_balanced(TokenKind::Lt, TokenKind::Gt);
                    let name = self.expect_ident("method name")?;
                    if !self.at_kind(TokenKind::LParen) {
                        return self.error(format!("expected `(`, found {}", self.found()));
                    }
                    let (args, args_end) = self.parse_arg_list()?;
                    let span = SourceSpan::new(expr.span().start, args_end);
                    expr = ast::Expr::Call(ast::CallExpr {
                        receiver: Some(Box::new(expr)),
                        name: name.text,
                        name_span: name.span,
                        args,
                        span,
                    });
                    continue;
                }

                if self.nth_is_keyword(1, "class") {
                    self.bump();
                    let class_tok = self.bump_any("token")?;
                    let span = SourceSpan::new(expr.span().start, class_tok.span.end);
                    expr = match name_chain(&expr) {
                        Some((name, name_span)) => ast::Expr::ClassLiteral(ast::ClassLiteralExpr {
                            ty: ast::TypeRef {
                                name,
                                name_span,
                                args: Vec::new(),
                                dims: 0,
                                span: name_span,
                            },
                            span,
                        }),
                        None => ast::Expr::FieldAccess(ast::FieldAccessExpr {
                            receiver: Box::new(expr),
                            name: class_tok.text,
                            name_span: class_tok.span,
                            span,
                        }),
                    };
                    continue;
                }

                if self.nth_is_kind(1, TokenKind::Ident) {
                    self.bump();
                    let name = self.expect_ident("member name")?;
                    if self.at_kind(TokenKind::LParen) {
                        let (args, args_end) = self.parse_arg_list()?;
                        let span = SourceSpan::new(expr.span().start, args_end);
                        expr = ast::Expr::Call(ast::CallExpr {
                            receiver: Some(Box::new(expr)),
                            name: name.text,
                            name_span: name.span,
                            args,
                            span,
                        });
                    } else {
                        let span = SourceSpan::new(expr.span().start, name.span.end);
                        expr = ast::Expr::FieldAccess(ast::FieldAccessExpr {
                            receiver: Box::new(expr),
                            name: name.text,
                            name_span: name.span,
                            span,
                        });
                    }
                    continue;
                }

                return self.error(format!("expected member name, found {}", self.found()));
            }

            if self.at_kind(TokenKind::LBracket) {
                self.bump();
                let index = self.parse_expr()?;
                let rb = self.expect_kind(TokenKind::RBracket, "`]`")?;
                let span = SourceSpan::new(expr.span().start, rb.span.end);
                expr = ast::Expr::ArrayAccess(ast::ArrayAccessExpr {
                    array: Box::new(expr),
                    index: Box::new(index),
                    span,
                });
                continue;
            }

            if self.at_kind(TokenKind::ColonColon) {
                self.bump();
                let name = self.expect_ident("method reference name")?;
                let span = SourceSpan::new(expr.span().start, name.span.end);
                expr = ast::Expr::MethodRef(ast::MethodRefExpr {
                    receiver: Box::new(expr),
                    name: name.text,
                    span,
                });
                continue;
            }

            if self.at_kind(TokenKind::PlusPlus) || self.at_kind(TokenKind::MinusMinus) {
                let tok = self.bump_any("token")?;
                let op = if tok.kind == TokenKind::PlusPlus {
                    ast::UnaryOp::PostInc
                } else {
                    ast::UnaryOp::PostDec
                };
                let span = SourceSpan::new(expr.span().start, tok.span.end);
                expr = ast::Expr::Unary(ast::UnaryExpr {
                    op,
                    operand: Box::new(expr),
                    span,
                });
                continue;
            }

            break;
        }
        Ok(expr)
    }

    fn parse_primary_expr(&mut self) -> Result<ast::Expr> {
        let Some(tok) = self.peek().cloned() else {
            return self.error("expected expression, found end of file");
        };

        match tok.kind {
            TokenKind::Ident => match tok.text.as_str() {
                "this" => {
                    self.bump();
                    Ok(ast::Expr::This(tok.span))
                }
                "super" => {
                    self.bump();
                    Ok(ast::Expr::Super(tok.span))
                }
                "new" => {
                    self.bump();
                    self.parse_new_expr(tok.span.start)
                }
                "true" | "false" => {
                    self.bump();
                    Ok(ast::Expr::Literal(ast::LiteralExpr {
                        kind: ast::LiteralKind::Bool,
                        text: tok.text,
                        span: tok.span,
                    }))
                }
                "null" => {
                    self.bump();
                    Ok(ast::Expr::Literal(ast::LiteralExpr {
                        kind: ast::LiteralKind::Null,
                        text: tok.text,
                        span: tok.span,
                    }))
                }
                _ => {
                    self.bump();
                    if self.at_kind(TokenKind::LParen) {
                        let (args, args_end) = self.parse_arg_list()?;
                        let span = SourceSpan::new(tok.span.start, args_end);
                        Ok(ast::Expr::Call(ast::CallExpr {
                            receiver: None,
                            name: tok.text,
                            name_span: tok.span,
                            args,
                            span,
                        }))
                    } else {
                        Ok(ast::Expr::Name(ast::NameExpr {
                            name: tok.text,
                            span: tok.span,
                        }))
                    }
                }
            },
            TokenKind::Number => {
                self.bump();
                Ok(ast::Expr::Literal(ast::LiteralExpr {
                    kind: ast::LiteralKind::Number,
                    text: tok.text,
                    span: tok.span,
                }))
            }
            TokenKind::Str => {
                self.bump();
                Ok(ast::Expr::Literal(ast::LiteralExpr {
                    kind: ast::LiteralKind::String,
                    text: tok.text,
                    span: tok.span,
                }))
            }
            TokenKind::Char => {
                self.bump();
                Ok(ast::Expr::Literal(ast::LiteralExpr {
                    kind: ast::LiteralKind::Char,
                    text: tok.text,
                    span: tok.span,
                }))
            }
            TokenKind::LParen => {
                let lparen = self.bump_any("token")?;
                let inner = self.parse_expr()?;
                let rparen = self.expect_kind(TokenKind::RParen, "`)`")?;
                Ok(ast::Expr::Paren(ast::ParenExpr {
                    inner: Box::new(inner),
                    span: SourceSpan::new(lparen.span.start, rparen.span.end),
                }))
            }
            _ => self.error(format!("expected expression, found {}", self.found())),
        }
    }

    fn parse_new_expr(&mut self, start: SourcePos) -> Result<ast::Expr> {
        let mut ty = self.parse_type_ref()?;

        // `new T[] {...}`: the type ref swallowed the empty bracket pairs.
        if ty.dims > 0 {
            let empty_dims = ty.dims;
            ty.dims = 0;
            let init = self.parse_array_init()?;
            let span = SourceSpan::new(start, init.span.end);
            return Ok(ast::Expr::NewArray(ast::NewArrayExpr {
                ty,
                dim_exprs: Vec::new(),
                empty_dims,
                init: Some(init),
                span,
            }));
        }

        if self.at_kind(TokenKind::LBracket) {
            let mut dim_exprs = Vec::new();
            let mut empty_dims = 0u8;
            let mut end = ty.span.end;
            while self.at_kind(TokenKind::LBracket) {
                self.bump();
                if let Some(rb) = self.eat(TokenKind::RBracket) {
                    empty_dims = empty_dims.saturating_add(1);
                    end = rb.span.end;
                    continue;
                }
                let dim = self.parse_expr()?;
                let rb = self.expect_kind(TokenKind::RBracket, "`]`")?;
                end = rb.span.end;
                dim_exprs.push(dim);
            }
            let init = if self.at_kind(TokenKind::LBrace) {
                let init = self.parse_array_init()?;
                end = init.span.end;
                Some(init)
            } else {
                None
            };
            return Ok(ast::Expr::NewArray(ast::NewArrayExpr {
                ty,
                dim_exprs,
                empty_dims,
                init,
                span: SourceSpan::new(start, end),
            }));
        }

        if self.at_kind(TokenKind::LParen) {
            let (args, args_end) = self.parse_arg_list()?;
            let mut end = args_end;
            let body = if self.at_kind(TokenKind::LBrace) {
                let simple = ty.simple_name().to_string();
                let (members, body_end) = self.parse_type_body(&simple, false)?;
                end = body_end;
                Some(members)
            } else {
                None
            };
            return Ok(ast::Expr::New(ast::NewExpr {
                ty,
                args,
                body,
                span: SourceSpan::new(start, end),
            }));
        }

        self.error(format!("expected `(` or `[` after `new`, found {}", self.found()))
    }

    fn parse_array_init(&mut self) -> Result<ast::ArrayInitExpr> {
        let lbrace = self.expect_kind(TokenKind::LBrace, "`{`")?;
        let mut elements = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RBrace) {
            if self.at_kind(TokenKind::LBrace) {
                elements.push(ast::Expr::ArrayInit(self.parse_array_init()?));
            } else {
                elements.push(self.parse_expr()?);
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        let rbrace = self.expect_kind(TokenKind::RBrace, "`}`")?;
        Ok(ast::ArrayInitExpr {
            elements,
            span: SourceSpan::new(lbrace.span.start, rbrace.span.end),
        })
    }

    fn try_parse_lambda(&mut self) -> Result<Option<ast::Expr>> {
        // `name -> ...`
        if self.at_kind(TokenKind::Ident)
            && self.nth_is_kind(1, TokenKind::Arrow)
            && !self.peek().is_some_and(|t| RESERVED_NON_TYPE.contains(&t.text.as_str()))
        {
            let name = self.expect_ident("lambda parameter")?;
            self.bump();
            let params = vec![ast::LambdaParam {
                ty: None,
                name: name.text,
                name_span: name.span,
            }];
            return Ok(Some(self.finish_lambda_body(name.span.start, params)?));
        }

        // `( params ) -> ...`
        if self.at_kind(TokenKind::LParen) && self.paren_lambda_ahead() {
            let lparen = self.expect_kind(TokenKind::LParen, "`(`")?;
            let mut params = Vec::new();
            while !self.is_eof() && !self.at_kind(TokenKind::RParen) {
                self.skip_variable_modifiers_and_annotations()?;
                if self.at_kind(TokenKind::Ident)
                    && matches!(
                        self.peek_n(1).map(|t| t.kind),
                        Some(TokenKind::Comma) | Some(TokenKind::RParen)
                    )
                {
                    let name = self.expect_ident("lambda parameter")?;
                    params.push(ast::LambdaParam {
                        ty: None,
                        name: name.text,
                        name_span: name.span,
                    });
                } else {
                    let ty = self.parse_type_ref()?;
                    let name = self.expect_ident("lambda parameter")?;
                    params.push(ast::LambdaParam {
                        ty: Some(ty),
                        name: name.text,
                        name_span: name.span,
                    });
                }
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect_kind(TokenKind::RParen, "`)`")?;
            self.expect_kind(TokenKind::Arrow, "`->`")?;
            return Ok(Some(self.finish_lambda_body(lparen.span.start, params)?));
        }

        Ok(None)
    }

    fn finish_lambda_body(
        &mut self,
        start: SourcePos,
        params: Vec<ast::LambdaParam>,
    ) -> Result<ast::Expr> {
        let (body, end) = if self.at_kind(TokenKind::LBrace) {
            let block = self.parse_block()?;
            let end = block.span.end;
            (ast::LambdaBody::Block(block), end)
        } else {
            let expr = self.parse_expr()?;
            let end = expr.span().end;
            (ast::LambdaBody::Expr(Box::new(expr)), end)
        };
        Ok(ast::Expr::Lambda(ast::LambdaExpr {
            params,
            body,
            span: SourceSpan::new(start, end),
        }))
    }

    /// True when the parenthesized token group starting at the cursor is
    /// followed by `->`.
    fn paren_lambda_ahead(&self) -> bool {
        let mut depth = 0usize;
        let mut i = 0usize;
        loop {
            let Some(tok) = self.peek_n(i) else {
                return false;
            };
            match tok.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return self.nth_is_kind(i + 1, TokenKind::Arrow);
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }

    fn parse_arg_list(&mut self) -> Result<(Vec<ast::Expr>, SourcePos)> {
        self.expect_kind(TokenKind::LParen, "`(`")?;
        let mut args = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RParen) {
            args.push(self.parse_expr()?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        let rparen = self.expect_kind(TokenKind::RParen, "`)`")?;
        Ok((args, rparen.span.end))
    }

    fn skip_balanced(&mut self, open: TokenKind, close: TokenKind) {
        if !self.at_kind(open) {
            return;
        }
        self.bump();
        let mut depth = 1usize;
        while !self.is_eof() && depth > 0 {
            match self.peek().map(|t| t.kind) {
                Some(k) if k == open => depth += 1,
                Some(k) if k == close => depth -= 1,
                _ => {}
            }
            self.bump();
        }
    }
}

/// Collapses a `Name`/`FieldAccess` chain back into a dotted type name, for
/// class literals.
fn name_chain(expr: &ast::Expr) -> Option<(String, SourceSpan)> {
    match expr {
        ast::Expr::Name(name) => Some((name.name.clone(), name.span)),
        ast::Expr::FieldAccess(fa) => {
            let (base, base_span) = name_chain(&fa.receiver)?;
            Some((
                format!("{base}.{}", fa.name),
                SourceSpan::new(base_span.start, fa.name_span.end),
            ))
        }
        _ => None,
    }
}
