//! Tagged-variant AST for decompiled Java.
//!
//! Every node that the cross-reference resolver can link carries the span of
//! its *name* separately from the span of the whole node, so links cover the
//! identifier and nothing else.

use loupe_core::SourceSpan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationUnit {
    pub package: Option<PackageDecl>,
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDecl>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDecl {
    pub name: String,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub is_static: bool,
    pub is_star: bool,
    /// Dotted path without the trailing `.*`.
    pub path: String,
    /// Span of the dotted path, excluding `import`, `static`, and `;`.
    pub path_span: SourceSpan,
    pub span: SourceSpan,
}

impl ImportDecl {
    /// Last segment of the path; what an unqualified reference matches.
    pub fn simple_name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDecl {
    Class(ClassDecl),
    Interface(ClassDecl),
    Enum(ClassDecl),
    Annotation(ClassDecl),
}

impl TypeDecl {
    pub fn decl(&self) -> &ClassDecl {
        match self {
            TypeDecl::Class(decl)
            | TypeDecl::Interface(decl)
            | TypeDecl::Enum(decl)
            | TypeDecl::Annotation(decl) => decl,
        }
    }

    pub fn name(&self) -> &str {
        &self.decl().name
    }

    pub fn members(&self) -> &[MemberDecl] {
        &self.decl().members
    }
}

/// Shared shape for class, interface, enum, and annotation declarations.
/// `supers` holds the `extends` and `implements` entries in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    pub name: String,
    pub name_span: SourceSpan,
    pub supers: Vec<TypeRef>,
    pub members: Vec<MemberDecl>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberDecl {
    Field(FieldDecl),
    Method(MethodDecl),
    Constructor(ConstructorDecl),
    Initializer(InitializerDecl),
    Type(TypeDecl),
}

/// A type as written in source. `name` is the dotted base name with generic
/// arguments and array brackets stripped; `name_span` covers exactly that
/// dotted name. Generic arguments (including wildcard bounds) are flattened
/// into `args` so each nested reference can be linked on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub name: String,
    pub name_span: SourceSpan,
    pub args: Vec<TypeRef>,
    pub dims: u8,
    pub span: SourceSpan,
}

impl TypeRef {
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self.name.as_str(),
            "boolean" | "byte" | "short" | "int" | "long" | "char" | "float" | "double" | "void"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub ty: TypeRef,
    pub declarators: Vec<Declarator>,
    pub span: SourceSpan,
}

/// One declared name in a field or local declaration. `dims` counts C-style
/// brackets written after the name (`int a[]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declarator {
    pub name: String,
    pub name_span: SourceSpan,
    pub dims: u8,
    pub initializer: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub ty: TypeRef,
    pub name: String,
    pub name_span: SourceSpan,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub return_ty: TypeRef,
    pub name: String,
    pub name_span: SourceSpan,
    pub params: Vec<ParamDecl>,
    pub throws: Vec<TypeRef>,
    pub body: Option<Block>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorDecl {
    pub name: String,
    pub name_span: SourceSpan,
    pub params: Vec<ParamDecl>,
    pub throws: Vec<TypeRef>,
    pub body: Block,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializerDecl {
    pub is_static: bool,
    pub body: Block,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    LocalVar(LocalVarStmt),
    Expr(ExprStmt),
    If(IfStmt),
    While(WhileStmt),
    DoWhile(DoWhileStmt),
    For(ForStmt),
    ForEach(ForEachStmt),
    Switch(SwitchStmt),
    Try(TryStmt),
    Return(ReturnStmt),
    Throw(ThrowStmt),
    Synchronized(SynchronizedStmt),
    Labeled(LabeledStmt),
    Break(BranchStmt),
    Continue(BranchStmt),
    Assert(AssertStmt),
    Block(Block),
    /// A class declared inside a method body.
    LocalType(TypeDecl),
    Empty(SourceSpan),
}

impl Stmt {
    pub fn span(&self) -> SourceSpan {
        match self {
            Stmt::LocalVar(s) => s.span,
            Stmt::Expr(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::DoWhile(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::ForEach(s) => s.span,
            Stmt::Switch(s) => s.span,
            Stmt::Try(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Throw(s) => s.span,
            Stmt::Synchronized(s) => s.span,
            Stmt::Labeled(s) => s.span,
            Stmt::Break(s) | Stmt::Continue(s) => s.span,
            Stmt::Assert(s) => s.span,
            Stmt::Block(b) => b.span,
            Stmt::LocalType(t) => t.decl().span,
            Stmt::Empty(span) => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVarStmt {
    pub ty: TypeRef,
    pub declarators: Vec<Declarator>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Stmt>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoWhileStmt {
    pub body: Box<Stmt>,
    pub condition: Expr,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForInit {
    LocalVar(LocalVarStmt),
    Exprs(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForStmt {
    pub init: Option<ForInit>,
    pub condition: Option<Expr>,
    pub update: Vec<Expr>,
    pub body: Box<Stmt>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForEachStmt {
    pub ty: TypeRef,
    pub name: String,
    pub name_span: SourceSpan,
    pub iterable: Expr,
    pub body: Box<Stmt>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchStmt {
    pub scrutinee: Expr,
    pub cases: Vec<SwitchCase>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCase {
    pub labels: Vec<Expr>,
    pub is_default: bool,
    pub body: Vec<Stmt>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryStmt {
    pub resources: Vec<LocalVarStmt>,
    pub block: Block,
    pub catches: Vec<CatchClause>,
    pub finally_block: Option<Block>,
    pub span: SourceSpan,
}

/// Multi-catch keeps every alternative in `types`; the parameter binds a
/// usable declared type only when there is exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchClause {
    pub types: Vec<TypeRef>,
    pub name: String,
    pub name_span: SourceSpan,
    pub block: Block,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnStmt {
    pub expr: Option<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrowStmt {
    pub expr: Expr,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynchronizedStmt {
    pub lock: Expr,
    pub block: Block,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledStmt {
    pub label: String,
    pub stmt: Box<Stmt>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchStmt {
    pub label: Option<String>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertStmt {
    pub condition: Expr,
    pub message: Option<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Name(NameExpr),
    This(SourceSpan),
    Super(SourceSpan),
    Literal(LiteralExpr),
    Call(CallExpr),
    FieldAccess(FieldAccessExpr),
    ArrayAccess(ArrayAccessExpr),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    InstanceOf(InstanceOfExpr),
    Cast(CastExpr),
    Paren(ParenExpr),
    Assign(AssignExpr),
    Conditional(ConditionalExpr),
    New(NewExpr),
    NewArray(NewArrayExpr),
    ArrayInit(ArrayInitExpr),
    ClassLiteral(ClassLiteralExpr),
    Lambda(LambdaExpr),
    MethodRef(MethodRefExpr),
    ConstructorInvocation(ConstructorInvocationExpr),
}

impl Expr {
    pub fn span(&self) -> SourceSpan {
        match self {
            Expr::Name(e) => e.span,
            Expr::This(span) | Expr::Super(span) => *span,
            Expr::Literal(e) => e.span,
            Expr::Call(e) => e.span,
            Expr::FieldAccess(e) => e.span,
            Expr::ArrayAccess(e) => e.span,
            Expr::Unary(e) => e.span,
            Expr::Binary(e) => e.span,
            Expr::InstanceOf(e) => e.span,
            Expr::Cast(e) => e.span,
            Expr::Paren(e) => e.span,
            Expr::Assign(e) => e.span,
            Expr::Conditional(e) => e.span,
            Expr::New(e) => e.span,
            Expr::NewArray(e) => e.span,
            Expr::ArrayInit(e) => e.span,
            Expr::ClassLiteral(e) => e.span,
            Expr::Lambda(e) => e.span,
            Expr::MethodRef(e) => e.span,
            Expr::ConstructorInvocation(e) => e.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameExpr {
    pub name: String,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Number,
    String,
    Char,
    Bool,
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralExpr {
    pub kind: LiteralKind,
    pub text: String,
    pub span: SourceSpan,
}

/// A method call. `receiver` is `None` for a bare `name(...)` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpr {
    pub receiver: Option<Box<Expr>>,
    pub name: String,
    pub name_span: SourceSpan,
    pub args: Vec<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAccessExpr {
    pub receiver: Box<Expr>,
    pub name: String,
    pub name_span: SourceSpan,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayAccessExpr {
    pub array: Box<Expr>,
    pub index: Box<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    BitNot,
    Neg,
    Pos,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Box<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    UShr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceOfExpr {
    pub expr: Box<Expr>,
    pub ty: TypeRef,
    /// Pattern binding name, when present (`instanceof Foo f`).
    pub binding: Option<String>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastExpr {
    pub ty: TypeRef,
    pub expr: Box<Expr>,
    pub span: SourceSpan,
}

/// Parenthesized expression, kept as a node so `((Type) x).call()` keeps its
/// shape for receiver analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParenExpr {
    pub inner: Box<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignExpr {
    pub target: Box<Expr>,
    pub op: AssignOp,
    pub value: Box<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalExpr {
    pub condition: Box<Expr>,
    pub then_expr: Box<Expr>,
    pub else_expr: Box<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExpr {
    pub ty: TypeRef,
    pub args: Vec<Expr>,
    /// Anonymous class body, when present.
    pub body: Option<Vec<MemberDecl>>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArrayExpr {
    pub ty: TypeRef,
    pub dim_exprs: Vec<Expr>,
    /// Bracket pairs written without a size (`new int[2][]` has one).
    pub empty_dims: u8,
    pub init: Option<ArrayInitExpr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayInitExpr {
    pub elements: Vec<Expr>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLiteralExpr {
    pub ty: TypeRef,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaExpr {
    pub params: Vec<LambdaParam>,
    pub body: LambdaBody,
    pub span: SourceSpan,
}

/// Untyped parameters (`x -> ...`) carry no declared type; they still shadow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaParam {
    pub ty: Option<TypeRef>,
    pub name: String,
    pub name_span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRefExpr {
    pub receiver: Box<Expr>,
    /// Method name, or `"new"` for a constructor reference.
    pub name: String,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorTarget {
    This,
    Super,
}

/// Explicit constructor invocation statement body (`this(...)`/`super(...)`).
/// Not a method call; only its arguments are interesting to the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorInvocationExpr {
    pub target: ConstructorTarget,
    pub args: Vec<Expr>,
    pub span: SourceSpan,
}
