//! The cross-reference walker.
//!
//! The resolver walks a parsed compilation unit and probes the corpus for
//! every linkable reference. It is fail-closed throughout: a link is emitted
//! only when exactly one candidate class survives probing, so no link ever
//! points at a guess. References that cannot be resolved are skipped one by
//! one; nothing a single reference does can fail the document.

use loupe_classfile::parse_method_descriptor;
use loupe_core::{CancellationToken, SourceSpan};
use loupe_corpus::{ArchiveId, Corpus};
use loupe_syntax::ast;

use crate::document::SourceDocument;
use crate::imports::ImportTable;
use crate::link::{LinkAnchor, LinkTable, SymbolLink};
use crate::scope::ScopeStack;

/// Outcome of resolving one reference against the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one candidate survived corpus probing.
    Resolved {
        archive: ArchiveId,
        class_name: String,
    },
    /// No candidate is present in the corpus.
    Unresolved,
    /// More than one distinct class matched; linking would be a guess.
    Ambiguous,
    /// A construct the resolver recognizes but deliberately does not follow,
    /// such as a field-access receiver.
    Unsupported,
}

/// Resolves every linkable reference in a parsed compilation unit.
///
/// Import links come first, then links in the order the walk visits them.
/// The cancellation token is consulted between top-level type declarations;
/// a cancelled walk returns whatever was collected so far and the caller is
/// expected to discard it.
pub fn resolve_links(
    document: &SourceDocument,
    unit: &ast::CompilationUnit,
    corpus: &Corpus,
    cancel: &CancellationToken,
) -> LinkTable {
    let resolver = Resolver {
        document,
        corpus,
        imports: ImportTable::from_unit(unit),
        scopes: ScopeStack::default(),
        enclosing: Vec::new(),
        links: LinkTable::default(),
        cancel: cancel.clone(),
    };
    resolver.run(unit)
}

struct Resolver<'a> {
    document: &'a SourceDocument,
    corpus: &'a Corpus,
    imports: ImportTable,
    scopes: ScopeStack,
    /// Internal names of the enclosing type declarations, innermost last.
    /// Anonymous class bodies do not push; their members stay attributed to
    /// the nearest named enclosing type.
    enclosing: Vec<String>,
    links: LinkTable,
    cancel: CancellationToken,
}

impl Resolver<'_> {
    fn run(mut self, unit: &ast::CompilationUnit) -> LinkTable {
        self.link_imports();
        for decl in &unit.types {
            if self.cancel.is_cancelled() {
                tracing::debug!(
                    class = %self.document.class_name(),
                    "cross-reference walk cancelled"
                );
                break;
            }
            let internal = self.top_level_internal(decl.name());
            self.walk_type_decl(decl, internal);
        }
        self.links
    }

    fn link_imports(&mut self) {
        let bindings = self.imports.bindings().to_vec();
        for binding in bindings {
            if let Resolution::Resolved {
                archive,
                class_name,
            } = self.probe(std::slice::from_ref(&binding.internal_name))
            {
                self.push_link(binding.path_span, archive, class_name, None);
            }
        }
    }

    /// A top-level type with the document's own simple name is the document's
    /// class; sibling top-level types sit in the same package.
    fn top_level_internal(&self, name: &str) -> String {
        let doc = self.document.class_name();
        if simple_name(doc) == name {
            return doc.to_owned();
        }
        match doc.rsplit_once('/') {
            Some((package, _)) => format!("{package}/{name}"),
            None => name.to_owned(),
        }
    }

    fn nested_internal(&self, name: &str) -> String {
        match self.enclosing.last() {
            Some(outer) => format!("{outer}${name}"),
            None => self.top_level_internal(name),
        }
    }

    fn walk_type_decl(&mut self, decl: &ast::TypeDecl, internal: String) {
        let class = decl.decl();
        self.enclosing.push(internal);
        for superty in &class.supers {
            self.handle_type_ref(superty);
        }
        for member in &class.members {
            self.walk_member(member);
        }
        self.enclosing.pop();
    }

    fn walk_member(&mut self, member: &ast::MemberDecl) {
        match member {
            ast::MemberDecl::Field(field) => {
                self.handle_type_ref(&field.ty);
                for declarator in &field.declarators {
                    if let Some(init) = &declarator.initializer {
                        self.walk_expr(init);
                    }
                }
            }
            ast::MemberDecl::Method(method) => {
                self.handle_type_ref(&method.return_ty);
                self.walk_callable(&method.params, &method.throws, method.body.as_ref());
            }
            ast::MemberDecl::Constructor(ctor) => {
                self.walk_callable(&ctor.params, &ctor.throws, Some(&ctor.body));
            }
            ast::MemberDecl::Initializer(init) => {
                self.scopes.push_frame();
                for stmt in &init.body.statements {
                    self.walk_stmt(stmt);
                }
                self.scopes.pop_frame();
            }
            ast::MemberDecl::Type(nested) => {
                let internal = self.nested_internal(nested.name());
                self.walk_type_decl(nested, internal);
            }
        }
    }

    fn walk_callable(
        &mut self,
        params: &[ast::ParamDecl],
        throws: &[ast::TypeRef],
        body: Option<&ast::Block>,
    ) {
        self.scopes.push_frame();
        for param in params {
            self.handle_type_ref(&param.ty);
            self.scopes.declare(&param.name, Some(param.ty.clone()));
        }
        for thrown in throws {
            self.handle_type_ref(thrown);
        }
        if let Some(body) = body {
            for stmt in &body.statements {
                self.walk_stmt(stmt);
            }
        }
        self.scopes.pop_frame();
    }

    fn walk_block(&mut self, block: &ast::Block) {
        self.scopes.push_frame();
        for stmt in &block.statements {
            self.walk_stmt(stmt);
        }
        self.scopes.pop_frame();
    }

    fn walk_stmt(&mut self, stmt: &ast::Stmt) {
        match stmt {
            ast::Stmt::LocalVar(local) => self.walk_local_var(local),
            ast::Stmt::Expr(stmt) => self.walk_expr(&stmt.expr),
            ast::Stmt::If(stmt) => {
                self.walk_expr(&stmt.condition);
                self.walk_stmt(&stmt.then_branch);
                if let Some(else_branch) = &stmt.else_branch {
                    self.walk_stmt(else_branch);
                }
            }
            ast::Stmt::While(stmt) => {
                self.walk_expr(&stmt.condition);
                self.walk_stmt(&stmt.body);
            }
            ast::Stmt::DoWhile(stmt) => {
                self.walk_stmt(&stmt.body);
                self.walk_expr(&stmt.condition);
            }
            ast::Stmt::For(stmt) => {
                self.scopes.push_frame();
                match &stmt.init {
                    Some(ast::ForInit::LocalVar(local)) => self.walk_local_var(local),
                    Some(ast::ForInit::Exprs(exprs)) => {
                        for expr in exprs {
                            self.walk_expr(expr);
                        }
                    }
                    None => {}
                }
                if let Some(condition) = &stmt.condition {
                    self.walk_expr(condition);
                }
                for update in &stmt.update {
                    self.walk_expr(update);
                }
                self.walk_stmt(&stmt.body);
                self.scopes.pop_frame();
            }
            ast::Stmt::ForEach(stmt) => {
                self.scopes.push_frame();
                self.handle_type_ref(&stmt.ty);
                self.walk_expr(&stmt.iterable);
                self.scopes.declare(&stmt.name, Some(stmt.ty.clone()));
                self.walk_stmt(&stmt.body);
                self.scopes.pop_frame();
            }
            ast::Stmt::Switch(stmt) => {
                self.walk_expr(&stmt.scrutinee);
                self.scopes.push_frame();
                for case in &stmt.cases {
                    for label in &case.labels {
                        self.walk_expr(label);
                    }
                    for stmt in &case.body {
                        self.walk_stmt(stmt);
                    }
                }
                self.scopes.pop_frame();
            }
            ast::Stmt::Try(stmt) => self.walk_try(stmt),
            ast::Stmt::Return(stmt) => {
                if let Some(expr) = &stmt.expr {
                    self.walk_expr(expr);
                }
            }
            ast::Stmt::Throw(stmt) => self.walk_expr(&stmt.expr),
            ast::Stmt::Synchronized(stmt) => {
                self.walk_expr(&stmt.lock);
                self.walk_block(&stmt.block);
            }
            ast::Stmt::Labeled(stmt) => self.walk_stmt(&stmt.stmt),
            ast::Stmt::Break(_) | ast::Stmt::Continue(_) => {}
            ast::Stmt::Assert(stmt) => {
                self.walk_expr(&stmt.condition);
                if let Some(message) = &stmt.message {
                    self.walk_expr(message);
                }
            }
            ast::Stmt::Block(block) => self.walk_block(block),
            ast::Stmt::LocalType(decl) => {
                let internal = self.nested_internal(decl.name());
                self.walk_type_decl(decl, internal);
            }
            ast::Stmt::Empty(_) => {}
        }
    }

    fn walk_local_var(&mut self, local: &ast::LocalVarStmt) {
        self.handle_type_ref(&local.ty);
        for declarator in &local.declarators {
            if let Some(init) = &declarator.initializer {
                self.walk_expr(init);
            }
            let ty = declared_type(&local.ty, declarator.dims);
            self.scopes.declare(&declarator.name, Some(ty));
        }
    }

    fn walk_try(&mut self, stmt: &ast::TryStmt) {
        self.scopes.push_frame();
        for resource in &stmt.resources {
            self.walk_local_var(resource);
        }
        self.walk_block(&stmt.block);
        self.scopes.pop_frame();
        for catch in &stmt.catches {
            self.scopes.push_frame();
            for ty in &catch.types {
                self.handle_type_ref(ty);
            }
            let bound = match catch.types.as_slice() {
                [only] => Some(only.clone()),
                _ => None,
            };
            self.scopes.declare(&catch.name, bound);
            for inner in &catch.block.statements {
                self.walk_stmt(inner);
            }
            self.scopes.pop_frame();
        }
        if let Some(finally_block) = &stmt.finally_block {
            self.walk_block(finally_block);
        }
    }

    fn walk_expr(&mut self, expr: &ast::Expr) {
        match expr {
            ast::Expr::Name(_)
            | ast::Expr::This(_)
            | ast::Expr::Super(_)
            | ast::Expr::Literal(_) => {}
            ast::Expr::Call(call) => {
                self.handle_call(call);
            }
            ast::Expr::FieldAccess(field) => self.walk_expr(&field.receiver),
            ast::Expr::ArrayAccess(access) => {
                self.walk_expr(&access.array);
                self.walk_expr(&access.index);
            }
            ast::Expr::Unary(unary) => self.walk_expr(&unary.operand),
            ast::Expr::Binary(binary) => {
                self.walk_expr(&binary.lhs);
                self.walk_expr(&binary.rhs);
            }
            ast::Expr::InstanceOf(test) => {
                self.walk_expr(&test.expr);
                self.handle_type_ref(&test.ty);
                if let Some(binding) = &test.binding {
                    self.scopes.declare(binding, Some(test.ty.clone()));
                }
            }
            ast::Expr::Cast(cast) => {
                self.handle_type_ref(&cast.ty);
                self.walk_expr(&cast.expr);
            }
            ast::Expr::Paren(paren) => self.walk_expr(&paren.inner),
            ast::Expr::Assign(assign) => {
                self.walk_expr(&assign.target);
                self.walk_expr(&assign.value);
            }
            ast::Expr::Conditional(cond) => {
                self.walk_expr(&cond.condition);
                self.walk_expr(&cond.then_expr);
                self.walk_expr(&cond.else_expr);
            }
            ast::Expr::New(new) => {
                self.handle_type_ref(&new.ty);
                for arg in &new.args {
                    self.walk_expr(arg);
                }
                if let Some(body) = &new.body {
                    for member in body {
                        self.walk_member(member);
                    }
                }
            }
            ast::Expr::NewArray(new) => {
                self.handle_type_ref(&new.ty);
                for dim in &new.dim_exprs {
                    self.walk_expr(dim);
                }
                if let Some(init) = &new.init {
                    for element in &init.elements {
                        self.walk_expr(element);
                    }
                }
            }
            ast::Expr::ArrayInit(init) => {
                for element in &init.elements {
                    self.walk_expr(element);
                }
            }
            ast::Expr::ClassLiteral(literal) => self.handle_type_ref(&literal.ty),
            ast::Expr::Lambda(lambda) => {
                self.scopes.push_frame();
                for param in &lambda.params {
                    if let Some(ty) = &param.ty {
                        self.handle_type_ref(ty);
                    }
                    self.scopes.declare(&param.name, param.ty.clone());
                }
                match &lambda.body {
                    ast::LambdaBody::Expr(expr) => self.walk_expr(expr),
                    ast::LambdaBody::Block(block) => {
                        for stmt in &block.statements {
                            self.walk_stmt(stmt);
                        }
                    }
                }
                self.scopes.pop_frame();
            }
            ast::Expr::MethodRef(method_ref) => self.walk_expr(&method_ref.receiver),
            ast::Expr::ConstructorInvocation(invocation) => {
                for arg in &invocation.args {
                    self.walk_expr(arg);
                }
            }
        }
    }

    /// Emits a link when a written type resolves to exactly one corpus class.
    /// Generic arguments link recursively on their own names; primitives have
    /// no class to target. Array brackets do not stop the element type from
    /// linking.
    fn handle_type_ref(&mut self, ty: &ast::TypeRef) {
        if !ty.is_primitive() {
            let candidates = self.imports.type_candidates(&ty.name);
            if let Resolution::Resolved {
                archive,
                class_name,
            } = self.probe(&candidates)
            {
                let anchor = LinkAnchor::Type(simple_name(&class_name).to_owned());
                self.push_link(ty.name_span, archive, class_name, Some(anchor));
            }
        }
        for arg in &ty.args {
            self.handle_type_ref(arg);
        }
    }

    /// Resolves one call, emitting a link over the method name when the
    /// receiver pins down exactly one class. Returns the internal name of the
    /// located method's return type so call chains can keep resolving; void,
    /// primitive, and array returns end the chain.
    fn handle_call(&mut self, call: &ast::CallExpr) -> Option<String> {
        let resolution = self.resolve_receiver(call.receiver.as_deref());
        let mut propagated = None;
        if let Resolution::Resolved {
            archive,
            class_name,
        } = resolution
        {
            let located = self.locate_member(archive, class_name, &call.name);
            propagated = located.return_class.clone();
            let anchor = LinkAnchor::Method(call.name.clone());
            self.push_link(call.name_span, located.archive, located.class_name, Some(anchor));
        }
        for arg in &call.args {
            self.walk_expr(arg);
        }
        propagated
    }

    /// Maps a receiver expression to the class its methods belong to. Also
    /// walks any sub-expressions the main walk will not see again, so links
    /// inside receivers are emitted exactly once.
    fn resolve_receiver(&mut self, receiver: Option<&ast::Expr>) -> Resolution {
        match receiver {
            None | Some(ast::Expr::This(_)) => self.enclosing_resolution(),
            Some(ast::Expr::Super(_)) => self.super_resolution(),
            Some(ast::Expr::Name(name)) => self.named_receiver_resolution(&name.name),
            Some(ast::Expr::Call(inner)) => match self.handle_call(inner) {
                Some(class_name) => self.probe(std::slice::from_ref(&class_name)),
                None => Resolution::Unresolved,
            },
            Some(ast::Expr::Paren(paren)) => match paren.inner.as_ref() {
                ast::Expr::Cast(cast) => {
                    self.handle_type_ref(&cast.ty);
                    self.walk_expr(&cast.expr);
                    if cast.ty.is_primitive() || cast.ty.dims > 0 {
                        Resolution::Unresolved
                    } else {
                        let candidates = self.imports.type_candidates(&cast.ty.name);
                        self.probe(&candidates)
                    }
                }
                inner => {
                    self.walk_expr(inner);
                    Resolution::Unsupported
                }
            },
            Some(ast::Expr::FieldAccess(field)) => {
                // Field chains carry no declared type the resolver trusts.
                self.walk_expr(&field.receiver);
                Resolution::Unsupported
            }
            Some(other) => {
                self.walk_expr(other);
                Resolution::Unsupported
            }
        }
    }

    /// Bare calls and `this.` calls target the innermost enclosing type.
    fn enclosing_resolution(&self) -> Resolution {
        match self.enclosing.last() {
            Some(internal) => self.probe(std::slice::from_ref(internal)),
            None => Resolution::Unresolved,
        }
    }

    /// `super.` calls follow the enclosing class's superclass as recorded in
    /// its own class bytes; without that metadata there is nothing to link.
    fn super_resolution(&self) -> Resolution {
        let Some(internal) = self.enclosing.last() else {
            return Resolution::Unresolved;
        };
        let Some((_, entry)) = self.corpus.find(internal, self.document.archive()) else {
            return Resolution::Unresolved;
        };
        let Some(structure) = entry.structure() else {
            tracing::debug!(class = %internal, "no structural metadata for super call");
            return Resolution::Unresolved;
        };
        match &structure.super_class {
            Some(super_name) => self.probe(std::slice::from_ref(super_name)),
            None => Resolution::Unresolved,
        }
    }

    /// Simple-name receivers go through a fixed priority chain. The first
    /// stage that applies fixes the candidate set, even when that set turns
    /// out empty: a local binding with a primitive, array, or unusable type
    /// still shadows everything below it.
    fn named_receiver_resolution(&self, name: &str) -> Resolution {
        if let Some(binding) = self.scopes.lookup(name) {
            let Some(ty) = &binding.ty else {
                return Resolution::Unresolved;
            };
            if ty.is_primitive() || ty.dims > 0 {
                return Resolution::Unresolved;
            }
            let candidates = self.imports.type_candidates(&ty.name);
            return self.probe(&candidates);
        }
        if let Some(internal) = self.enclosing.last() {
            if simple_name(internal) == name {
                return self.probe(std::slice::from_ref(internal));
            }
        }
        let imported = self.imports.bindings_for(name);
        if !imported.is_empty() {
            return self.probe(&imported);
        }
        self.probe(&[format!("java/lang/{name}")])
    }

    /// Probes candidates against the corpus, preferring the document's own
    /// archive. Exactly one surviving class resolves; two or more distinct
    /// hits are ambiguous and nothing is linked.
    fn probe(&self, candidates: &[String]) -> Resolution {
        let mut hit: Option<(ArchiveId, String)> = None;
        for candidate in candidates {
            let Some((id, _)) = self.corpus.find(candidate, self.document.archive()) else {
                continue;
            };
            match &hit {
                None => hit = Some((id, candidate.clone())),
                Some((_, existing)) if existing != candidate => {
                    tracing::debug!(
                        first = %existing,
                        second = %candidate,
                        "ambiguous reference, not linking"
                    );
                    return Resolution::Ambiguous;
                }
                Some(_) => {}
            }
        }
        match hit {
            Some((archive, class_name)) => Resolution::Resolved {
                archive,
                class_name,
            },
            None => Resolution::Unresolved,
        }
    }

    /// Searches the statically resolved class and then its superclass chain
    /// for a method with the call's name, matching by name alone. A hit
    /// retargets the link at the declaring class; a miss, or metadata missing
    /// anywhere along the chain, keeps the original target. `java/lang/Object`
    /// is searched like any other class and ends the walk.
    fn locate_member(&self, archive: ArchiveId, class_name: String, method: &str) -> LocatedMember {
        let mut current_archive = archive;
        let mut current_class = class_name.clone();
        let mut visited: Vec<String> = Vec::new();
        loop {
            let Some((found_archive, entry)) =
                self.corpus.find(&current_class, Some(current_archive))
            else {
                break;
            };
            let Some(structure) = entry.structure() else {
                tracing::debug!(
                    class = %current_class,
                    "no structural metadata, keeping static target"
                );
                break;
            };
            if let Some(info) = structure.method_named(method) {
                let return_class = parse_method_descriptor(&info.descriptor)
                    .ok()
                    .and_then(|desc| desc.return_type.class_name().map(str::to_owned));
                return LocatedMember {
                    archive: found_archive,
                    class_name: current_class,
                    return_class,
                };
            }
            if current_class == "java/lang/Object" {
                break;
            }
            let Some(super_name) = structure.super_class.clone() else {
                break;
            };
            visited.push(current_class);
            if visited.iter().any(|seen| *seen == super_name) {
                // Corrupt hierarchies can cycle.
                break;
            }
            match self.corpus.find(&super_name, self.document.archive()) {
                Some((id, _)) => {
                    current_archive = id;
                    current_class = super_name;
                }
                None => break,
            }
        }
        LocatedMember {
            archive,
            class_name,
            return_class: None,
        }
    }

    fn push_link(
        &mut self,
        span: SourceSpan,
        archive: ArchiveId,
        class_name: String,
        anchor: Option<LinkAnchor>,
    ) {
        let index = self.document.index();
        let (start_offset, end_offset) = match (index.offset(span.start), index.offset(span.end)) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(err), _) | (_, Err(err)) => {
                tracing::debug!(span = ?span, error = %err, "span outside the document, skipping link");
                return;
            }
        };
        let Some(archive_name) = self.corpus.archive(archive).map(|a| a.name().to_owned()) else {
            return;
        };
        self.links.push(SymbolLink {
            start_offset,
            end_offset,
            line: span.start.line,
            column: span.start.col,
            archive: archive_name,
            class_name,
            anchor,
        });
    }
}

struct LocatedMember {
    archive: ArchiveId,
    class_name: String,
    /// Internal name of the method's return type, for object returns only.
    return_class: Option<String>,
}

/// Last `/` segment, then the last `$` segment of that.
fn simple_name(internal: &str) -> &str {
    let tail = internal.rsplit('/').next().unwrap_or(internal);
    tail.rsplit('$').next().unwrap_or(tail)
}

/// The effective declared type of one declarator, with C-style brackets
/// written after the name (`int a[]`) folded into the dimension count.
fn declared_type(ty: &ast::TypeRef, extra_dims: u8) -> ast::TypeRef {
    let mut ty = ty.clone();
    ty.dims = ty.dims.saturating_add(extra_dims);
    ty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_names_strip_packages_and_nesting() {
        assert_eq!(simple_name("java/util/List"), "List");
        assert_eq!(simple_name("demo/Outer$Inner"), "Inner");
        assert_eq!(simple_name("TopLevel"), "TopLevel");
    }
}
