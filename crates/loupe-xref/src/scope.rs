//! Lexical binding frames for method-call receiver resolution.

use loupe_syntax::ast::TypeRef;

/// One declared local name. `ty` is `None` when the binding shadows without
/// a usable declared type, as untyped lambda parameters and multi-catch
/// parameters do.
#[derive(Debug, Clone)]
pub struct LocalBinding {
    pub name: String,
    pub ty: Option<TypeRef>,
}

/// Stack of binding frames, innermost last. Bindings only ever shadow; a
/// frame never replaces an outer binding, it just wins lookups while open.
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Vec<LocalBinding>>,
}

impl ScopeStack {
    pub fn push_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Declares into the innermost frame; without an open frame the binding
    /// is dropped.
    pub fn declare(&mut self, name: &str, ty: Option<TypeRef>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(LocalBinding {
                name: name.to_owned(),
                ty,
            });
        }
    }

    /// Innermost binding for `name`. Later declarations in one frame shadow
    /// earlier ones.
    pub fn lookup(&self, name: &str) -> Option<&LocalBinding> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.iter().rev().find(|binding| binding.name == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loupe_core::{SourcePos, SourceSpan};

    fn ty(name: &str) -> TypeRef {
        let span = SourceSpan::new(SourcePos::new(1, 1), SourcePos::new(1, 1));
        TypeRef {
            name: name.to_string(),
            name_span: span,
            args: Vec::new(),
            dims: 0,
            span,
        }
    }

    #[test]
    fn inner_frames_shadow_outer_ones() {
        let mut scopes = ScopeStack::default();
        scopes.push_frame();
        scopes.declare("x", Some(ty("Outer")));
        scopes.push_frame();
        scopes.declare("x", Some(ty("Inner")));

        let found = scopes.lookup("x").unwrap();
        assert_eq!(found.ty.as_ref().unwrap().name, "Inner");

        scopes.pop_frame();
        let found = scopes.lookup("x").unwrap();
        assert_eq!(found.ty.as_ref().unwrap().name, "Outer");
    }

    #[test]
    fn later_declarations_win_within_a_frame() {
        let mut scopes = ScopeStack::default();
        scopes.push_frame();
        scopes.declare("value", Some(ty("First")));
        scopes.declare("value", None);
        assert!(scopes.lookup("value").unwrap().ty.is_none());
    }

    #[test]
    fn popped_frames_release_their_bindings() {
        let mut scopes = ScopeStack::default();
        scopes.push_frame();
        scopes.declare("gone", Some(ty("T")));
        scopes.pop_frame();
        assert!(scopes.lookup("gone").is_none());
    }
}
