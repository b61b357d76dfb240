//! Import bindings and the type-reference candidate rule.

use loupe_core::SourceSpan;
use loupe_syntax::ast::CompilationUnit;

/// One single-type import. Static imports bind the same way; the raw import
/// list is scanned without distinguishing them, and a static member path
/// simply never matches a corpus class.
#[derive(Debug, Clone)]
pub struct ImportBinding {
    /// Last segment of the dotted path.
    pub simple_name: String,
    /// The dotted path rewritten with `/` separators, as the corpus keys
    /// classes.
    pub internal_name: String,
    /// Span of the dotted path in the import declaration.
    pub path_span: SourceSpan,
}

/// The single-type imports of one compilation unit, in declaration order.
/// Wildcard imports carry no simple name to bind and are skipped.
#[derive(Debug, Default)]
pub struct ImportTable {
    bindings: Vec<ImportBinding>,
}

impl ImportTable {
    pub fn from_unit(unit: &CompilationUnit) -> Self {
        let bindings = unit
            .imports
            .iter()
            .filter(|import| !import.is_star)
            .map(|import| ImportBinding {
                simple_name: import.simple_name().to_owned(),
                internal_name: import.path.replace('.', "/"),
                path_span: import.path_span,
            })
            .collect();
        Self { bindings }
    }

    pub fn bindings(&self) -> &[ImportBinding] {
        &self.bindings
    }

    /// Candidate internal names for a type name as written, deduplicated, in
    /// deterministic order: import matches first, `java.lang` last.
    ///
    /// A dotted name like `Outer.Inner` also matches an import of `Outer`,
    /// contributing the import's target with the remaining segments appended
    /// as nested-class separators (`Outer$Inner`).
    pub fn type_candidates(&self, written: &str) -> Vec<String> {
        let mut candidates = Vec::new();
        let simple = written.rsplit('.').next().unwrap_or(written);
        for binding in &self.bindings {
            if binding.simple_name == simple {
                push_unique(&mut candidates, binding.internal_name.clone());
            }
        }
        if let Some((first, rest)) = written.split_once('.') {
            for binding in &self.bindings {
                if binding.simple_name == first {
                    let nested = rest.replace('.', "$");
                    push_unique(&mut candidates, format!("{}${nested}", binding.internal_name));
                }
            }
        }
        push_unique(&mut candidates, format!("java/lang/{simple}"));
        candidates
    }

    /// Internal names of every binding with the given simple name.
    pub fn bindings_for(&self, simple: &str) -> Vec<String> {
        let mut out = Vec::new();
        for binding in &self.bindings {
            if binding.simple_name == simple {
                push_unique(&mut out, binding.internal_name.clone());
            }
        }
        out
    }
}

fn push_unique(out: &mut Vec<String>, candidate: String) {
    if !out.contains(&candidate) {
        out.push(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_for(source: &str) -> ImportTable {
        let unit = loupe_syntax::parse(source).unwrap();
        ImportTable::from_unit(&unit)
    }

    #[test]
    fn wildcard_imports_are_skipped_and_static_imports_kept() {
        let table = table_for(
            "import java.util.List;\n\
             import java.util.*;\n\
             import static java.lang.Math.max;\n\
             class A {}\n",
        );
        let simple: Vec<&str> = table.bindings().iter().map(|b| b.simple_name.as_str()).collect();
        assert_eq!(simple, vec!["List", "max"]);
        assert_eq!(table.bindings()[0].internal_name, "java/util/List");
        assert_eq!(table.bindings()[1].internal_name, "java/lang/Math/max");
    }

    #[test]
    fn simple_names_try_imports_then_java_lang() {
        let table = table_for("import java.util.List;\nclass A {}\n");
        assert_eq!(
            table.type_candidates("List"),
            vec!["java/util/List".to_string(), "java/lang/List".to_string()]
        );
        assert_eq!(table.type_candidates("Thread"), vec!["java/lang/Thread".to_string()]);
    }

    #[test]
    fn dotted_names_reach_through_an_outer_import() {
        let table = table_for("import acme.Box;\nclass A {}\n");
        assert_eq!(
            table.type_candidates("Box.Entry.Key"),
            vec!["acme/Box$Entry$Key".to_string(), "java/lang/Key".to_string()]
        );
    }

    #[test]
    fn candidates_never_repeat() {
        let table = table_for("import java.lang.String;\nclass A {}\n");
        assert_eq!(table.type_candidates("String"), vec!["java/lang/String".to_string()]);
    }

    #[test]
    fn bindings_for_collects_matching_imports() {
        let table = table_for("import acme.Console;\nimport other.Tool;\nclass A {}\n");
        assert_eq!(table.bindings_for("Console"), vec!["acme/Console".to_string()]);
        assert!(table.bindings_for("Missing").is_empty());
    }
}
