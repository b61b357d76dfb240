//! End-to-end resolution scenarios over in-memory corpora.

use loupe_core::CancellationToken;
use loupe_corpus::Corpus;
use loupe_testing::ClassFileBuilder;
use loupe_xref::{resolve_links, resolve_source, LinkAnchor, LinkTable, SourceDocument, SymbolLink};

fn resolve(document: &SourceDocument, corpus: &Corpus) -> LinkTable {
    let unit = loupe_syntax::parse(document.text()).unwrap();
    resolve_links(document, &unit, corpus, &CancellationToken::new())
}

fn classes(links: &LinkTable) -> Vec<&str> {
    links.links().iter().map(|l| l.class_name.as_str()).collect()
}

fn method_link<'a>(links: &'a LinkTable, name: &str) -> Option<&'a SymbolLink> {
    links
        .links()
        .iter()
        .find(|l| l.anchor == Some(LinkAnchor::Method(name.to_string())))
}

#[test]
fn imported_types_link_to_their_archive() {
    let mut corpus = Corpus::new();
    let app = corpus.add_classes(
        "app.jar",
        vec![(
            "com/app/Main".to_string(),
            ClassFileBuilder::new("com/app/Main").build(),
        )],
    );
    corpus.add_classes(
        "helpers.jar",
        vec![(
            "com/util/Helper".to_string(),
            ClassFileBuilder::new("com/util/Helper").method("assist", "()V").build(),
        )],
    );

    let source = "\
package com.app;

import com.util.Helper;

public class Main {
    Helper helper;
}
";
    let document = SourceDocument::new(source, "com/app/Main", Some(app));
    let links = resolve(&document, &corpus);

    // One link over the import path, one over the field's declared type.
    assert_eq!(classes(&links), vec!["com/util/Helper", "com/util/Helper"]);
    assert!(links.links().iter().all(|l| l.archive == "helpers.jar"));

    let import = &links.links()[0];
    assert_eq!(import.anchor, None);
    assert_eq!((import.line, import.column), (3, 8));
    assert_eq!((import.start_offset, import.end_offset), (25, 40));
    // ASCII text, so character offsets index the str directly.
    assert_eq!(
        &document.text()[import.start_offset..import.end_offset],
        "com.util.Helper"
    );

    let field = &links.links()[1];
    assert_eq!(field.anchor, Some(LinkAnchor::Type("Helper".to_string())));
    assert_eq!((field.line, field.column), (6, 5));
}

#[test]
fn ambiguous_references_produce_no_link() {
    let mut corpus = Corpus::new();
    let app = corpus.add_classes(
        "app.jar",
        vec![("demo/Main".to_string(), ClassFileBuilder::new("demo/Main").build())],
    );
    corpus.add_classes(
        "collections.jar",
        vec![("acme/List".to_string(), ClassFileBuilder::new("acme/List").build())],
    );
    corpus.add_classes(
        "runtime.jar",
        vec![(
            "java/lang/List".to_string(),
            ClassFileBuilder::new("java/lang/List").build(),
        )],
    );

    let source = "\
package demo;

import acme.List;

public class Main {
    List items;
}
";
    let document = SourceDocument::new(source, "demo/Main", Some(app));
    let links = resolve(&document, &corpus);

    // The import path names exactly one class and still links; the `List`
    // use matches two distinct classes and is dropped rather than guessed.
    assert_eq!(classes(&links), vec!["acme/List"]);
    assert_eq!(links.links()[0].anchor, None);
}

#[test]
fn local_bindings_shadow_imports_for_receivers() {
    let mut corpus = Corpus::new();
    let app = corpus.add_classes(
        "app.jar",
        vec![(
            "demo/Main".to_string(),
            ClassFileBuilder::new("demo/Main")
                .method("open", "()Ltools/Printer;")
                .build(),
        )],
    );
    corpus.add_classes(
        "lib.jar",
        vec![(
            "acme/Console".to_string(),
            ClassFileBuilder::new("acme/Console").method("log", "()V").build(),
        )],
    );
    corpus.add_classes(
        "tools.jar",
        vec![(
            "tools/Printer".to_string(),
            ClassFileBuilder::new("tools/Printer").method("log", "()V").build(),
        )],
    );

    // The local named `Console` shadows the imported `acme.Console`, so the
    // call resolves against its declared type instead.
    let source = "\
package demo;

import acme.Console;
import tools.Printer;

public class Main {
    void run() {
        Printer Console = open();
        Console.log();
    }

    Printer open() {
        return null;
    }
}
";
    let document = SourceDocument::new(source, "demo/Main", Some(app));
    let links = resolve(&document, &corpus);

    let log = method_link(&links, "log").unwrap();
    assert_eq!(log.class_name, "tools/Printer");
    assert_eq!(log.archive, "tools.jar");

    let open = method_link(&links, "open").unwrap();
    assert_eq!(open.class_name, "demo/Main");
}

#[test]
fn chained_calls_follow_object_return_types() {
    let mut corpus = Corpus::new();
    let app = corpus.add_classes(
        "app.jar",
        vec![
            (
                "demo/Main".to_string(),
                ClassFileBuilder::new("demo/Main")
                    .method("engine", "()Ldemo/Engine;")
                    .build(),
            ),
            (
                "demo/Engine".to_string(),
                ClassFileBuilder::new("demo/Engine")
                    .method("start", "()V")
                    .method("stop", "()V")
                    .build(),
            ),
        ],
    );

    let source = "\
package demo;

public class Main {
    Engine engine() {
        return null;
    }

    void run() {
        engine().start();
        engine().stop().start();
    }
}
";
    let document = SourceDocument::new(source, "demo/Main", Some(app));
    let links = resolve(&document, &corpus);

    // `engine()` resolves twice, `start` once through the decoded return
    // type, `stop` once; the `start` after the void `stop` cannot resolve.
    assert_eq!(
        classes(&links),
        vec!["demo/Main", "demo/Engine", "demo/Main", "demo/Engine"]
    );
    let start_links = links
        .links()
        .iter()
        .filter(|l| l.anchor == Some(LinkAnchor::Method("start".to_string())))
        .count();
    assert_eq!(start_links, 1);
    assert_eq!(method_link(&links, "stop").unwrap().class_name, "demo/Engine");
}

#[test]
fn unparseable_text_is_annotated_instead_of_linked() {
    let corpus = Corpus::new();
    let document = SourceDocument::new("this is not java at all {{{", "demo/Broken", None);

    let resolved = resolve_source(&document, &corpus, &CancellationToken::new());

    assert!(resolved.links.is_empty());
    assert!(resolved.text.starts_with("/*\n * Hyperlinks are disabled"));
    assert!(resolved.text.contains("this is not java at all {{{"));
    assert!(resolved.text.contains(" at 1:"));
    assert!(resolved.text.ends_with(" */\n"));
}

#[test]
fn super_calls_follow_recorded_superclasses() {
    let mut corpus = Corpus::new();
    let app = corpus.add_classes(
        "app.jar",
        vec![
            (
                "demo/Child".to_string(),
                ClassFileBuilder::new("demo/Child")
                    .super_class("demo/Base")
                    .method("greet", "()V")
                    .build(),
            ),
            (
                "demo/Base".to_string(),
                ClassFileBuilder::new("demo/Base").method("greet", "()V").build(),
            ),
        ],
    );

    // No `extends` is written; the superclass comes from the class bytes.
    let source = "\
package demo;

public class Child {
    void greet() {
        super.greet();
    }
}
";
    let document = SourceDocument::new(source, "demo/Child", Some(app));
    let links = resolve(&document, &corpus);

    assert_eq!(classes(&links), vec!["demo/Base"]);
    assert_eq!(
        links.links()[0].anchor,
        Some(LinkAnchor::Method("greet".to_string()))
    );
}

#[test]
fn member_lookup_retargets_to_the_declaring_class() {
    let mut corpus = Corpus::new();
    let app = corpus.add_classes(
        "app.jar",
        vec![
            ("demo/Main".to_string(), ClassFileBuilder::new("demo/Main").build()),
            (
                "demo/Helper".to_string(),
                ClassFileBuilder::new("demo/Helper")
                    .super_class("demo/BaseHelper")
                    .build(),
            ),
        ],
    );
    corpus.add_classes(
        "base.jar",
        vec![(
            "demo/BaseHelper".to_string(),
            ClassFileBuilder::new("demo/BaseHelper").method("close", "()V").build(),
        )],
    );

    let source = "\
package demo;

import demo.Helper;

public class Main {
    void run(Helper helper) {
        helper.close();
    }
}
";
    let document = SourceDocument::new(source, "demo/Main", Some(app));
    let links = resolve(&document, &corpus);

    // `close` is declared on the superclass, so the link lands there even
    // though the receiver's declared type is `Helper`.
    let close = method_link(&links, "close").unwrap();
    assert_eq!(close.class_name, "demo/BaseHelper");
    assert_eq!(close.archive, "base.jar");
}

#[test]
fn lookups_prefer_the_documents_own_archive() {
    let mut corpus = Corpus::new();
    let first = corpus.add_classes(
        "first.jar",
        vec![
            ("demo/Main".to_string(), ClassFileBuilder::new("demo/Main").build()),
            ("demo/Shared".to_string(), ClassFileBuilder::new("demo/Shared").build()),
        ],
    );
    let second = corpus.add_classes(
        "second.jar",
        vec![
            ("demo/Main".to_string(), ClassFileBuilder::new("demo/Main").build()),
            ("demo/Shared".to_string(), ClassFileBuilder::new("demo/Shared").build()),
        ],
    );

    let source = "\
package demo;

import demo.Shared;

public class Main {
    Shared shared;
}
";

    let from_second = SourceDocument::new(source, "demo/Main", Some(second));
    let links = resolve(&from_second, &corpus);
    assert!(links.links().iter().all(|l| l.archive == "second.jar"));

    let from_first = SourceDocument::new(source, "demo/Main", Some(first));
    let links = resolve(&from_first, &corpus);
    assert!(links.links().iter().all(|l| l.archive == "first.jar"));

    // Without an owning archive the earliest loaded one wins.
    let unowned = SourceDocument::new(source, "demo/Main", None);
    let links = resolve(&unowned, &corpus);
    assert!(links.links().iter().all(|l| l.archive == "first.jar"));
}

#[test]
fn dotted_nested_names_reach_through_outer_imports() {
    let mut corpus = Corpus::new();
    let app = corpus.add_classes(
        "app.jar",
        vec![("demo/Main".to_string(), ClassFileBuilder::new("demo/Main").build())],
    );
    corpus.add_classes(
        "util.jar",
        vec![
            ("util/Box".to_string(), ClassFileBuilder::new("util/Box").build()),
            ("util/Box$Entry".to_string(), ClassFileBuilder::new("util/Box$Entry").build()),
        ],
    );

    let source = "\
package demo;

import util.Box;

public class Main {
    Box.Entry entry;
}
";
    let document = SourceDocument::new(source, "demo/Main", Some(app));
    let links = resolve(&document, &corpus);

    assert_eq!(classes(&links), vec!["util/Box", "util/Box$Entry"]);
    let entry = &links.links()[1];
    assert_eq!(entry.anchor, Some(LinkAnchor::Type("Entry".to_string())));
    // The link covers the whole dotted `Box.Entry` name.
    assert_eq!(entry.end_offset - entry.start_offset, "Box.Entry".len());
}

#[test]
fn receivers_by_enclosing_and_nested_class_names() {
    let mut corpus = Corpus::new();
    let app = corpus.add_classes(
        "app.jar",
        vec![
            (
                "demo/Outer".to_string(),
                ClassFileBuilder::new("demo/Outer")
                    .method("run", "()V")
                    .method("create", "()V")
                    .method("touch", "()V")
                    .build(),
            ),
            (
                "demo/Outer$Inner".to_string(),
                ClassFileBuilder::new("demo/Outer$Inner").method("poke", "()V").build(),
            ),
        ],
    );

    let source = "\
package demo;

public class Outer {
    void run() {
        Outer.create();
    }

    static void create() {
    }

    void touch() {
    }

    class Inner {
        void poke() {
            touch();
        }
    }
}
";
    let document = SourceDocument::new(source, "demo/Outer", Some(app));
    let links = resolve(&document, &corpus);

    // The enclosing class referred to by its own simple name.
    assert_eq!(method_link(&links, "create").unwrap().class_name, "demo/Outer");

    // A bare call inside a nested class stays on the nested class; member
    // lookup walks superclasses, not enclosing classes.
    assert_eq!(
        method_link(&links, "touch").unwrap().class_name,
        "demo/Outer$Inner"
    );
}

#[test]
fn cast_receivers_use_the_cast_type() {
    let mut corpus = Corpus::new();
    let app = corpus.add_classes(
        "app.jar",
        vec![("demo/Main".to_string(), ClassFileBuilder::new("demo/Main").build())],
    );
    corpus.add_classes(
        "acme.jar",
        vec![(
            "acme/Runner".to_string(),
            ClassFileBuilder::new("acme/Runner").method("go", "()V").build(),
        )],
    );

    let source = "\
package demo;

import acme.Runner;

public class Main {
    void run(Object o) {
        ((Runner) o).go();
    }
}
";
    let document = SourceDocument::new(source, "demo/Main", Some(app));
    let links = resolve(&document, &corpus);

    // Import link first, then the cast type, then the call on it.
    assert_eq!(classes(&links), vec!["acme/Runner", "acme/Runner", "acme/Runner"]);
    let anchors: Vec<_> = links.links().iter().map(|l| l.anchor.clone()).collect();
    assert_eq!(
        anchors,
        vec![
            None,
            Some(LinkAnchor::Type("Runner".to_string())),
            Some(LinkAnchor::Method("go".to_string())),
        ]
    );
}

#[test]
fn anonymous_bodies_attribute_to_the_named_enclosing_class() {
    let mut corpus = Corpus::new();
    let app = corpus.add_classes(
        "app.jar",
        vec![(
            "demo/Main".to_string(),
            ClassFileBuilder::new("demo/Main")
                .method("launch", "()V")
                .method("tick", "()V")
                .build(),
        )],
    );
    corpus.add_classes(
        "runtime.jar",
        vec![
            (
                "java/lang/Thread".to_string(),
                ClassFileBuilder::new("java/lang/Thread").method("start", "()V").build(),
            ),
            (
                "java/lang/Runnable".to_string(),
                ClassFileBuilder::new("java/lang/Runnable").method("run", "()V").build(),
            ),
        ],
    );

    let source = "\
package demo;

public class Main {
    void launch() {
        new Thread(new Runnable() {

            public void run() {
                tick();
            }
        }).start();
    }

    void tick() {
    }
}
";
    let document = SourceDocument::new(source, "demo/Main", Some(app));
    let links = resolve(&document, &corpus);

    assert_eq!(
        classes(&links),
        vec!["java/lang/Thread", "java/lang/Runnable", "demo/Main"]
    );
    assert_eq!(method_link(&links, "tick").unwrap().class_name, "demo/Main");
    // A constructed receiver is not followed.
    assert!(method_link(&links, "start").is_none());
}

#[test]
fn cancellation_stops_the_walk_between_types() {
    let mut corpus = Corpus::new();
    let app = corpus.add_classes(
        "app.jar",
        vec![
            ("demo/First".to_string(), ClassFileBuilder::new("demo/First").build()),
            ("demo/Second".to_string(), ClassFileBuilder::new("demo/Second").build()),
        ],
    );
    corpus.add_classes(
        "acme.jar",
        vec![("acme/Widget".to_string(), ClassFileBuilder::new("acme/Widget").build())],
    );

    let source = "\
package demo;

import acme.Widget;

public class First {
    Widget a;
}

class Second {
    Widget b;
}
";
    let document = SourceDocument::new(source, "demo/First", Some(app));
    let unit = loupe_syntax::parse(document.text()).unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let links = resolve_links(&document, &unit, &corpus, &token);
    // Import links are already out; the declaration walk never starts.
    assert_eq!(links.len(), 1);

    let links = resolve_links(&document, &unit, &corpus, &CancellationToken::new());
    assert_eq!(links.len(), 3);
}

#[test]
fn static_receivers_use_imports_then_java_lang() {
    let mut corpus = Corpus::new();
    let app = corpus.add_classes(
        "app.jar",
        vec![("demo/Main".to_string(), ClassFileBuilder::new("demo/Main").build())],
    );
    corpus.add_classes(
        "acme.jar",
        vec![(
            "acme/Console".to_string(),
            ClassFileBuilder::new("acme/Console").method("log", "()V").build(),
        )],
    );
    corpus.add_classes(
        "runtime.jar",
        vec![(
            "java/lang/String".to_string(),
            ClassFileBuilder::new("java/lang/String")
                .method("valueOf", "(I)Ljava/lang/String;")
                .build(),
        )],
    );

    let source = "\
package demo;

import acme.Console;

public class Main {
    void run() {
        Console.log();
        String.valueOf(1);
    }
}
";
    let document = SourceDocument::new(source, "demo/Main", Some(app));
    let links = resolve(&document, &corpus);

    assert_eq!(method_link(&links, "log").unwrap().class_name, "acme/Console");
    assert_eq!(
        method_link(&links, "valueOf").unwrap().class_name,
        "java/lang/String"
    );
}

#[test]
fn array_and_untyped_bindings_block_resolution() {
    let mut corpus = Corpus::new();
    let app = corpus.add_classes(
        "app.jar",
        vec![("demo/Main".to_string(), ClassFileBuilder::new("demo/Main").build())],
    );
    corpus.add_classes(
        "acme.jar",
        vec![
            (
                "acme/Tool".to_string(),
                ClassFileBuilder::new("acme/Tool")
                    .method("use", "()V")
                    .method("toString", "()Ljava/lang/String;")
                    .build(),
            ),
            (
                "acme/AlphaError".to_string(),
                ClassFileBuilder::new("acme/AlphaError").method("report", "()V").build(),
            ),
            (
                "acme/BetaError".to_string(),
                ClassFileBuilder::new("acme/BetaError").method("report", "()V").build(),
            ),
        ],
    );

    let source = "\
package demo;

import acme.Tool;
import acme.AlphaError;
import acme.BetaError;

public class Main {
    void run(Tool[] tools, Tool tool) {
        try {
            tool.use();
        } catch (AlphaError | BetaError e) {
            e.report();
            tools.toString();
        }
    }
}
";
    let document = SourceDocument::new(source, "demo/Main", Some(app));
    let links = resolve(&document, &corpus);

    assert_eq!(method_link(&links, "use").unwrap().class_name, "acme/Tool");
    // The multi-catch parameter shadows with no usable type, and the array
    // binding has no class either; neither call links.
    assert!(method_link(&links, "report").is_none());
    assert!(method_link(&links, "toString").is_none());
}

#[test]
fn instanceof_bindings_carry_their_pattern_type() {
    let mut corpus = Corpus::new();
    let app = corpus.add_classes(
        "app.jar",
        vec![("demo/Main".to_string(), ClassFileBuilder::new("demo/Main").build())],
    );
    corpus.add_classes(
        "acme.jar",
        vec![
            ("acme/Shape".to_string(), ClassFileBuilder::new("acme/Shape").build()),
            (
                "acme/Circle".to_string(),
                ClassFileBuilder::new("acme/Circle").method("area", "()V").build(),
            ),
        ],
    );

    let source = "\
package demo;

import acme.Shape;
import acme.Circle;

public class Main {
    void inspect(Shape shape) {
        if (shape instanceof Circle circle) {
            circle.area();
        }
    }
}
";
    let document = SourceDocument::new(source, "demo/Main", Some(app));
    let links = resolve(&document, &corpus);

    assert_eq!(method_link(&links, "area").unwrap().class_name, "acme/Circle");
}

#[test]
fn generic_arguments_link_on_their_own_names() {
    let mut corpus = Corpus::new();
    let app = corpus.add_classes(
        "app.jar",
        vec![("demo/Main".to_string(), ClassFileBuilder::new("demo/Main").build())],
    );
    corpus.add_classes(
        "runtime.jar",
        vec![("java/util/List".to_string(), ClassFileBuilder::new("java/util/List").build())],
    );
    corpus.add_classes(
        "acme.jar",
        vec![("acme/Widget".to_string(), ClassFileBuilder::new("acme/Widget").build())],
    );

    let source = "\
package demo;

import java.util.List;
import acme.Widget;

public class Main {
    List<Widget> widgets;
}
";
    let document = SourceDocument::new(source, "demo/Main", Some(app));
    let links = resolve(&document, &corpus);

    assert_eq!(
        classes(&links),
        vec!["java/util/List", "acme/Widget", "java/util/List", "acme/Widget"]
    );
    let base = &links.links()[2];
    let arg = &links.links()[3];
    assert_eq!(base.end_offset - base.start_offset, "List".len());
    assert_eq!(arg.end_offset - arg.start_offset, "Widget".len());
}
