use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

use loupe_core::CancellationToken;
use loupe_corpus::Corpus;
use loupe_xref::{
    annotate_parse_failure, resolve_links, LinkAnchor, LinkTable, SourceDocument, SymbolLink,
};

#[derive(Parser)]
#[command(
    name = "loupe",
    version,
    about = "Loupe CLI (cross-references, class structure, archive listings)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve cross-references in a reconstructed source file
    Xref(XrefArgs),
    /// Print the structural metadata recorded in a class file
    Structure(StructureArgs),
    /// List loaded archives and their class counts
    Archives(ArchivesArgs),
}

#[derive(Args)]
struct XrefArgs {
    /// Reconstructed Java source file to resolve
    #[arg(long)]
    source: PathBuf,
    /// Internal name of the class the source reconstructs (e.g. com/example/Main)
    #[arg(long)]
    class: String,
    /// Jar, class directory, or class file to load (repeatable, probed in order)
    #[arg(long = "archive")]
    archives: Vec<PathBuf>,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct StructureArgs {
    /// Internal name of the class to describe
    #[arg(long)]
    class: String,
    /// Jar, class directory, or class file to load (repeatable, probed in order)
    #[arg(long = "archive")]
    archives: Vec<PathBuf>,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ArchivesArgs {
    /// Jar, class directory, or class file to load (repeatable, probed in order)
    #[arg(long = "archive")]
    archives: Vec<PathBuf>,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Installs a stderr subscriber filtered by `LOUPE_LOG`. Logs stay on
/// stderr so `--json` output on stdout remains parseable.
fn init_tracing() {
    let filter = std::env::var("LOUPE_LOG")
        .ok()
        .and_then(|directives| tracing_subscriber::EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new("warn"));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr),
    );
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Xref(args) => {
            let corpus = load_corpus(&args.archives)?;
            let text = std::fs::read_to_string(&args.source)
                .with_context(|| format!("failed to read {}", args.source.display()))?;
            let home = corpus.find(&args.class, None).map(|(id, _)| id);
            let document = SourceDocument::new(text, args.class.as_str(), home);

            match loupe_syntax::parse(document.text()) {
                Ok(unit) => {
                    let cancel = CancellationToken::new();
                    let links = resolve_links(&document, &unit, &corpus, &cancel);
                    let report = XrefReport::new(&args, &links);
                    print_xref(&report, args.json)?;
                    Ok(0)
                }
                Err(error) => {
                    let report = XrefFailureReport {
                        source: args.source.clone(),
                        class: args.class.clone(),
                        error: error.to_string(),
                        annotated_text: annotate_parse_failure(document.text(), &error),
                    };
                    print_xref_failure(&report, args.json)?;
                    Ok(1)
                }
            }
        }
        Command::Structure(args) => {
            let corpus = load_corpus(&args.archives)?;
            let Some((id, entry)) = corpus.find(&args.class, None) else {
                bail!("class {} is not present in the loaded archives", args.class);
            };
            let archive = corpus
                .archive(id)
                .map(|a| a.name().to_owned())
                .unwrap_or_default();

            let Some(summary) = entry.structure() else {
                if args.json {
                    print_json(&serde_json::json!({
                        "class": args.class,
                        "archive": archive,
                        "error": "structure unavailable (malformed class file)",
                    }))?;
                } else {
                    println!("class: {}", args.class);
                    println!("archive: {archive}");
                    println!("structure: unavailable (malformed class file)");
                }
                return Ok(1);
            };

            let report = StructureReport {
                class: args.class.clone(),
                archive,
                major_version: summary.major_version,
                minor_version: summary.minor_version,
                super_class: summary.super_class.clone(),
                interfaces: summary.interfaces.clone(),
                methods: summary
                    .methods
                    .iter()
                    .map(|m| MethodEntry {
                        name: m.name.clone(),
                        descriptor: m.descriptor.clone(),
                    })
                    .collect(),
            };
            print_structure(&report, args.json)?;
            Ok(0)
        }
        Command::Archives(args) => {
            let corpus = load_corpus(&args.archives)?;
            let report = ArchivesReport {
                archives: corpus
                    .archives()
                    .map(|(_, archive)| ArchiveEntry {
                        name: archive.name().to_owned(),
                        classes: archive.len(),
                    })
                    .collect(),
            };
            print_archives(&report, args.json)?;
            Ok(0)
        }
    }
}

fn load_corpus(paths: &[PathBuf]) -> Result<Corpus> {
    let mut corpus = Corpus::new();
    for path in paths {
        corpus
            .load(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
    }
    Ok(corpus)
}

#[derive(Serialize)]
struct XrefReport {
    source: PathBuf,
    class: String,
    links: Vec<LinkEntry>,
}

impl XrefReport {
    fn new(args: &XrefArgs, links: &LinkTable) -> Self {
        XrefReport {
            source: args.source.clone(),
            class: args.class.clone(),
            links: links.links().iter().map(LinkEntry::from_link).collect(),
        }
    }
}

#[derive(Serialize)]
struct LinkEntry {
    start_offset: usize,
    end_offset: usize,
    line: u32,
    column: u32,
    archive: String,
    class_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    anchor: Option<AnchorEntry>,
}

impl LinkEntry {
    fn from_link(link: &SymbolLink) -> Self {
        let anchor = link.anchor.as_ref().map(|anchor| match anchor {
            LinkAnchor::Type(name) => AnchorEntry {
                kind: "type",
                name: name.clone(),
            },
            LinkAnchor::Method(name) => AnchorEntry {
                kind: "method",
                name: name.clone(),
            },
        });
        LinkEntry {
            start_offset: link.start_offset,
            end_offset: link.end_offset,
            line: link.line,
            column: link.column,
            archive: link.archive.clone(),
            class_name: link.class_name.clone(),
            anchor,
        }
    }
}

#[derive(Serialize)]
struct AnchorEntry {
    kind: &'static str,
    name: String,
}

#[derive(Serialize)]
struct XrefFailureReport {
    source: PathBuf,
    class: String,
    error: String,
    annotated_text: String,
}

#[derive(Serialize)]
struct StructureReport {
    class: String,
    archive: String,
    major_version: u16,
    minor_version: u16,
    super_class: Option<String>,
    interfaces: Vec<String>,
    methods: Vec<MethodEntry>,
}

#[derive(Serialize)]
struct MethodEntry {
    name: String,
    descriptor: String,
}

#[derive(Serialize)]
struct ArchivesReport {
    archives: Vec<ArchiveEntry>,
}

#[derive(Serialize)]
struct ArchiveEntry {
    name: String,
    classes: usize,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}

fn print_xref(report: &XrefReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }

    for link in &report.links {
        let anchor = match &link.anchor {
            Some(anchor) => format!(" [{} {}]", anchor.kind, anchor.name),
            None => String::new(),
        };
        println!(
            "{}:{}: {} ({}){}",
            link.line, link.column, link.class_name, link.archive, anchor
        );
    }
    println!("summary: {} links", report.links.len());
    Ok(())
}

fn print_xref_failure(report: &XrefFailureReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }

    // The annotated text already carries the parse error at the bottom.
    print!("{}", report.annotated_text);
    Ok(())
}

fn print_structure(report: &StructureReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }

    println!("class: {}", report.class);
    println!("archive: {}", report.archive);
    println!(
        "version: {}.{}",
        report.major_version, report.minor_version
    );
    match &report.super_class {
        Some(super_class) => println!("super: {super_class}"),
        None => println!("super: (none)"),
    }
    if report.interfaces.is_empty() {
        println!("interfaces: (none)");
    } else {
        println!("interfaces:");
        for interface in &report.interfaces {
            println!("  {interface}");
        }
    }
    if report.methods.is_empty() {
        println!("methods: (none)");
    } else {
        println!("methods:");
        for method in &report.methods {
            println!("  {} {}", method.name, method.descriptor);
        }
    }
    Ok(())
}

fn print_archives(report: &ArchivesReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }

    println!("archives: {}", report.archives.len());
    for archive in &report.archives {
        println!("  {}: {} classes", archive.name, archive.classes);
    }
    Ok(())
}
