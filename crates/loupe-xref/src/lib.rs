//! Cross-reference resolution for reconstructed Java source.
//!
//! Given a parsed compilation unit and a loaded class corpus, the resolver
//! emits a table of [`SymbolLink`]s tying identifier spans to the archive and
//! class they denote. Resolution is fail-closed: a link is produced only when
//! corpus probing leaves exactly one candidate standing, so a link never
//! points at a guess. Text the parser rejects is still served, wrapped in a
//! diagnostic comment instead of a link table.

#![forbid(unsafe_code)]

mod document;
mod fallback;
mod imports;
mod link;
mod resolve;
mod scope;

pub use crate::document::{OffsetError, OffsetIndex, SourceDocument};
pub use crate::fallback::annotate_parse_failure;
pub use crate::imports::{ImportBinding, ImportTable};
pub use crate::link::{LinkAnchor, LinkTable, SymbolLink};
pub use crate::resolve::{resolve_links, Resolution};

use loupe_core::CancellationToken;
use loupe_corpus::Corpus;

/// Text plus its link table, ready for presentation.
#[derive(Debug)]
pub struct ResolvedSource {
    pub text: String,
    pub links: LinkTable,
}

/// Parses a document and resolves its references in one step.
///
/// When the text cannot be parsed the result carries the annotated fallback
/// text and an empty link table instead of an error; an unparseable document
/// is still a viewable one.
pub fn resolve_source(
    document: &SourceDocument,
    corpus: &Corpus,
    cancel: &CancellationToken,
) -> ResolvedSource {
    match loupe_syntax::parse(document.text()) {
        Ok(unit) => ResolvedSource {
            text: document.text().to_owned(),
            links: resolve_links(document, &unit, corpus, cancel),
        },
        Err(error) => ResolvedSource {
            text: annotate_parse_failure(document.text(), &error),
            links: LinkTable::default(),
        },
    }
}
