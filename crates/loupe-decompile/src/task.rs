use loupe_core::CancellationToken;
use loupe_corpus::{ArchiveId, ClassEntry, Corpus};
use loupe_xref::{resolve_source, LinkTable, SourceDocument};

use crate::{ClassRef, Decompiler, Disassembler, TransformError};

/// What a view paints: final text plus the links that decorate it.
#[derive(Debug)]
pub struct RenderedDocument {
    pub text: String,
    pub links: LinkTable,
}

/// One decompile-and-resolve unit of work, one per opened view.
///
/// The task borrows the shared corpus and owns its class coordinates and
/// cancellation token. Tasks are independent; any number may run at once
/// against the same corpus.
pub struct ViewTask<'a> {
    corpus: &'a Corpus,
    archive: ArchiveId,
    class_name: String,
    cancel: CancellationToken,
}

impl<'a> ViewTask<'a> {
    pub fn new(corpus: &'a Corpus, archive: ArchiveId, class_name: impl Into<String>) -> Self {
        Self {
            corpus,
            archive,
            class_name: class_name.into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// A handle the owner can use to cancel this task from another thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs a decompiler and resolves its output into a linked document.
    ///
    /// Engine failures still yield a renderable document carrying a
    /// diagnostic comment; only a missing class or cancellation surface as
    /// errors, since there is nothing to show for either.
    pub fn decompile(&self, engine: &dyn Decompiler) -> Result<RenderedDocument, TransformError> {
        let entry = self.entry()?;
        if self.cancel.is_cancelled() {
            return Err(TransformError::Cancelled);
        }

        let text = match engine.decompile(&self.class_ref(entry)) {
            Ok(text) => text,
            Err(error) => {
                tracing::debug!(
                    engine = engine.name(),
                    class = %self.class_name,
                    error = %error,
                    "decompilation failed"
                );
                return Ok(RenderedDocument {
                    text: annotate_transform_failure(engine.name(), &error),
                    links: LinkTable::default(),
                });
            }
        };
        if self.cancel.is_cancelled() {
            return Err(TransformError::Cancelled);
        }

        let document = SourceDocument::new(text, &self.class_name, Some(self.archive));
        let resolved = resolve_source(&document, self.corpus, &self.cancel);
        if self.cancel.is_cancelled() {
            return Err(TransformError::Cancelled);
        }
        Ok(RenderedDocument {
            text: resolved.text,
            links: resolved.links,
        })
    }

    /// Runs a disassembler. The listing is served exactly as produced, with
    /// an empty link table.
    pub fn disassemble(&self, engine: &dyn Disassembler) -> Result<RenderedDocument, TransformError> {
        let entry = self.entry()?;
        if self.cancel.is_cancelled() {
            return Err(TransformError::Cancelled);
        }

        match engine.disassemble(&self.class_ref(entry)) {
            Ok(text) => Ok(RenderedDocument {
                text,
                links: LinkTable::default(),
            }),
            Err(error) => {
                tracing::debug!(
                    engine = engine.name(),
                    class = %self.class_name,
                    error = %error,
                    "disassembly failed"
                );
                Ok(RenderedDocument {
                    text: annotate_transform_failure(engine.name(), &error),
                    links: LinkTable::default(),
                })
            }
        }
    }

    fn entry(&self) -> Result<&'a ClassEntry, TransformError> {
        self.corpus
            .archive(self.archive)
            .and_then(|archive| archive.get(&self.class_name))
            .ok_or_else(|| TransformError::ClassNotFound(self.class_name.clone()))
    }

    fn class_ref(&self, entry: &'a ClassEntry) -> ClassRef<'a> {
        let archive_name = self
            .corpus
            .archive(self.archive)
            .map(|archive| archive.name())
            .unwrap_or_default();
        ClassRef {
            internal_name: entry.internal_name(),
            bytes: entry.bytes(),
            archive: archive_name,
        }
    }
}

/// A comment block shown in place of the transformed text when the engine
/// itself fails; there is no source to annotate in that case.
fn annotate_transform_failure(engine: &str, error: &TransformError) -> String {
    let mut out = String::from("/*\n");
    out.push_str(" * ");
    out.push_str(engine);
    out.push_str(" failed to transform this class.\n");
    for line in error.to_string().lines() {
        out.push_str(" * ");
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(" */\n");
    out
}
