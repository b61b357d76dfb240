//! Adapter seams for external bytecode-to-text engines, plus the unit of
//! work that turns one class into a rendered, hyperlinked document.
//!
//! The engines themselves live outside this workspace; this crate only fixes
//! the contract they plug into. Decompiler output is treated as reconstructed
//! Java and runs through the cross-reference resolver; disassembler output is
//! plain text and is served as-is.

#![forbid(unsafe_code)]

mod task;

pub use crate::task::{RenderedDocument, ViewTask};

/// Everything an engine gets handed about the class it should transform.
#[derive(Debug, Clone, Copy)]
pub struct ClassRef<'a> {
    /// Internal name, slash separated.
    pub internal_name: &'a str,
    /// Raw classfile bytes.
    pub bytes: &'a [u8],
    /// Display name of the archive the class came from.
    pub archive: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("class {0} is not present in the loaded archives")]
    ClassNotFound(String),
    /// The engine ran but reported a failure of its own.
    #[error("{0}")]
    Engine(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("the view task was cancelled")]
    Cancelled,
}

/// An engine that reconstructs Java source from classfile bytes.
///
/// The output is expected to be parseable most of the time; when it is not,
/// the view still renders it, just without hyperlinks.
pub trait Decompiler {
    /// Engine display name, used in diagnostics.
    fn name(&self) -> &str;

    fn decompile(&self, class: &ClassRef<'_>) -> Result<String, TransformError>;
}

/// An engine that produces a plain-text listing of classfile bytes. No
/// resolution is attempted on its output.
pub trait Disassembler {
    /// Engine display name, used in diagnostics.
    fn name(&self) -> &str;

    fn disassemble(&self, class: &ClassRef<'_>) -> Result<String, TransformError>;
}
