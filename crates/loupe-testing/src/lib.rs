//! Utilities shared by Loupe tests.
//!
//! The main entry point is [`ClassFileBuilder`], which assembles minimal but
//! structurally valid classfiles so corpus and resolver tests exercise the
//! real metadata reader instead of canned structs.

mod classfile;

pub use classfile::ClassFileBuilder;
