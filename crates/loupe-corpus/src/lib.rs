//! The set of loaded bytecode archives a viewing session works against.
//!
//! A corpus is an ordered list of archives (jars, class directories, or
//! loose class files). Classes are stored as raw bytes; structural
//! metadata is parsed on first use and memoized, including the negative
//! result when the bytes do not parse.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use thiserror::Error;

use loupe_classfile::ClassSummary;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("classfile error: {0}")]
    ClassFile(#[from] loupe_classfile::Error),
    #[error("unsupported archive: {0}")]
    UnsupportedArchive(String),
}

/// Index of an archive within its corpus, in load order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArchiveId(usize);

/// One class inside an archive. `structure` is filled in lazily; a class
/// whose bytes do not parse stays in the corpus but reports no structure.
#[derive(Debug)]
pub struct ClassEntry {
    internal_name: String,
    bytes: Vec<u8>,
    structure: OnceLock<Option<ClassSummary>>,
}

impl ClassEntry {
    fn new(internal_name: String, bytes: Vec<u8>) -> Self {
        ClassEntry {
            internal_name,
            bytes,
            structure: OnceLock::new(),
        }
    }

    pub fn internal_name(&self) -> &str {
        &self.internal_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Structural metadata, parsed on first call and memoized. Returns
    /// `None` when the class bytes are malformed; the failure is memoized
    /// too, so the parse is attempted at most once.
    pub fn structure(&self) -> Option<&ClassSummary> {
        self.structure
            .get_or_init(|| match ClassSummary::parse(&self.bytes) {
                Ok(summary) => Some(summary),
                Err(err) => {
                    tracing::debug!(class = %self.internal_name, error = %err, "class structure unavailable");
                    None
                }
            })
            .as_ref()
    }
}

#[derive(Debug, Default)]
pub struct Archive {
    name: String,
    classes: HashMap<String, ClassEntry>,
}

impl Archive {
    /// Display name, normally the file name the archive was loaded from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn get(&self, internal_name: &str) -> Option<&ClassEntry> {
        self.classes.get(internal_name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassEntry> {
        self.classes.values()
    }

    /// Internal names in sorted order, for stable listings.
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn insert(&mut self, internal_name: String, bytes: Vec<u8>) {
        // Later duplicates replace earlier ones, matching archive-tool
        // extraction order.
        self.classes
            .insert(internal_name.clone(), ClassEntry::new(internal_name, bytes));
    }
}

#[derive(Debug, Default)]
pub struct Corpus {
    archives: Vec<Archive>,
}

impl Corpus {
    pub fn new() -> Self {
        Corpus::default()
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    pub fn archive(&self, id: ArchiveId) -> Option<&Archive> {
        self.archives.get(id.0)
    }

    pub fn archives(&self) -> impl Iterator<Item = (ArchiveId, &Archive)> {
        self.archives
            .iter()
            .enumerate()
            .map(|(i, archive)| (ArchiveId(i), archive))
    }

    /// Loads a path, dispatching on its shape: a directory of class files,
    /// a `.jar`/`.zip`, or a single `.class` file.
    pub fn load(&mut self, path: &Path) -> Result<ArchiveId, CorpusError> {
        if path.is_dir() {
            return self.load_class_dir(path);
        }
        match path.extension().and_then(OsStr::to_str) {
            Some("jar") | Some("zip") => self.load_jar(path),
            Some("class") => self.load_class_file(path),
            _ => Err(CorpusError::UnsupportedArchive(
                path.display().to_string(),
            )),
        }
    }

    pub fn load_jar(&mut self, path: &Path) -> Result<ArchiveId, CorpusError> {
        let file = std::fs::File::open(path)?;
        let mut zip = zip::ZipArchive::new(file)?;

        let mut archive = Archive {
            name: display_name(path),
            classes: HashMap::new(),
        };

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if !entry.is_file() {
                continue;
            }
            let name = entry.name().to_owned();
            if !name.ends_with(".class") || name.starts_with("META-INF/") {
                continue;
            }

            let internal = name[..name.len() - ".class".len()].to_owned();
            if is_ignored_class(&internal) {
                continue;
            }

            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            archive.insert(internal, bytes);
        }

        Ok(self.push(archive))
    }

    pub fn load_class_dir(&mut self, dir: &Path) -> Result<ArchiveId, CorpusError> {
        let mut archive = Archive {
            name: display_name(dir),
            classes: HashMap::new(),
        };

        for entry in walkdir::WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension() != Some(OsStr::new("class")) {
                continue;
            }

            let rel = entry.path().strip_prefix(dir).unwrap_or(entry.path());
            let internal = internal_name_from_path(rel);
            if is_ignored_class(&internal) {
                continue;
            }

            let bytes = std::fs::read(entry.path())?;
            archive.insert(internal, bytes);
        }

        Ok(self.push(archive))
    }

    /// Loads a single class file. The bytes are parsed up front because the
    /// internal name has to come from the class itself, not the file name.
    pub fn load_class_file(&mut self, path: &Path) -> Result<ArchiveId, CorpusError> {
        let bytes = std::fs::read(path)?;
        let summary = ClassSummary::parse(&bytes)?;
        let internal = summary.this_class.clone();

        let entry = ClassEntry {
            internal_name: internal.clone(),
            bytes,
            structure: OnceLock::from(Some(summary)),
        };

        let mut archive = Archive {
            name: display_name(path),
            classes: HashMap::new(),
        };
        archive.classes.insert(internal, entry);
        Ok(self.push(archive))
    }

    /// Adds an in-memory archive of `(internal name, bytes)` pairs.
    pub fn add_classes(
        &mut self,
        name: impl Into<String>,
        classes: Vec<(String, Vec<u8>)>,
    ) -> ArchiveId {
        let mut archive = Archive {
            name: name.into(),
            classes: HashMap::new(),
        };
        for (internal, bytes) in classes {
            archive.insert(internal, bytes);
        }
        self.push(archive)
    }

    fn push(&mut self, archive: Archive) -> ArchiveId {
        let id = ArchiveId(self.archives.len());
        self.archives.push(archive);
        id
    }

    /// Looks up a class by internal name. The preferred archive is probed
    /// first, then the rest in load order; the first hit wins.
    pub fn find(&self, internal_name: &str, preferred: Option<ArchiveId>) -> Option<(ArchiveId, &ClassEntry)> {
        if let Some(id) = preferred {
            if let Some(entry) = self.archive(id).and_then(|a| a.get(internal_name)) {
                return Some((id, entry));
            }
        }
        for (id, archive) in self.archives() {
            if Some(id) == preferred {
                continue;
            }
            if let Some(entry) = archive.get(internal_name) {
                return Some((id, entry));
            }
        }
        None
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn internal_name_from_path(rel: &Path) -> String {
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let mut internal = parts.join("/");
    if let Some(stripped) = internal.strip_suffix(".class") {
        internal = stripped.to_owned();
    }
    internal
}

fn is_ignored_class(internal_name: &str) -> bool {
    internal_name == "module-info"
        || internal_name == "package-info"
        || internal_name.ends_with("/package-info")
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use loupe_testing::ClassFileBuilder;
    use tempfile::TempDir;

    use super::*;

    fn write_jar(dir: &Path, name: &str, classes: &[(&str, Vec<u8>)]) -> PathBuf {
        let path = dir.join(name);
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();

        zip.start_file("META-INF/MANIFEST.MF", options).unwrap();
        zip.write_all(b"Manifest-Version: 1.0\n").unwrap();

        for (internal, bytes) in classes {
            zip.start_file(format!("{internal}.class"), options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn loads_classes_from_a_jar() {
        let tmp = TempDir::new().unwrap();
        let jar = write_jar(
            tmp.path(),
            "dep.jar",
            &[
                ("com/example/Foo", ClassFileBuilder::new("com/example/Foo").build()),
                (
                    "com/example/Foo$Inner",
                    ClassFileBuilder::new("com/example/Foo$Inner").build(),
                ),
                ("module-info", ClassFileBuilder::new("module-info").build()),
            ],
        );

        let mut corpus = Corpus::new();
        let id = corpus.load_jar(&jar).unwrap();

        let archive = corpus.archive(id).unwrap();
        assert_eq!(archive.name(), "dep.jar");
        assert_eq!(archive.len(), 2);
        assert!(archive.get("com/example/Foo$Inner").is_some());
        assert!(archive.get("module-info").is_none());

        let (found_id, entry) = corpus.find("com/example/Foo", None).unwrap();
        assert_eq!(found_id, id);
        assert_eq!(entry.internal_name(), "com/example/Foo");
        let structure = entry.structure().unwrap();
        assert_eq!(structure.super_class.as_deref(), Some("java/lang/Object"));
    }

    #[test]
    fn loads_classes_from_a_directory() {
        let tmp = TempDir::new().unwrap();
        let class_path = tmp.path().join("com/example/Bar.class");
        std::fs::create_dir_all(class_path.parent().unwrap()).unwrap();
        std::fs::write(&class_path, ClassFileBuilder::new("com/example/Bar").build()).unwrap();

        let mut corpus = Corpus::new();
        let id = corpus.load(tmp.path()).unwrap();

        let archive = corpus.archive(id).unwrap();
        assert_eq!(archive.len(), 1);
        assert!(corpus.find("com/example/Bar", None).is_some());
    }

    #[test]
    fn loads_a_single_class_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Renamed.class");
        std::fs::write(&path, ClassFileBuilder::new("com/example/Actual").build()).unwrap();

        let mut corpus = Corpus::new();
        let id = corpus.load(&path).unwrap();

        let archive = corpus.archive(id).unwrap();
        assert_eq!(archive.name(), "Renamed.class");
        // The internal name comes from the class bytes, not the file name.
        assert!(archive.get("com/example/Actual").is_some());
    }

    #[test]
    fn find_prefers_the_requested_archive() {
        let mut corpus = Corpus::new();
        let first = corpus.add_classes(
            "first.jar",
            vec![(
                "com/example/Shared".to_owned(),
                ClassFileBuilder::new("com/example/Shared")
                    .super_class("com/example/FromFirst")
                    .build(),
            )],
        );
        let second = corpus.add_classes(
            "second.jar",
            vec![(
                "com/example/Shared".to_owned(),
                ClassFileBuilder::new("com/example/Shared")
                    .super_class("com/example/FromSecond")
                    .build(),
            )],
        );

        let (id, entry) = corpus.find("com/example/Shared", None).unwrap();
        assert_eq!(id, first);
        assert_eq!(
            entry.structure().unwrap().super_class.as_deref(),
            Some("com/example/FromFirst")
        );

        let (id, entry) = corpus.find("com/example/Shared", Some(second)).unwrap();
        assert_eq!(id, second);
        assert_eq!(
            entry.structure().unwrap().super_class.as_deref(),
            Some("com/example/FromSecond")
        );

        assert!(corpus.find("com/example/Absent", Some(second)).is_none());
    }

    #[test]
    fn malformed_classes_stay_loaded_without_structure() {
        let mut corpus = Corpus::new();
        corpus.add_classes(
            "broken.jar",
            vec![("com/example/Broken".to_owned(), vec![0xde, 0xad, 0xbe, 0xef])],
        );

        let (_, entry) = corpus.find("com/example/Broken", None).unwrap();
        assert!(entry.structure().is_none());
        // Memoized: the second call takes the cached negative result.
        assert!(entry.structure().is_none());
        assert_eq!(entry.bytes(), [0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn unsupported_paths_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "not an archive").unwrap();

        let mut corpus = Corpus::new();
        let err = corpus.load(&path).unwrap_err();
        assert!(matches!(err, CorpusError::UnsupportedArchive(_)));
    }
}
