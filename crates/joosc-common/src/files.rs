//! `FileSet` — the compiler session's table of input source files.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use crate::position::{LineMap, Position};
use crate::span::{FileId, Span};

/// One input source file: its path, raw bytes, and a lazily-built line map.
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    line_map: OnceCell<LineMap>,
}

impl SourceFile {
    fn new(path: PathBuf, text: String) -> Self {
        SourceFile { path, text, line_map: OnceCell::new() }
    }

    fn line_map(&self) -> &LineMap {
        self.line_map.get_or_init(|| LineMap::new(&self.text))
    }

    pub fn position(&self, offset: u32) -> Position {
        self.line_map().position(offset)
    }

    pub fn line_span(&self, offset: u32) -> (u32, u32) {
        self.line_map().line_span(offset)
    }

    pub fn slice(&self, span: Span) -> &str {
        span.slice(&self.text)
    }

    /// The file's basename without its extension, used to check a
    /// compilation unit's public type name against its file name.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
    }
}

/// Error produced when a source file can't be admitted into the session:
/// I/O failure, or a byte outside the ASCII range Joos source is restricted
/// to.
#[derive(Debug)]
pub enum FileLoadError {
    Io { path: PathBuf, message: String },
    NonAscii { path: PathBuf, offset: u32, byte: u8 },
}

/// Owns every source file for one compile session, dense-indexed by
/// [`FileId`].
#[derive(Default)]
pub struct FileSet {
    files: Vec<SourceFile>,
}

impl FileSet {
    pub fn new() -> Self {
        FileSet::default()
    }

    /// Register raw file contents already read from disk (or constructed in
    /// a test). Rejects non-ASCII bytes per the Joos source contract.
    pub fn add(&mut self, path: impl AsRef<Path>, text: String) -> Result<FileId, FileLoadError> {
        let path = path.as_ref().to_path_buf();
        if let Some(offset) = text.bytes().position(|b| b > 127) {
            return Err(FileLoadError::NonAscii {
                path,
                offset: offset as u32,
                byte: text.as_bytes()[offset],
            });
        }
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile::new(path, text));
        Ok(id)
    }

    pub fn get(&self, id: FileId) -> &SourceFile {
        &self.files[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = FileId> {
        (0..self.files.len() as u32).map(FileId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_ascii() {
        let mut fs = FileSet::new();
        let err = fs.add("A.java", "class A { char c = 'é'; }".to_string());
        assert!(matches!(err, Err(FileLoadError::NonAscii { .. })));
    }

    #[test]
    fn assigns_dense_ids_in_insertion_order() {
        let mut fs = FileSet::new();
        let a = fs.add("A.java", "class A {}".to_string()).unwrap();
        let b = fs.add("B.java", "class B {}".to_string()).unwrap();
        assert_eq!(a, FileId(0));
        assert_eq!(b, FileId(1));
    }

    #[test]
    fn stem_drops_extension() {
        let mut fs = FileSet::new();
        let a = fs.add("src/A.java", "class A {}".to_string()).unwrap();
        assert_eq!(fs.get(a).stem(), "A");
    }
}
