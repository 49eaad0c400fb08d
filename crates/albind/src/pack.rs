//! Deployable archive packaging
//!
//! Turns a packaging directory into a zip archive suitable for the function
//! control plane. Entries are walked in sorted order and written with a fixed
//! timestamp, so the archive bytes are deterministic for a given directory
//! content.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Packaging errors
#[derive(Debug, Error)]
pub enum PackError {
    #[error("packaging path '{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("packaging directory '{0}' contains no files")]
    Empty(PathBuf),

    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk packaging directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Pack every file under `dir` into a zip archive, keyed by path relative to
/// `dir` with `/` separators.
pub fn pack_directory(dir: &Path) -> Result<Vec<u8>, PackError> {
    if !dir.is_dir() {
        return Err(PackError::NotADirectory(dir.to_path_buf()));
    }

    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut files = 0usize;

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(dir)
            .expect("walked entries live under the packaging directory");
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let contents = fs::read(entry.path()).map_err(|e| PackError::Io {
            path: entry.path().to_path_buf(),
            source: e,
        })?;

        writer.start_file(name, options)?;
        writer.write_all(&contents).map_err(|e| PackError::Io {
            path: entry.path().to_path_buf(),
            source: e,
        })?;
        files += 1;
    }

    if files == 0 {
        return Err(PackError::Empty(dir.to_path_buf()));
    }

    let cursor = writer.finish()?;
    let archive = cursor.into_inner();
    debug!(dir = %dir.display(), files, bytes = archive.len(), "Packed deployment archive");
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn scaffold() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.js"), "exports.handler = x => x;").unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib").join("util.js"), "// util").unwrap();
        dir
    }

    #[test]
    fn archives_files_by_relative_path() {
        let dir = scaffold();
        let bytes = pack_directory(dir.path()).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"index.js".to_string()));
        assert!(names.contains(&"lib/util.js".to_string()));

        let mut contents = String::new();
        archive
            .by_name("index.js")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "exports.handler = x => x;");
    }

    #[test]
    fn packing_is_deterministic() {
        let dir = scaffold();
        let first = pack_directory(dir.path()).unwrap();
        let second = pack_directory(dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_missing_and_empty_directories() {
        let err = pack_directory(Path::new("/nonexistent/albind")).unwrap_err();
        assert!(matches!(err, PackError::NotADirectory(_)));

        let empty = tempfile::tempdir().unwrap();
        let err = pack_directory(empty.path()).unwrap_err();
        assert!(matches!(err, PackError::Empty(_)));
    }
}
