use std::path::{Path, PathBuf};
use glob::glob;
use tracing::warn;
use walkdir::WalkDir;

use super::{DocumentFormat, LoaderError};

/// Resolves a directory, file or glob pattern to the files it names.
/// Directories are walked recursively.
pub(crate) fn resolve_input_to_files(input: &str) -> Result<Vec<PathBuf>, LoaderError> {
    let io_err = |source: std::io::Error| LoaderError::Io { path: input.to_string(), source };
    let mut files = Vec::new();

    let entries = glob(input).map_err(|e| {
        io_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))
    })?;
    for entry in entries {
        match entry {
            Ok(path) => {
                if path.is_dir() {
                    for entry in WalkDir::new(&path) {
                        let entry = entry.map_err(|e| io_err(e.into()))?;
                        if entry.file_type().is_file() {
                            files.push(entry.path().to_path_buf());
                        }
                    }
                } else if path.is_file() {
                    files.push(path);
                }
            }
            Err(e) => warn!("glob error: {e}"),
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

pub(super) fn read_text(path: &Path, format: DocumentFormat) -> Result<String, LoaderError> {
    match format {
        DocumentFormat::PlainText => std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.display().to_string(),
            source,
        }),
        #[cfg(feature = "pdf")]
        DocumentFormat::Pdf => {
            if !path.is_file() {
                return Err(LoaderError::Io {
                    path: path.display().to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                });
            }
            pdf_extract::extract_text(path).map_err(|e| LoaderError::Pdf {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_directories_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("nested/a.txt"), "a").unwrap();

        let files = resolve_input_to_files(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(files, vec![dir.path().join("b.txt"), dir.path().join("nested/a.txt")]);
    }

    #[test]
    fn resolves_glob_patterns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("b.md"), "b").unwrap();

        let pattern = format!("{}/*.txt", dir.path().display());
        let files = resolve_input_to_files(&pattern).unwrap();
        assert_eq!(files, vec![dir.path().join("a.txt")]);
    }
}
