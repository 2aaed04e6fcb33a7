//! Source tree inventory for a run.
//!
//! A [`SourceTree`] is the immutable set of files a run knows about:
//! - Deterministic file ordering (sorted by normalized path)
//! - Contents read fully into memory once, shared read-only afterwards
//! - Path normalization and root containment checks for fact locations
//!
//! Paths are always source-root-relative with forward slashes.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::XrefError;

// ============================================================================
// File Information
// ============================================================================

/// One file of the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Relative path from the source root (always forward slashes).
    pub path: String,
    /// File size in bytes.
    pub size_bytes: u64,
    content: Vec<u8>,
}

impl SourceFile {
    /// Create a file entry from in-memory content.
    pub fn from_content(path: impl Into<String>, content: Vec<u8>) -> Self {
        SourceFile {
            path: path.into(),
            size_bytes: content.len() as u64,
            content,
        }
    }

    /// File contents.
    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

// ============================================================================
// Scan Configuration
// ============================================================================

/// Configuration for scanning a source root.
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Glob patterns (relative paths) to exclude, in addition to the defaults.
    pub exclude_patterns: Vec<String>,
    /// Whether to follow symlinks.
    pub follow_symlinks: bool,
    /// Maximum file size to include (bytes). Files larger are skipped.
    pub max_file_size: Option<u64>,
}

impl ScanConfig {
    /// Add an exclude pattern.
    pub fn exclude(mut self, pattern: &str) -> Self {
        self.exclude_patterns.push(pattern.to_string());
        self
    }

    /// Follow symlinks while walking the root.
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Skip files larger than `bytes`.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    fn exclude_set(&self) -> Result<GlobSet, XrefError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                XrefError::invalid_args(format!("invalid exclude pattern '{}': {}", pattern, e))
            })?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|e| XrefError::invalid_args(format!("invalid exclude patterns: {}", e)))
    }
}

/// Default directories to exclude from a scan.
const DEFAULT_EXCLUDE_DIRS: &[&str] = &[".git", ".hg", ".svn", "node_modules", "target"];

fn is_default_excluded(path: &Path) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            DEFAULT_EXCLUDE_DIRS.iter().any(|d| name == *d)
        }
        _ => false,
    })
}

// ============================================================================
// Path Normalization
// ============================================================================

/// Why a path from a fact stream was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathRejection {
    /// The path escapes the source root (`..`, or absolute elsewhere).
    OutsideRoot,
    /// The path is inside the root but no such file was scanned.
    UnknownFile,
}

impl fmt::Display for PathRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathRejection::OutsideRoot => write!(f, "outside source root"),
            PathRejection::UnknownFile => write!(f, "unknown file"),
        }
    }
}

/// Lexically normalize `raw` against `root`.
///
/// Absolute paths must lie under `root`. `.` components are dropped and `..`
/// components pop; popping past the root is a rejection. The result uses
/// forward slashes and is never empty.
pub fn normalize_path(root: &Path, raw: &str) -> Result<String, PathRejection> {
    let raw_path = Path::new(raw);
    let relative = if raw_path.is_absolute() {
        raw_path
            .strip_prefix(root)
            .map_err(|_| PathRejection::OutsideRoot)?
    } else {
        raw_path
    };

    let mut parts: Vec<String> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(PathRejection::OutsideRoot);
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(PathRejection::OutsideRoot),
        }
    }

    if parts.is_empty() {
        return Err(PathRejection::OutsideRoot);
    }
    Ok(parts.join("/"))
}

// ============================================================================
// Source Tree
// ============================================================================

/// Immutable inventory of the files under a source root.
#[derive(Debug, Clone)]
pub struct SourceTree {
    root: PathBuf,
    files: BTreeMap<String, SourceFile>,
}

impl SourceTree {
    /// Scan `root` and read every included file into memory.
    ///
    /// Failure to read the root itself is fatal. Unreadable entries below it
    /// are skipped with a warning.
    pub fn scan(root: &Path, config: &ScanConfig) -> Result<Self, XrefError> {
        let root = root.canonicalize().map_err(|source| XrefError::SourceRoot {
            path: root.to_path_buf(),
            source,
        })?;
        fs::read_dir(&root).map_err(|source| XrefError::SourceRoot {
            path: root.clone(),
            source,
        })?;

        let excludes = config.exclude_set()?;
        let mut files = BTreeMap::new();

        for entry in WalkDir::new(&root)
            .follow_links(config.follow_symlinks)
            .into_iter()
            .filter_entry(|e| {
                e.path()
                    .strip_prefix(&root)
                    .map(|rel| !is_default_excluded(rel))
                    .unwrap_or(true)
            })
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let relative_str = relative
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");

            if excludes.is_match(&relative_str) {
                debug!("excluded: {}", relative_str);
                continue;
            }

            if let Some(max_size) = config.max_file_size {
                match entry.metadata() {
                    Ok(metadata) if metadata.len() > max_size => {
                        debug!(size = metadata.len(), "too large: {}", relative_str);
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("skipping {}: {}", relative_str, e);
                        continue;
                    }
                }
            }

            match fs::read(entry.path()) {
                Ok(content) => {
                    files.insert(
                        relative_str.clone(),
                        SourceFile::from_content(relative_str, content),
                    );
                }
                Err(e) => warn!("skipping {}: {}", relative_str, e),
            }
        }

        debug!("scanned {} files under {}", files.len(), root.display());
        Ok(SourceTree { root, files })
    }

    /// Create a tree from in-memory files (for tests or synthetic scenarios).
    pub fn from_files<P, C>(
        root: impl Into<PathBuf>,
        files: impl IntoIterator<Item = (P, C)>,
    ) -> Self
    where
        P: Into<String>,
        C: Into<Vec<u8>>,
    {
        let files = files
            .into_iter()
            .map(|(path, content)| {
                let path = path.into();
                (path.clone(), SourceFile::from_content(path, content.into()))
            })
            .collect();
        SourceTree {
            root: root.into(),
            files,
        }
    }

    /// Look up a file by normalized path.
    pub fn file(&self, path: &str) -> Option<&SourceFile> {
        self.files.get(path)
    }

    /// All files in path order.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when the tree has no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Normalize a path from a fact stream and require that it names a known file.
    pub fn resolve(&self, raw: &str) -> Result<&SourceFile, PathRejection> {
        let normalized = normalize_path(&self.root, raw)?;
        self.files
            .get(&normalized)
            .ok_or(PathRejection::UnknownFile)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod normalize_tests {
        use super::*;

        #[test]
        fn relative_paths_are_cleaned() {
            let root = Path::new("/src");
            assert_eq!(normalize_path(root, "a/./b.c"), Ok("a/b.c".to_string()));
            assert_eq!(normalize_path(root, "a/x/../b.c"), Ok("a/b.c".to_string()));
        }

        #[test]
        fn escaping_the_root_is_rejected() {
            let root = Path::new("/src");
            assert_eq!(
                normalize_path(root, "../etc/passwd"),
                Err(PathRejection::OutsideRoot)
            );
            assert_eq!(
                normalize_path(root, "a/../../b.c"),
                Err(PathRejection::OutsideRoot)
            );
            assert_eq!(normalize_path(root, "."), Err(PathRejection::OutsideRoot));
        }

        #[cfg(unix)]
        #[test]
        fn absolute_paths_must_be_under_root() {
            let root = Path::new("/src/tree");
            assert_eq!(
                normalize_path(root, "/src/tree/lib/a.c"),
                Ok("lib/a.c".to_string())
            );
            assert_eq!(
                normalize_path(root, "/usr/include/stdio.h"),
                Err(PathRejection::OutsideRoot)
            );
        }
    }

    mod tree_tests {
        use super::*;

        #[test]
        fn from_files_orders_by_path() {
            let tree = SourceTree::from_files(
                "/src",
                vec![("b.c", "int b;"), ("a.c", "int a;"), ("lib/z.h", "")],
            );
            let paths: Vec<_> = tree.files().map(|f| f.path.as_str()).collect();
            assert_eq!(paths, vec!["a.c", "b.c", "lib/z.h"]);
            assert_eq!(tree.file("a.c").map(SourceFile::content), Some(&b"int a;"[..]));
            assert_eq!(tree.file("b.c").map(|f| f.size_bytes), Some(6));
        }

        #[test]
        fn resolve_requires_known_file() {
            let tree = SourceTree::from_files("/src", vec![("a.c", "")]);
            assert!(tree.resolve("./a.c").is_ok());
            assert_eq!(
                tree.resolve("missing.c").unwrap_err(),
                PathRejection::UnknownFile
            );
            assert_eq!(
                tree.resolve("../a.c").unwrap_err(),
                PathRejection::OutsideRoot
            );
        }

        #[test]
        fn scan_reads_files_and_applies_excludes() {
            let dir = tempfile::tempdir().unwrap();
            fs::create_dir_all(dir.path().join("src")).unwrap();
            fs::create_dir_all(dir.path().join(".git")).unwrap();
            fs::write(dir.path().join("src/main.c"), "int main(void);\n").unwrap();
            fs::write(dir.path().join("src/gen.c"), "// generated\n").unwrap();
            fs::write(dir.path().join(".git/HEAD"), "ref").unwrap();

            let config = ScanConfig::default().exclude("src/gen.*");
            let tree = SourceTree::scan(dir.path(), &config).unwrap();

            let paths: Vec<_> = tree.files().map(|f| f.path.clone()).collect();
            assert_eq!(paths, vec!["src/main.c".to_string()]);
            assert_eq!(
                tree.file("src/main.c").map(SourceFile::content),
                Some(&b"int main(void);\n"[..])
            );
        }

        #[test]
        fn scan_skips_files_over_the_size_limit() {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("small.c"), "int a;\n").unwrap();
            fs::write(dir.path().join("big.c"), "int b[4096];\n".repeat(64)).unwrap();

            let config = ScanConfig::default().max_file_size(64);
            let tree = SourceTree::scan(dir.path(), &config).unwrap();

            let paths: Vec<_> = tree.files().map(|f| f.path.clone()).collect();
            assert_eq!(paths, vec!["small.c".to_string()]);
        }

        #[cfg(unix)]
        #[test]
        fn symlinked_directories_are_walked_only_when_followed() {
            let dir = tempfile::tempdir().unwrap();
            let outside = tempfile::tempdir().unwrap();
            fs::write(outside.path().join("shared.h"), "int shared;\n").unwrap();
            fs::write(dir.path().join("main.c"), "int main;\n").unwrap();
            std::os::unix::fs::symlink(outside.path(), dir.path().join("vendor")).unwrap();

            let plain = SourceTree::scan(dir.path(), &ScanConfig::default()).unwrap();
            assert!(plain.file("vendor/shared.h").is_none());

            let followed =
                SourceTree::scan(dir.path(), &ScanConfig::default().follow_symlinks(true))
                    .unwrap();
            assert!(followed.file("vendor/shared.h").is_some());
            assert_eq!(followed.len(), 2);
        }

        #[test]
        fn scan_of_missing_root_is_fatal() {
            let dir = tempfile::tempdir().unwrap();
            let missing = dir.path().join("nope");
            let err = SourceTree::scan(&missing, &ScanConfig::default()).unwrap_err();
            assert!(matches!(err, XrefError::SourceRoot { .. }));
        }
    }
}
