//! Filesystem abstractions and the source walker.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};

use crate::error::Result;

/// Abstraction over filesystem access for testability.
#[cfg_attr(test, mockall::automock)]
pub trait FileSystem {
    /// List all files reachable from the root path, skipping hidden entries
    /// and any directory whose name is in `excluded_dirs`.
    fn list_files(&self, root: &Path, excluded_dirs: &[String]) -> Result<Vec<PathBuf>>;
    /// Size of a file in bytes.
    fn file_size(&self, path: &Path) -> Result<u64>;
    /// Read a file's raw bytes.
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;
    /// Read a file into a string.
    fn read_to_string(&self, path: &Path) -> Result<String>;
}

/// Default filesystem implementation backed by `std::fs`.
#[derive(Debug, Default, Clone)]
pub struct StdFileSystem;

impl StdFileSystem {
    /// Create a new standard filesystem adapter.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for StdFileSystem {
    fn list_files(&self, root: &Path, excluded_dirs: &[String]) -> Result<Vec<PathBuf>> {
        walk(root, excluded_dirs, read_entries)
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }
}

/// What a directory entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    File,
    Other,
}

type DirEntries = Vec<io::Result<(PathBuf, EntryKind)>>;

fn read_entries(dir: &Path) -> io::Result<DirEntries> {
    let entries = std::fs::read_dir(dir)?
        .map(|entry| -> io::Result<(PathBuf, EntryKind)> {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let kind = if file_type.is_dir() {
                EntryKind::Dir
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };
            Ok((entry.path(), kind))
        })
        .collect();
    Ok(entries)
}

/// Depth-first walk from `root`.
///
/// Only an unreadable root fails the walk. Unreadable subdirectories and
/// entries below it are logged and skipped.
fn walk<R>(root: &Path, excluded_dirs: &[String], mut read_dir: R) -> Result<Vec<PathBuf>>
where
    R: FnMut(&Path) -> io::Result<DirEntries>,
{
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if dir == root => return Err(err.into()),
            Err(err) => {
                warn!("skipping unreadable directory {}: {err}", dir.display());
                continue;
            }
        };
        for entry in entries {
            let (path, kind) = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping unreadable entry in {}: {err}", dir.display());
                    continue;
                }
            };
            if is_hidden(&path) {
                continue;
            }
            match kind {
                EntryKind::Dir if is_excluded(&path, excluded_dirs) => {
                    debug!("skipping excluded directory {}", path.display());
                }
                EntryKind::Dir => pending.push(path),
                EntryKind::File => files.push(path),
                EntryKind::Other => {}
            }
        }
    }

    Ok(files)
}

/// Contents of a walked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContents {
    /// Bytes read successfully.
    Loaded(Arc<[u8]>),
    /// Reading failed with the given message.
    Unreadable(String),
    /// Not read because the run's memory budget was exhausted.
    Deferred,
}

impl FileContents {
    /// The contents as text, if they were read and look like text.
    ///
    /// Text means valid UTF-8 without NUL bytes.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Loaded(bytes) if !bytes.contains(&0) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }
}

/// A candidate file handed to the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the root, `/`-separated.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// File contents.
    pub contents: FileContents,
}

impl SourceFile {
    /// Build an in-memory source file.
    pub fn from_text(path: impl Into<String>, text: &str) -> Self {
        Self {
            path: path.into(),
            size: text.len() as u64,
            contents: FileContents::Loaded(Arc::from(text.as_bytes())),
        }
    }
}

/// Limits applied while walking a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    /// Directory names pruned during the walk.
    pub excluded_dirs: Vec<String>,
    /// Files larger than this are skipped entirely.
    pub max_file_size: u64,
    /// Total bytes that may be held in memory for one run.
    pub memory_budget: Option<u64>,
}

/// Walk `root` and load every eligible file, sorted by relative path.
///
/// Oversized files are dropped; files past the memory budget are kept with
/// [`FileContents::Deferred`]; read failures become
/// [`FileContents::Unreadable`].
pub fn collect_sources<F: FileSystem>(
    fs: &F,
    root: &Path,
    options: &WalkOptions,
) -> Result<Vec<SourceFile>> {
    let mut paths = fs.list_files(root, &options.excluded_dirs)?;
    paths.sort();

    let mut loaded_bytes = 0u64;
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let relative = relative_path(root, &path);
        let size = match fs.file_size(&path) {
            Ok(size) => size,
            Err(err) => {
                sources.push(SourceFile {
                    path: relative,
                    size: 0,
                    contents: FileContents::Unreadable(err.to_string()),
                });
                continue;
            }
        };
        if size > options.max_file_size {
            debug!("skipping {relative}: {size} bytes exceeds max_file_size");
            continue;
        }

        let over_budget = options
            .memory_budget
            .is_some_and(|budget| loaded_bytes.saturating_add(size) > budget);
        let contents = if over_budget {
            warn!("memory limit reached, deferring {relative}");
            FileContents::Deferred
        } else {
            match fs.read_bytes(&path) {
                Ok(bytes) => {
                    loaded_bytes += bytes.len() as u64;
                    FileContents::Loaded(Arc::from(bytes))
                }
                Err(err) => FileContents::Unreadable(err.to_string()),
            }
        };

        sources.push(SourceFile {
            path: relative,
            size,
            contents,
        });
    }

    Ok(sources)
}

/// Render `path` relative to `root` with `/` separators.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn is_excluded(path: &Path, excluded_dirs: &[String]) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| excluded_dirs.iter().any(|excluded| excluded == name))
        .unwrap_or(false)
}
