//! Directory walker with ignore-pattern handling.
//!
//! Streams eligible source files under a root into a bounded channel so the
//! pipeline's hash workers throttle the walk naturally. Directories are
//! pruned against `.synapseignore` patterns; the file is created with a
//! default list on first run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Metadata about a discovered source file.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the walk root, with forward slashes.
    pub rel_path: String,
    /// Size in bytes.
    pub size: u64,
}

/// Largest file considered for indexing (1 MiB).
const MAX_FILE_SIZE: u64 = 1 << 20;

/// Bound of the walker's output channel.
const WALK_BUFFER: usize = 64;

/// Patterns used when no `.synapseignore` exists at the root.
const DEFAULT_IGNORES: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "vendor",
    "__pycache__",
    ".idea",
    ".vscode",
    ".synapse",
    "dist",
    "build",
];

/// Walks the tree rooted at `root`, sending eligible files on the returned
/// channel. Only files whose extension is in `allowed_exts` are emitted;
/// directories matching `.synapseignore` patterns are pruned. Per-entry I/O
/// errors are skipped; a fatal walk error is reported by the join handle.
pub fn walk(
    root: PathBuf,
    allowed_exts: HashSet<String>,
) -> (mpsc::Receiver<FileInfo>, JoinHandle<Result<()>>) {
    let (tx, rx) = mpsc::channel(WALK_BUFFER);
    let handle = tokio::task::spawn_blocking(move || walk_blocking(&root, &allowed_exts, tx));
    (rx, handle)
}

fn walk_blocking(
    root: &Path,
    allowed_exts: &HashSet<String>,
    tx: mpsc::Sender<FileInfo>,
) -> Result<()> {
    let root = root.canonicalize().map_err(|e| Error::Io {
        path: root.to_path_buf(),
        source: e,
    })?;

    let ignores = IgnorePatterns::load(&root);

    let mut it = WalkDir::new(&root).follow_links(false).into_iter();
    loop {
        let entry = match it.next() {
            None => break,
            Some(Err(_)) => continue, // skip unreadable entries, keep walking
            Some(Ok(entry)) => entry,
        };

        let rel = entry
            .path()
            .strip_prefix(&root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        if entry.file_type().is_dir() {
            if entry.path() == root {
                continue;
            }
            if ignores.matches(entry.file_name().to_string_lossy().as_ref(), &rel) {
                it.skip_current_dir();
            }
            continue;
        }

        if entry.path_is_symlink() || !entry.file_type().is_file() {
            continue;
        }

        let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !allowed_exts.contains(ext) {
            continue;
        }

        let Ok(meta) = entry.metadata() else { continue };
        if meta.len() == 0 || meta.len() > MAX_FILE_SIZE {
            continue;
        }

        let info = FileInfo {
            path: entry.path().to_path_buf(),
            rel_path: rel,
            size: meta.len(),
        };
        if tx.blocking_send(info).is_err() {
            // Downstream hung up; nothing left to do.
            return Ok(());
        }
    }

    Ok(())
}

/// The parsed `.synapseignore` pattern list.
struct IgnorePatterns {
    patterns: Vec<String>,
    globs: GlobSet,
}

impl IgnorePatterns {
    /// Reads `.synapseignore` from the root, creating it with the default
    /// pattern list when absent.
    fn load(root: &Path) -> Self {
        let ignore_path = root.join(".synapseignore");
        let patterns = match std::fs::read_to_string(&ignore_path) {
            Ok(text) => {
                let parsed: Vec<String> = text
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(str::to_string)
                    .collect();
                if parsed.is_empty() {
                    default_patterns()
                } else {
                    parsed
                }
            }
            Err(_) => {
                write_default_ignore_file(&ignore_path);
                default_patterns()
            }
        };

        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            // Shell-glob semantics: `*` and `?` do not cross `/`.
            if let Ok(glob) = GlobBuilder::new(pattern).literal_separator(true).build() {
                builder.add(glob);
            }
        }
        let globs = builder.build().unwrap_or_else(|_| GlobSet::empty());

        IgnorePatterns { patterns, globs }
    }

    /// True when a directory's base name or relative path matches any
    /// pattern exactly, by path prefix, or by glob.
    fn matches(&self, name: &str, rel_path: &str) -> bool {
        for pattern in &self.patterns {
            if name == pattern || rel_path.starts_with(pattern.as_str()) {
                return true;
            }
        }
        self.globs.is_match(name) || self.globs.is_match(rel_path)
    }
}

fn default_patterns() -> Vec<String> {
    DEFAULT_IGNORES.iter().map(|p| p.to_string()).collect()
}

/// Best-effort write of the default ignore file; if it fails the defaults
/// are still used in memory.
fn write_default_ignore_file(path: &Path) {
    let mut body = String::from(
        "# Directories to exclude from indexing.\n# One pattern per line. Supports exact names and globs.\n\n",
    );
    for pattern in DEFAULT_IGNORES {
        body.push_str(pattern);
        body.push('\n');
    }
    let _ = std::fs::write(path, body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    async fn collect(root: &Path, exts: &[&str]) -> Vec<FileInfo> {
        let allowed: HashSet<String> = exts.iter().map(|e| e.to_string()).collect();
        let (mut rx, handle) = walk(root.to_path_buf(), allowed);
        let mut out = Vec::new();
        while let Some(info) = rx.recv().await {
            out.push(info);
        }
        handle.await.unwrap().unwrap();
        out.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        out
    }

    #[tokio::test]
    async fn emits_only_permitted_extensions() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.go"), "package a\n").unwrap();
        fs::write(tmp.path().join("b.py"), "x = 1\n").unwrap();
        fs::write(tmp.path().join("c.md"), "# doc\n").unwrap();

        let files = collect(tmp.path(), &["go", "py"]).await;
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["a.go", "b.py"]);
    }

    #[tokio::test]
    async fn creates_default_ignore_file_and_prunes_defaults() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("vendor")).unwrap();
        fs::write(tmp.path().join("vendor").join("lib.go"), "package lib\n").unwrap();
        fs::write(tmp.path().join("main.go"), "package main\n").unwrap();

        let files = collect(tmp.path(), &["go"]).await;
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["main.go"]);

        let ignore = fs::read_to_string(tmp.path().join(".synapseignore")).unwrap();
        assert!(ignore.contains("node_modules"));
        assert!(ignore.contains(".git"));
    }

    #[tokio::test]
    async fn honors_custom_ignore_patterns() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".synapseignore"), "# comment\n\ngenerated\ntest_*\n").unwrap();
        for dir in ["generated", "test_fixtures", "src"] {
            fs::create_dir(tmp.path().join(dir)).unwrap();
            fs::write(tmp.path().join(dir).join("f.go"), "package f\n").unwrap();
        }

        let files = collect(tmp.path(), &["go"]).await;
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["src/f.go"]);
    }

    #[tokio::test]
    async fn prunes_by_relative_path_prefix() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".synapseignore"), "third_party/vendor\n").unwrap();
        fs::create_dir_all(tmp.path().join("third_party/vendor")).unwrap();
        fs::write(tmp.path().join("third_party/vendor/dep.go"), "package dep\n").unwrap();
        fs::create_dir_all(tmp.path().join("third_party/ours")).unwrap();
        fs::write(tmp.path().join("third_party/ours/ok.go"), "package ok\n").unwrap();

        let files = collect(tmp.path(), &["go"]).await;
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["third_party/ours/ok.go"]);
    }

    #[tokio::test]
    async fn skips_empty_and_oversized_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("empty.go"), "").unwrap();
        fs::write(tmp.path().join("big.go"), vec![b'x'; (MAX_FILE_SIZE + 1) as usize]).unwrap();
        fs::write(tmp.path().join("ok.go"), "package ok\n").unwrap();

        let files = collect(tmp.path(), &["go"]).await;
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["ok.go"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn skips_symlinks() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("real.go"), "package real\n").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("real.go"), tmp.path().join("link.go")).unwrap();

        let files = collect(tmp.path(), &["go"]).await;
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["real.go"]);
    }

    #[tokio::test]
    async fn missing_root_is_a_fatal_walk_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let (mut rx, handle) = walk(missing, HashSet::new());
        assert!(rx.recv().await.is_none());
        assert!(handle.await.unwrap().is_err());
    }
}
