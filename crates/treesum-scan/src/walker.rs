//! Resumable, fault-isolating tree walker.

use std::cmp::Ordering;
use std::fs::{self, FileType};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use jwalk::{DirEntry, Parallelism, WalkDir};
use tracing::{debug, info, warn};

use treesum_core::{FileRecord, WalkConfig, WalkError, WalkFault, WalkStats};

use crate::digest::FileDigest;
use crate::sink::{FaultSink, LogSink};

type Entries = Box<dyn Iterator<Item = Result<DirEntry<((), ())>, jwalk::Error>>>;

/// Walks a directory tree and digests every regular file in it.
///
/// Traversal is depth-first and single-threaded. Within a directory, files
/// are visited before subdirectories, then each subdirectory is descended
/// into in turn.
///
/// Statistics belong to the walker and are reset by every call to
/// [`TreeWalker::walk`]. The returned [`Walk`] borrows the walker mutably,
/// so only one walk can be in progress at a time.
pub struct TreeWalker<S = LogSink> {
    root: PathBuf,
    config: WalkConfig,
    digest: FileDigest,
    stats: WalkStats,
    sink: S,
}

impl TreeWalker<LogSink> {
    /// Create a walker over `root` with default options.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, WalkError> {
        Self::with_config(WalkConfig::new(root.as_ref()))
    }

    /// Create a walker from a config, logging faults through `tracing`.
    pub fn with_config(config: WalkConfig) -> Result<Self, WalkError> {
        Self::with_sink(config, LogSink)
    }
}

impl<S: FaultSink> TreeWalker<S> {
    /// Create a walker that reports faults to `sink`.
    pub fn with_sink(config: WalkConfig, sink: S) -> Result<Self, WalkError> {
        if config.block_size == 0 {
            return Err(WalkError::InvalidConfig {
                message: "Block size must be greater than zero".to_string(),
            });
        }

        let root = config
            .root
            .canonicalize()
            .map_err(|e| WalkError::io(&config.root, e))?;
        if !root.is_dir() {
            return Err(WalkError::NotADirectory { path: root });
        }
        fs::read_dir(&root).map_err(|e| WalkError::io(&root, e))?;

        Ok(Self {
            digest: FileDigest::with_block_size(config.block_size),
            root,
            config,
            stats: WalkStats::new(),
            sink,
        })
    }

    /// Canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Configuration the walker was built from.
    pub fn config(&self) -> &WalkConfig {
        &self.config
    }

    /// Statistics of the most recent walk.
    pub fn stats(&self) -> &WalkStats {
        &self.stats
    }

    /// Get a reference to the fault sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the walker, returning its fault sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Start a new walk, optionally resuming after `resume`.
    ///
    /// `resume` may be relative to the root or absolute, and must name an
    /// existing file or directory inside the root. Files up to and including
    /// a resume file are counted as skipped; a resume directory is itself the
    /// point where digesting restarts.
    ///
    /// A resume file is not digested again, so its line in the earlier
    /// manifest must already be complete.
    ///
    /// Marker errors are returned before any file is visited. Per-file faults
    /// never end the walk; they are counted and handed to the sink.
    pub fn walk(&mut self, resume: Option<&Path>) -> Result<Walk<'_, S>, WalkError> {
        self.stats = WalkStats::new();

        let marker = resume.map(|marker| self.resolve_marker(marker)).transpose()?;
        if let Some(marker) = &marker {
            info!(marker = %marker.display(), "resuming walk");
        }

        let entries = self.entries();
        Ok(Walk {
            walker: self,
            entries,
            marker,
            finished: false,
        })
    }

    /// Resolve a resume marker to the path the traversal will report for it.
    ///
    /// Parent directories are canonicalized; a final symlink component is
    /// kept as is, since the traversal reports links by their own path.
    fn resolve_marker(&self, marker: &Path) -> Result<PathBuf, WalkError> {
        let joined = self.root.join(marker);
        let not_found = |source| WalkError::ResumeMarkerNotFound {
            path: joined.clone(),
            source,
        };

        fs::symlink_metadata(&joined).map_err(not_found)?;
        let resolved = match (joined.parent(), joined.file_name()) {
            (Some(parent), Some(name)) => parent.canonicalize().map_err(not_found)?.join(name),
            _ => joined.canonicalize().map_err(not_found)?,
        };

        if !resolved.starts_with(&self.root) {
            return Err(WalkError::ResumeMarkerOutsideRoot {
                marker: resolved,
                root: self.root.clone(),
            });
        }
        Ok(resolved)
    }

    fn entries(&self) -> Entries {
        let sort = self.config.sort_entries;
        let walker = WalkDir::new(&self.root)
            .parallelism(Parallelism::Serial)
            .skip_hidden(false)
            .follow_links(self.config.follow_symlinks)
            .process_read_dir(move |_depth, _path, _state, children| {
                if sort {
                    children.sort_by(|a, b| match (a, b) {
                        (Ok(a), Ok(b)) => a.file_name.cmp(&b.file_name),
                        (Ok(_), Err(_)) => Ordering::Less,
                        (Err(_), Ok(_)) => Ordering::Greater,
                        (Err(_), Err(_)) => Ordering::Equal,
                    });
                }
                // Stable: files keep their relative order ahead of directories.
                children.sort_by_key(|child| {
                    matches!(child, Ok(entry) if entry.file_type().is_dir())
                });
            });

        Box::new(walker.into_iter())
    }
}

/// How a traversal entry takes part in the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Directory,
    File,
    Ignored,
}

fn classify(path: &Path, file_type: FileType) -> EntryKind {
    if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_file() {
        EntryKind::File
    } else if file_type.is_symlink() {
        // Unfollowed links to directories are not descended into; any
        // other link, dangling ones included, is digested through.
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {
                debug!(path = %path.display(), "not following directory link");
                EntryKind::Ignored
            }
            _ => EntryKind::File,
        }
    } else {
        debug!(path = %path.display(), "ignoring special file");
        EntryKind::Ignored
    }
}

/// A walk in progress.
///
/// Yields one [`FileRecord`] per successfully digested file, with paths
/// relative to the root. Dropping the walk cancels it.
pub struct Walk<'a, S> {
    walker: &'a mut TreeWalker<S>,
    entries: Entries,
    /// Set while skipping files up to the resume marker.
    marker: Option<PathBuf>,
    finished: bool,
}

impl<S: FaultSink> Walk<'_, S> {
    /// Statistics accumulated so far.
    pub fn stats(&self) -> &WalkStats {
        &self.walker.stats
    }

    /// Canonical root directory.
    pub fn root(&self) -> &Path {
        &self.walker.root
    }

    /// Whether files are still being skipped up to the resume marker.
    pub fn is_resuming(&self) -> bool {
        self.marker.is_some()
    }

    fn stop_resuming(&mut self) {
        if let Some(marker) = self.marker.take() {
            info!(
                marker = %marker.display(),
                skipped = self.walker.stats.skipped,
                "reached resume marker"
            );
        }
    }

    fn report(&mut self, fault: WalkFault) {
        self.walker.sink.report(&fault);
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        if let Some(marker) = &self.marker {
            warn!(marker = %marker.display(), "resume marker was never reached");
        }
        let stats = &self.walker.stats;
        info!(
            skipped = stats.skipped,
            processed = stats.processed,
            erroneous = stats.erroneous,
            bytes = stats.processed_bytes,
            "walk finished"
        );
    }
}

impl<S: FaultSink> Iterator for Walk<'_, S> {
    type Item = FileRecord;

    fn next(&mut self) -> Option<FileRecord> {
        if self.finished {
            return None;
        }

        while let Some(result) = self.entries.next() {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    self.report(WalkFault::Traversal {
                        path,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            let path = entry.path();
            if let Some(err) = &entry.read_children_error {
                let message = err.to_string();
                self.report(WalkFault::Traversal {
                    path: path.clone(),
                    message,
                });
            }

            let is_marker = self.marker.as_deref() == Some(path.as_path());
            match classify(&path, entry.file_type()) {
                EntryKind::Directory | EntryKind::Ignored => {
                    if is_marker {
                        self.stop_resuming();
                    }
                }
                EntryKind::File if self.marker.is_some() => {
                    debug!(path = %path.display(), "skipping");
                    self.walker.stats.record_skipped();
                    if is_marker {
                        self.stop_resuming();
                    }
                }
                EntryKind::File => match self.walker.digest.digest(&path) {
                    Ok((size, checksum)) => {
                        self.walker.stats.record_processed(size);
                        let relative = path
                            .strip_prefix(&self.walker.root)
                            .map(Path::to_path_buf)
                            .unwrap_or_else(|_| path.clone());
                        return Some(FileRecord::new(relative, size, checksum));
                    }
                    Err(err) => {
                        self.walker.stats.record_error();
                        self.report(WalkFault::Digest(err));
                    }
                },
            }
        }

        self.finish();
        None
    }
}

impl<S: FaultSink> FusedIterator for Walk<'_, S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("dir1")).unwrap();
        fs::create_dir(root.join("dir2")).unwrap();
        fs::create_dir(root.join("dir1/subdir")).unwrap();

        fs::write(root.join("file1.txt"), "hello").unwrap();
        fs::write(root.join("dir1/file2.txt"), "world world world").unwrap();
        fs::write(root.join("dir1/subdir/file3.txt"), "test").unwrap();
        fs::write(root.join("dir2/file4.txt"), "another file here").unwrap();

        temp
    }

    fn sorted_walker(root: &Path) -> TreeWalker {
        let config = WalkConfig::builder()
            .root(root)
            .sort_entries(true)
            .build()
            .unwrap();
        TreeWalker::with_config(config).unwrap()
    }

    fn paths(records: &[FileRecord]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.path.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_basic_walk() {
        let temp = create_test_tree();
        let mut walker = TreeWalker::new(temp.path()).unwrap();

        let records: Vec<_> = walker.walk(None).unwrap().collect();

        assert_eq!(records.len(), 4);
        assert_eq!(walker.stats().processed, 4);
        assert_eq!(walker.stats().skipped, 0);
        assert_eq!(walker.stats().erroneous, 0);
        assert_eq!(
            walker.stats().processed_bytes,
            records.iter().map(|r| r.size).sum::<u64>()
        );
    }

    #[test]
    fn test_files_before_subdirectories() {
        let temp = create_test_tree();
        let mut walker = sorted_walker(temp.path());

        let records: Vec<_> = walker.walk(None).unwrap().collect();

        assert_eq!(
            paths(&records),
            [
                "file1.txt",
                "dir1/file2.txt",
                "dir1/subdir/file3.txt",
                "dir2/file4.txt",
            ]
        );
    }

    #[test]
    fn test_stats_visible_mid_walk() {
        let temp = create_test_tree();
        let mut walker = sorted_walker(temp.path());
        let mut walk = walker.walk(None).unwrap();

        let first = walk.next().unwrap();
        assert_eq!(walk.stats().processed, 1);
        assert_eq!(walk.stats().processed_bytes, first.size);
        assert!(!walk.is_resuming());
    }

    #[test]
    fn test_walk_is_fused_and_restartable() {
        let temp = create_test_tree();
        let mut walker = TreeWalker::new(temp.path()).unwrap();

        let mut walk = walker.walk(None).unwrap();
        while walk.next().is_some() {}
        assert!(walk.next().is_none());

        // A second walk starts over with fresh statistics.
        assert_eq!(walker.walk(None).unwrap().count(), 4);
        assert_eq!(walker.stats().processed, 4);
    }

    #[test]
    fn test_resume_from_directory() {
        let temp = create_test_tree();
        let mut walker = sorted_walker(temp.path());

        let records: Vec<_> = walker.walk(Some(Path::new("dir1/subdir"))).unwrap().collect();

        assert_eq!(paths(&records), ["dir1/subdir/file3.txt", "dir2/file4.txt"]);
        assert_eq!(walker.stats().skipped, 2);
        assert_eq!(walker.stats().processed, 2);
    }

    #[test]
    fn test_resume_from_root_skips_nothing() {
        let temp = create_test_tree();
        let mut walker = sorted_walker(temp.path());

        let root = walker.root().to_path_buf();
        assert_eq!(walker.walk(Some(root.as_path())).unwrap().count(), 4);
        assert_eq!(walker.stats().skipped, 0);
    }

    #[test]
    fn test_missing_marker_is_fatal() {
        let temp = create_test_tree();
        let mut walker = TreeWalker::new(temp.path()).unwrap();

        let err = walker.walk(Some(Path::new("nope.txt"))).err().unwrap();
        assert!(matches!(err, WalkError::ResumeMarkerNotFound { .. }));
    }

    #[test]
    fn test_marker_outside_root_is_fatal() {
        let temp = create_test_tree();
        let mut walker = TreeWalker::new(temp.path().join("dir1")).unwrap();

        let err = walker.walk(Some(Path::new("../dir2"))).err().unwrap();
        assert!(matches!(err, WalkError::ResumeMarkerOutsideRoot { .. }));
    }

    #[test]
    fn test_invalid_roots() {
        let temp = create_test_tree();

        let err = TreeWalker::new(temp.path().join("missing")).err().unwrap();
        assert!(matches!(err, WalkError::RootNotFound { .. }));

        let err = TreeWalker::new(temp.path().join("file1.txt")).err().unwrap();
        assert!(matches!(err, WalkError::NotADirectory { .. }));

        let mut config = WalkConfig::new(temp.path());
        config.block_size = 0;
        let err = TreeWalker::with_config(config).err().unwrap();
        assert!(matches!(err, WalkError::InvalidConfig { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_root_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let locked = temp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("a.txt"), "a").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not bind a privileged user.
        let readable = fs::read_dir(&locked).is_ok();
        let result = TreeWalker::new(&locked);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if readable {
            return;
        }

        let err = result.err().unwrap();
        assert!(matches!(err, WalkError::Io { .. }));
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn test_vanished_file_is_counted_as_error() {
        let temp = create_test_tree();
        fs::write(temp.path().join("file0.txt"), "gone soon").unwrap();

        let mut faults = Vec::new();
        let config = WalkConfig::builder()
            .root(temp.path())
            .sort_entries(true)
            .build()
            .unwrap();
        let mut walker =
            TreeWalker::with_sink(config, |f: &WalkFault| faults.push(f.path().to_path_buf()))
                .unwrap();

        let mut walk = walker.walk(None).unwrap();
        let first = walk.next().unwrap();
        assert_eq!(first.path, Path::new("file0.txt"));

        // The root listing is already read; file1.txt is removed before
        // it is digested.
        fs::remove_file(temp.path().join("file1.txt")).unwrap();
        let rest: Vec<_> = walk.collect();

        assert_eq!(
            paths(&rest),
            ["dir1/file2.txt", "dir1/subdir/file3.txt", "dir2/file4.txt"]
        );
        assert_eq!(walker.stats().erroneous, 1);
        assert_eq!(walker.stats().processed, 4);
        assert_eq!(walker.stats().visited(), 5);
        drop(walker);
        assert_eq!(faults.len(), 1);
        assert!(faults[0].ends_with("file1.txt"));
    }
}
