//! The filesystem operation set.
//!
//! Every operation takes an absolute path and runs to completion under the
//! index lock: lookups and listings share a read lock, anything that
//! inserts, removes or writes takes the write lock. Both halves of a
//! mirrored create or write happen inside one write-locked section.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use mirrorfs_config::{log_fs_debug, log_fs_trace, log_mirror_debug};

use crate::entry::{Entry, EntryKind, FileContent, DEFAULT_MAX_FILE_SIZE};
use crate::error::{FsError, Result};
use crate::index::{PathIndex, ROOT};
use crate::mirror::mirror_of;

pub const DIR_PERM: u16 = 0o755;
pub const FILE_PERM: u16 = 0o444;

/// Attributes reported by `getattr`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub kind: EntryKind,
    pub perm: u16,
    pub nlink: u32,
    pub size: u64,
}

impl Stat {
    fn of(entry: &Entry) -> Self {
        match entry.kind() {
            EntryKind::Directory => Self {
                kind: EntryKind::Directory,
                perm: DIR_PERM,
                nlink: 2,
                size: 0,
            },
            EntryKind::File => Self {
                kind: EntryKind::File,
                perm: FILE_PERM,
                nlink: 1,
                size: entry.size(),
            },
        }
    }
}

/// Access and modification times passed to `utimens`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamps {
    pub atime: Option<SystemTime>,
    pub mtime: Option<SystemTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Maintain rotated copies on create and write
    pub mirror: bool,
    /// Largest offset + size a write may reach
    pub max_file_size: u64,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            mirror: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Debug)]
pub struct FilesystemService {
    index: RwLock<PathIndex>,
    options: ServiceOptions,
}

impl Default for FilesystemService {
    fn default() -> Self {
        Self::new(ServiceOptions::default())
    }
}

impl FilesystemService {
    /// A namespace holding only the root directory
    pub fn new(options: ServiceOptions) -> Self {
        Self {
            index: RwLock::new(PathIndex::with_root()),
            options,
        }
    }

    pub fn init(&self) {
        log_fs_debug!(
            "init",
            entries = self.read_index().len(),
            mirror = self.options.mirror
        );
    }

    pub fn getattr(&self, path: &str) -> Result<Stat> {
        log_fs_debug!("getattr", path = path);
        check_path(path)?;

        let index = self.read_index();
        index
            .find(path)
            .map(Stat::of)
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    pub fn open(&self, path: &str) -> Result<()> {
        log_fs_debug!("open", path = path);
        check_path(path)?;

        if self.read_index().contains(path) {
            Ok(())
        } else {
            Err(FsError::NotFound(path.to_string()))
        }
    }

    /// Up to `size` bytes from `offset`; empty past the end of the file
    pub fn read(&self, path: &str, size: usize, offset: u64) -> Result<Vec<u8>> {
        log_fs_debug!("read", path = path, size = size, offset = offset);
        check_path(path)?;

        let index = self.read_index();
        let entry = index
            .find(path)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        let content = entry
            .content()
            .ok_or_else(|| FsError::IsADirectory(path.to_string()))?;

        let Ok(offset) = usize::try_from(offset) else {
            return Ok(Vec::new());
        };
        Ok(content.read_at(offset, size).to_vec())
    }

    /// Write `data` at `offset`, then repeat it on the mirror path if
    /// one applies. Returns the number of bytes accepted.
    ///
    /// Both buffers are grown before either is written, so a failed
    /// allocation leaves the pair as it was.
    pub fn write(&self, path: &str, data: &[u8], offset: u64) -> Result<usize> {
        log_fs_debug!("write", path = path, size = data.len(), offset = offset);
        check_path(path)?;

        let (offset, end) = self.checked_range(path, offset, data.len())?;
        let mut index = self.write_index();

        reserve_file(&mut index, path, end)?;

        let mirror = match self.mirror_path(path) {
            Some(mirror) => match reserve_file(&mut index, &mirror, end) {
                Ok(()) => Some(mirror),
                Err(FsError::NoSpace(_)) => return Err(FsError::NoSpace(path.to_string())),
                Err(e) => {
                    log_mirror_debug!(
                        "write skipped",
                        path = path,
                        mirror = mirror.as_str(),
                        reason = tracing::field::display(&e)
                    );
                    None
                }
            },
            None => None,
        };

        write_file(&mut index, path, data, offset)?;
        if let Some(mirror) = mirror {
            write_file(&mut index, &mirror, data, offset)?;
            log_mirror_debug!("write", path = path, mirror = mirror.as_str());
        }

        Ok(data.len())
    }

    pub fn mkdir(&self, path: &str) -> Result<()> {
        log_fs_debug!("mkdir", path = path);
        check_path(path)?;

        self.write_index().insert(Entry::new_directory(path))
    }

    /// Remove the entry at `path`. Children stay in the index and remain
    /// reachable by their full path.
    pub fn rmdir(&self, path: &str) -> Result<()> {
        log_fs_debug!("rmdir", path = path);
        self.remove(path)
    }

    /// Create a file at `path` and at its mirror path. A side that already
    /// exists is left as it is.
    pub fn create(&self, path: &str) -> Result<()> {
        log_fs_debug!("create", path = path);
        check_path(path)?;

        let mut index = self.write_index();

        if let Err(e) = index.insert(Entry::new_file(path)) {
            log_fs_debug!(
                "create kept existing entry",
                path = path,
                reason = tracing::field::display(&e)
            );
        }

        if let Some(mirror) = self.mirror_path(path) {
            match index.insert(Entry::new_file(mirror.as_str())) {
                Ok(()) => log_mirror_debug!("create", path = path, mirror = mirror.as_str()),
                Err(e) => log_mirror_debug!(
                    "create kept existing entry",
                    path = path,
                    mirror = mirror.as_str(),
                    reason = tracing::field::display(&e)
                ),
            }
        }

        Ok(())
    }

    /// Create a single file; never mirrored
    pub fn mknod(&self, path: &str) -> Result<()> {
        log_fs_debug!("mknod", path = path);
        check_path(path)?;

        self.write_index().insert(Entry::new_file(path))
    }

    /// Remove the entry at `path`. The mirror copy is left in place.
    pub fn unlink(&self, path: &str) -> Result<()> {
        log_fs_debug!("unlink", path = path);
        self.remove(path)
    }

    /// `.`, `..`, then the names of the immediate children of `path`
    pub fn readdir(&self, path: &str) -> Result<Vec<String>> {
        log_fs_debug!("readdir", path = path);
        check_path(path)?;

        let index = self.read_index();
        match index.find(path) {
            Some(entry) if entry.is_dir() => {}
            _ => return Err(FsError::NotFound(path.to_string())),
        }

        let mut names = vec![".".to_string(), "..".to_string()];
        names.extend(index.children_of(path).map(|name| {
            log_fs_trace!("readdir child", path = path, name = name);
            name.to_string()
        }));
        Ok(names)
    }

    pub fn release(&self, path: &str) -> Result<()> {
        log_fs_debug!("release", path = path);
        Ok(())
    }

    /// Timestamps are not tracked
    pub fn utimens(&self, path: &str, times: Timestamps) -> Result<()> {
        log_fs_debug!(
            "utimens",
            path = path,
            atime = tracing::field::debug(&times.atime),
            mtime = tracing::field::debug(&times.mtime)
        );
        Ok(())
    }

    /// Number of entries, root included
    pub fn entry_count(&self) -> usize {
        self.read_index().len()
    }

    fn remove(&self, path: &str) -> Result<()> {
        check_path(path)?;
        if path == ROOT {
            return Err(FsError::RootBusy);
        }

        self.write_index().remove(path).map(drop)
    }

    /// Offset and end of a write, both within `max_file_size`
    fn checked_range(&self, path: &str, offset: u64, len: usize) -> Result<(usize, usize)> {
        let too_large = || FsError::FileTooLarge(path.to_string());
        let end = offset.checked_add(len as u64).ok_or_else(too_large)?;
        if end > self.options.max_file_size {
            return Err(too_large());
        }
        let end = usize::try_from(end).map_err(|_| too_large())?;
        let offset = usize::try_from(offset).map_err(|_| too_large())?;
        Ok((offset, end))
    }

    fn mirror_path(&self, path: &str) -> Option<String> {
        if self.options.mirror {
            mirror_of(path)
        } else {
            None
        }
    }

    fn read_index(&self) -> RwLockReadGuard<'_, PathIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, PathIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn file_content<'a>(index: &'a mut PathIndex, path: &str) -> Result<&'a mut FileContent> {
    index
        .find_mut(path)
        .ok_or_else(|| FsError::NotFound(path.to_string()))?
        .content_mut()
        .ok_or_else(|| FsError::IsADirectory(path.to_string()))
}

fn reserve_file(index: &mut PathIndex, path: &str, end: usize) -> Result<()> {
    file_content(index, path)?
        .reserve(end)
        .map_err(|_| FsError::NoSpace(path.to_string()))
}

fn write_file(index: &mut PathIndex, path: &str, data: &[u8], offset: usize) -> Result<()> {
    file_content(index, path)?
        .write_at(offset, data)
        .map(drop)
        .map_err(|_| FsError::NoSpace(path.to_string()))
}

/// Absolute, no trailing separator except on the root, no empty components
fn check_path(path: &str) -> Result<()> {
    if path == ROOT {
        return Ok(());
    }
    match path.strip_prefix('/') {
        Some(body) if !body.split('/').any(str::is_empty) => Ok(()),
        _ => Err(FsError::InvalidPath(path.to_string())),
    }
}
