//! Namespace entries: directories and growable files.

use std::collections::TryReserveError;

/// Capacity of a freshly created file buffer
pub const INITIAL_CAPACITY: usize = 1;

/// Default cap on offset + size for a single file (1 GiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1 << 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// File bytes plus the allocation size they are tracked against.
///
/// The logical length is `data.len()`. `capacity` doubles whenever a
/// write would run past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    data: Vec<u8>,
    capacity: usize,
}

impl Default for FileContent {
    fn default() -> Self {
        Self::new()
    }
}

impl FileContent {
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(INITIAL_CAPACITY),
            capacity: INITIAL_CAPACITY,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Up to `size` bytes starting at `offset`, clipped to the length.
    /// Offsets at or past the end yield an empty slice.
    pub fn read_at(&self, offset: usize, size: usize) -> &[u8] {
        if offset >= self.data.len() {
            return &[];
        }
        let end = offset.saturating_add(size).min(self.data.len());
        &self.data[offset..end]
    }

    /// Copy `bytes` in at `offset`, growing first if needed. Bytes between
    /// the old length and `offset` are unspecified. Nothing is written
    /// when the buffer cannot grow.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<usize, TryReserveError> {
        let end = offset.saturating_add(bytes.len());
        self.reserve(end)?;

        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(bytes);
        Ok(bytes.len())
    }

    /// Double the capacity until `end` fits. Only the used prefix moves to
    /// the new buffer; on failure the content is untouched.
    pub fn reserve(&mut self, end: usize) -> Result<(), TryReserveError> {
        if end <= self.capacity {
            return Ok(());
        }
        let mut capacity = self.capacity;
        while end > capacity {
            capacity = capacity.saturating_mul(2);
        }

        let mut fresh = Vec::new();
        fresh.try_reserve_exact(capacity)?;
        fresh.extend_from_slice(&self.data);
        self.data = fresh;
        self.capacity = capacity;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Directory,
    File(FileContent),
}

/// A single namespace node. The index key always equals `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    path: String,
    node: Node,
}

impl Entry {
    pub fn new_directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            node: Node::Directory,
        }
    }

    pub fn new_file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            node: Node::File(FileContent::new()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> EntryKind {
        match self.node {
            Node::Directory => EntryKind::Directory,
            Node::File(_) => EntryKind::File,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == EntryKind::Directory
    }

    pub fn content(&self) -> Option<&FileContent> {
        match &self.node {
            Node::File(content) => Some(content),
            Node::Directory => None,
        }
    }

    pub fn content_mut(&mut self) -> Option<&mut FileContent> {
        match &mut self.node {
            Node::File(content) => Some(content),
            Node::Directory => None,
        }
    }

    /// Logical size: file length, zero for directories
    pub fn size(&self) -> u64 {
        self.content().map_or(0, |c| c.len() as u64)
    }
}
