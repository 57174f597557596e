//! Inode numbers for index paths.
//!
//! The kernel addresses everything by inode while the namespace is keyed
//! by path. Inodes are handed out on first sight of a path and dropped
//! when the path is removed.

use std::collections::HashMap;

use mirrorfs_core::ROOT;

pub const ROOT_INODE: u64 = 1;

#[derive(Debug)]
pub struct InodeTable {
    paths: HashMap<u64, String>,
    inodes: HashMap<String, u64>,
    next_inode: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    pub fn new() -> Self {
        let mut table = Self {
            paths: HashMap::new(),
            inodes: HashMap::new(),
            next_inode: ROOT_INODE + 1,
        };
        table.paths.insert(ROOT_INODE, ROOT.to_string());
        table.inodes.insert(ROOT.to_string(), ROOT_INODE);
        table
    }

    pub fn path(&self, ino: u64) -> Option<&str> {
        self.paths.get(&ino).map(String::as_str)
    }

    pub fn inode(&self, path: &str) -> Option<u64> {
        self.inodes.get(path).copied()
    }

    /// Existing inode for `path`, or a fresh one
    pub fn assign(&mut self, path: &str) -> u64 {
        if let Some(ino) = self.inode(path) {
            return ino;
        }

        let ino = self.next_inode;
        self.next_inode += 1;
        self.paths.insert(ino, path.to_string());
        self.inodes.insert(path.to_string(), ino);
        ino
    }

    /// Drop the mapping for `path`. The root keeps its inode.
    pub fn release(&mut self, path: &str) -> Option<u64> {
        if path == ROOT {
            return None;
        }
        let ino = self.inodes.remove(path)?;
        self.paths.remove(&ino);
        Some(ino)
    }
}

/// Path of `name` inside `parent`
pub fn join(parent: &str, name: &str) -> String {
    if parent == ROOT {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Parent directory of `path`; the root is its own parent
pub fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => ROOT,
        Some(pos) => &path[..pos],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_preassigned() {
        let table = InodeTable::new();
        assert_eq!(table.path(ROOT_INODE), Some("/"));
        assert_eq!(table.inode("/"), Some(ROOT_INODE));
        assert_eq!(table.path(ROOT_INODE + 1), None);
    }

    #[test]
    fn test_assign_is_stable() {
        let mut table = InodeTable::new();
        let a = table.assign("/a");
        let b = table.assign("/a/b");
        assert_ne!(a, b);
        assert_eq!(table.assign("/a"), a);
        assert_eq!(table.path(b), Some("/a/b"));
    }

    #[test]
    fn test_release_frees_mapping() {
        let mut table = InodeTable::new();
        let ino = table.assign("/gone");
        assert_eq!(table.release("/gone"), Some(ino));
        assert_eq!(table.path(ino), None);
        assert_eq!(table.release("/gone"), None);
        assert_ne!(table.assign("/gone"), ino);
    }

    #[test]
    fn test_root_cannot_be_released() {
        let mut table = InodeTable::new();
        assert_eq!(table.release("/"), None);
        assert_eq!(table.path(ROOT_INODE), Some("/"));
    }

    #[test]
    fn test_join_and_parent() {
        assert_eq!(join("/", "tags"), "/tags");
        assert_eq!(join("/tags", "red"), "/tags/red");
        assert_eq!(parent_of("/tags/red"), "/tags");
        assert_eq!(parent_of("/tags"), "/");
        assert_eq!(parent_of("/"), "/");
    }
}
