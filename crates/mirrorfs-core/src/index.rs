//! Ordered, string-keyed index of every namespace entry.
//!
//! Keys are absolute paths compared bytewise. There are no parent/child
//! links: a directory's children are the keys that extend `dir + "/"`
//! with exactly one more component, and because every key sharing a
//! prefix sorts into one contiguous run, listing a directory is a single
//! range scan.

use std::collections::btree_map::{self, BTreeMap};
use std::ops::Bound;

use crate::entry::Entry;
use crate::error::{FsError, Result};

pub const ROOT: &str = "/";

#[derive(Debug, Default)]
pub struct PathIndex {
    entries: BTreeMap<String, Entry>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// An index holding only the root directory
    pub fn with_root() -> Self {
        let root = Entry::new_directory(ROOT);
        Self {
            entries: BTreeMap::from([(ROOT.to_string(), root)]),
        }
    }

    /// Insert `entry` under its own path. Existing entries are never replaced.
    pub fn insert(&mut self, entry: Entry) -> Result<()> {
        match self.entries.entry(entry.path().to_string()) {
            btree_map::Entry::Occupied(slot) => Err(FsError::AlreadyExists(slot.key().clone())),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    pub fn find(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Entry> {
        self.entries.get_mut(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Result<Entry> {
        self.entries
            .remove(path)
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Leaf names of the immediate children of `dir`, in path order.
    ///
    /// Each call starts a fresh scan. Deeper descendants inside the run are
    /// skipped; the scan ends at the first key outside `dir`'s subtree.
    pub fn children_of<'a>(&'a self, dir: &str) -> impl Iterator<Item = &'a str> + 'a {
        let prefix = if dir == ROOT {
            ROOT.to_string()
        } else {
            format!("{}/", dir.trim_end_matches('/'))
        };
        let skip = prefix.len();

        let run = self
            .entries
            .range::<str, _>((Bound::Excluded(prefix.as_str()), Bound::Unbounded));

        run.take_while(move |(path, _)| path.starts_with(prefix.as_str()))
            .filter_map(move |(path, _)| {
                let rest = &path[skip..];
                if rest.is_empty() || rest.contains('/') {
                    None
                } else {
                    Some(rest)
                }
            })
    }
}
