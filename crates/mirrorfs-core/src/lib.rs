//! # mirrorfs-core
//!
//! In-memory namespace for mirrorfs.
//!
//! - `PathIndex` keeps every entry in a path-ordered map; directory
//!   listings are derived from key ranges.
//! - Files created or written at `/x/rest` get a twin at `/rest/x`
//!   (see [`mirror::rotate`]), kept byte-identical on every write.
//! - `FilesystemService` is the operation set a dispatcher calls into.

pub mod entry;
pub mod error;
pub mod index;
pub mod mirror;
pub mod service;

pub use entry::{Entry, EntryKind, FileContent};
pub use error::{FsError, Result};
pub use index::{PathIndex, ROOT};
pub use mirror::{mirror_of, rotate};
pub use service::{FilesystemService, ServiceOptions, Stat, Timestamps, DIR_PERM, FILE_PERM};
