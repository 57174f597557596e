//! # mirrorfs-fuse
//!
//! FUSE front end for mirrorfs.
//!
//! Translates inode-addressed kernel requests into path-addressed calls on
//! a [`FilesystemService`](mirrorfs_core::FilesystemService).
//! - Inodes are assigned lazily per path (see [`inode`]).
//! - Attributes come from `getattr`; timestamps are fixed at the epoch.
//! - Kernel data caching follows the `[mount]` config.

pub mod inode;

use std::time::Duration;

use mirrorfs_config::MountConfig;

pub use inode::{InodeTable, ROOT_INODE};

/// Mount-time settings for the FUSE session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSettings {
    pub fsname: String,
    pub ttl: Duration,
    pub auto_unmount: bool,
    pub allow_other: bool,
    pub kernel_cache: bool,
}

impl Default for MountSettings {
    fn default() -> Self {
        Self::from(&MountConfig::default())
    }
}

impl From<&MountConfig> for MountSettings {
    fn from(config: &MountConfig) -> Self {
        Self {
            fsname: config.fsname.clone(),
            ttl: Duration::from_secs(config.attr_ttl_secs),
            auto_unmount: config.auto_unmount,
            allow_other: config.allow_other,
            kernel_cache: config.kernel_cache,
        }
    }
}

#[cfg(all(feature = "fuse", target_os = "linux"))]
mod imp {
    use std::ffi::OsStr;
    use std::path::Path;
    use std::time::{SystemTime, UNIX_EPOCH};

    use fuser::{
        FileAttr, FileType, Filesystem, KernelConfig, MountOption, ReplyAttr, ReplyCreate,
        ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request,
        TimeOrNow,
    };
    use libc::{c_int, EINVAL, ENOENT};
    use mirrorfs_config::{log_fuse_debug, log_fuse_info};
    use mirrorfs_core::{EntryKind, FilesystemService, FsError, Stat, Timestamps};

    use super::inode::{join, parent_of, InodeTable};
    use super::MountSettings;

    const BLOCK_SIZE: u64 = 4096;

    pub struct MirrorFs {
        service: FilesystemService,
        inodes: InodeTable,
        settings: MountSettings,
    }

    impl MirrorFs {
        pub fn new(service: FilesystemService, settings: MountSettings) -> Self {
            Self {
                service,
                inodes: InodeTable::new(),
                settings,
            }
        }

        /// Mount the filesystem at the given path (Ref: <https://docs.rs/fuser>)
        /// and serve requests until it is unmounted.
        pub fn mount(self, mountpoint: &Path) -> anyhow::Result<()> {
            let mut opts = vec![
                MountOption::RW,
                MountOption::FSName(self.settings.fsname.clone()),
            ];
            if self.settings.allow_other {
                opts.push(MountOption::AllowOther);
            }
            if self.settings.auto_unmount {
                opts.push(MountOption::AutoUnmount);
            }

            log_fuse_info!(
                "mounting",
                mountpoint = tracing::field::display(mountpoint.display()),
                fsname = self.settings.fsname.as_str()
            );
            fuser::mount2(self, mountpoint, &opts)?;
            Ok(())
        }

        fn path_of(&self, ino: u64) -> Result<String, c_int> {
            self.inodes.path(ino).map(str::to_string).ok_or(ENOENT)
        }

        fn child_path(&self, parent: u64, name: &OsStr) -> Result<String, c_int> {
            let parent = self.path_of(parent)?;
            let name = name.to_str().ok_or(ENOENT)?;
            Ok(join(&parent, name))
        }

        /// Attributes for `path`, assigning it an inode if it has none yet
        fn attr_for(&mut self, path: &str) -> Result<FileAttr, FsError> {
            let stat = self.service.getattr(path)?;
            let ino = self.inodes.assign(path);
            Ok(to_file_attr(ino, &stat))
        }

        fn open_flags(&self) -> u32 {
            if self.settings.kernel_cache {
                fuser::consts::FOPEN_KEEP_CACHE
            } else {
                0
            }
        }
    }

    fn to_file_attr(ino: u64, stat: &Stat) -> FileAttr {
        FileAttr {
            ino,
            size: stat.size,
            blocks: stat.size.div_ceil(BLOCK_SIZE),
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
            crtime: UNIX_EPOCH,
            kind: to_file_type(stat.kind),
            perm: stat.perm,
            nlink: stat.nlink,
            uid: 0,
            gid: 0,
            rdev: 0,
            flags: 0,
            blksize: BLOCK_SIZE as u32,
        }
    }

    fn to_file_type(kind: EntryKind) -> FileType {
        match kind {
            EntryKind::Directory => FileType::Directory,
            EntryKind::File => FileType::RegularFile,
        }
    }

    fn to_system_time(time: Option<TimeOrNow>) -> Option<SystemTime> {
        time.map(|t| match t {
            TimeOrNow::SpecificTime(t) => t,
            TimeOrNow::Now => SystemTime::now(),
        })
    }

    impl Filesystem for MirrorFs {
        fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
            self.service.init();
            Ok(())
        }

        fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
            let path = match self.child_path(parent, name) {
                Ok(p) => p,
                Err(e) => {
                    reply.error(e);
                    return;
                }
            };

            match self.attr_for(&path) {
                Ok(attr) => reply.entry(&self.settings.ttl, &attr, 0),
                Err(e) => reply.error(e.errno()),
            }
        }

        fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
            let path = match self.path_of(ino) {
                Ok(p) => p,
                Err(e) => {
                    reply.error(e);
                    return;
                }
            };

            match self.service.getattr(&path) {
                Ok(stat) => reply.attr(&self.settings.ttl, &to_file_attr(ino, &stat)),
                Err(e) => reply.error(e.errno()),
            }
        }

        /// Only timestamps reach this filesystem's setattr; they are not kept
        #[allow(clippy::too_many_arguments)]
        fn setattr(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            _mode: Option<u32>,
            _uid: Option<u32>,
            _gid: Option<u32>,
            size: Option<u64>,
            atime: Option<TimeOrNow>,
            mtime: Option<TimeOrNow>,
            _ctime: Option<SystemTime>,
            _fh: Option<u64>,
            _crtime: Option<SystemTime>,
            _chgtime: Option<SystemTime>,
            _bkuptime: Option<SystemTime>,
            _flags: Option<u32>,
            reply: ReplyAttr,
        ) {
            let path = match self.path_of(ino) {
                Ok(p) => p,
                Err(e) => {
                    reply.error(e);
                    return;
                }
            };
            if let Some(size) = size {
                log_fuse_debug!("setattr size ignored", path = path.as_str(), size = size);
            }

            let times = Timestamps {
                atime: to_system_time(atime),
                mtime: to_system_time(mtime),
            };
            let result = self
                .service
                .utimens(&path, times)
                .and_then(|()| self.service.getattr(&path));

            match result {
                Ok(stat) => reply.attr(&self.settings.ttl, &to_file_attr(ino, &stat)),
                Err(e) => reply.error(e.errno()),
            }
        }

        fn mknod(
            &mut self,
            _req: &Request<'_>,
            parent: u64,
            name: &OsStr,
            _mode: u32,
            _umask: u32,
            _rdev: u32,
            reply: ReplyEntry,
        ) {
            let path = match self.child_path(parent, name) {
                Ok(p) => p,
                Err(e) => {
                    reply.error(e);
                    return;
                }
            };

            match self.service.mknod(&path).and_then(|()| self.attr_for(&path)) {
                Ok(attr) => reply.entry(&self.settings.ttl, &attr, 0),
                Err(e) => reply.error(e.errno()),
            }
        }

        fn mkdir(
            &mut self,
            _req: &Request<'_>,
            parent: u64,
            name: &OsStr,
            _mode: u32,
            _umask: u32,
            reply: ReplyEntry,
        ) {
            let path = match self.child_path(parent, name) {
                Ok(p) => p,
                Err(e) => {
                    reply.error(e);
                    return;
                }
            };

            match self.service.mkdir(&path).and_then(|()| self.attr_for(&path)) {
                Ok(attr) => reply.entry(&self.settings.ttl, &attr, 0),
                Err(e) => reply.error(e.errno()),
            }
        }

        fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
            let path = match self.child_path(parent, name) {
                Ok(p) => p,
                Err(e) => {
                    reply.error(e);
                    return;
                }
            };

            match self.service.unlink(&path) {
                Ok(()) => {
                    self.inodes.release(&path);
                    reply.ok()
                }
                Err(e) => reply.error(e.errno()),
            }
        }

        fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
            let path = match self.child_path(parent, name) {
                Ok(p) => p,
                Err(e) => {
                    reply.error(e);
                    return;
                }
            };

            match self.service.rmdir(&path) {
                Ok(()) => {
                    self.inodes.release(&path);
                    reply.ok()
                }
                Err(e) => reply.error(e.errno()),
            }
        }

        fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
            let result = self
                .path_of(ino)
                .and_then(|path| self.service.open(&path).map_err(|e| e.errno()));

            match result {
                Ok(()) => reply.opened(0, self.open_flags()),
                Err(e) => reply.error(e),
            }
        }

        fn read(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            _fh: u64,
            offset: i64,
            size: u32,
            _flags: i32,
            _lock_owner: Option<u64>,
            reply: ReplyData,
        ) {
            let Ok(offset) = u64::try_from(offset) else {
                reply.error(EINVAL);
                return;
            };
            let path = match self.path_of(ino) {
                Ok(p) => p,
                Err(e) => {
                    reply.error(e);
                    return;
                }
            };

            match self.service.read(&path, size as usize, offset) {
                Ok(data) => reply.data(&data),
                Err(e) => reply.error(e.errno()),
            }
        }

        fn write(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            _fh: u64,
            offset: i64,
            data: &[u8],
            _write_flags: u32,
            _flags: i32,
            _lock_owner: Option<u64>,
            reply: ReplyWrite,
        ) {
            let Ok(offset) = u64::try_from(offset) else {
                reply.error(EINVAL);
                return;
            };
            let path = match self.path_of(ino) {
                Ok(p) => p,
                Err(e) => {
                    reply.error(e);
                    return;
                }
            };

            match self.service.write(&path, data, offset) {
                Ok(written) => reply.written(written as u32),
                Err(e) => reply.error(e.errno()),
            }
        }

        fn release(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            _fh: u64,
            _flags: i32,
            _lock_owner: Option<u64>,
            _flush: bool,
            reply: ReplyEmpty,
        ) {
            let path = self.inodes.path(ino).unwrap_or_default().to_string();
            match self.service.release(&path) {
                Ok(()) => reply.ok(),
                Err(e) => reply.error(e.errno()),
            }
        }

        fn readdir(
            &mut self,
            _req: &Request<'_>,
            ino: u64,
            _fh: u64,
            offset: i64,
            mut reply: ReplyDirectory,
        ) {
            let path = match self.path_of(ino) {
                Ok(p) => p,
                Err(e) => {
                    reply.error(e);
                    return;
                }
            };
            let names = match self.service.readdir(&path) {
                Ok(names) => names,
                Err(e) => {
                    reply.error(e.errno());
                    return;
                }
            };

            let skip = usize::try_from(offset).unwrap_or(0);
            for (i, name) in names.iter().enumerate().skip(skip) {
                let (child_ino, kind) = match name.as_str() {
                    "." => (ino, FileType::Directory),
                    ".." => (self.inodes.assign(parent_of(&path)), FileType::Directory),
                    _ => {
                        let child = join(&path, name);
                        let kind = self
                            .service
                            .getattr(&child)
                            .map(|stat| to_file_type(stat.kind))
                            .unwrap_or(FileType::RegularFile);
                        (self.inodes.assign(&child), kind)
                    }
                };

                // offset for the next entry is this entry's 1-based position
                if reply.add(child_ino, (i + 1) as i64, kind, name) {
                    break;
                }
            }
            reply.ok();
        }

        fn create(
            &mut self,
            _req: &Request<'_>,
            parent: u64,
            name: &OsStr,
            _mode: u32,
            _umask: u32,
            _flags: i32,
            reply: ReplyCreate,
        ) {
            let path = match self.child_path(parent, name) {
                Ok(p) => p,
                Err(e) => {
                    reply.error(e);
                    return;
                }
            };

            match self.service.create(&path).and_then(|()| self.attr_for(&path)) {
                Ok(attr) if attr.kind == FileType::Directory => reply.error(libc::EISDIR),
                Ok(attr) => reply.created(&self.settings.ttl, &attr, 0, 0, self.open_flags()),
                Err(e) => reply.error(e.errno()),
            }
        }
    }
}

#[cfg(not(all(feature = "fuse", target_os = "linux")))]
mod imp {
    use mirrorfs_core::FilesystemService;

    use super::MountSettings;

    /// Dummy FUSE filesystem for non-Linux or non-feature builds
    pub struct MirrorFs;

    impl MirrorFs {
        pub fn new(_service: FilesystemService, _settings: MountSettings) -> Self {
            #[cfg(not(target_os = "linux"))]
            tracing::warn!(
                "FUSE support is only available on Linux (current: {}).",
                std::env::consts::OS
            );
            #[cfg(all(target_os = "linux", not(feature = "fuse")))]
            tracing::warn!("MirrorFs is disabled. Compile with --features fuse to enable.");
            Self
        }

        pub fn mount(self, _mountpoint: &std::path::Path) -> anyhow::Result<()> {
            anyhow::bail!("FUSE not supported on this build");
        }
    }
}

pub use imp::MirrorFs;
