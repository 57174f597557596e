use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::PathBuf;

use mirrorfs_config::{log_cli_info, log_cli_warn, Config, LogLevel};
use mirrorfs_core::{FilesystemService, ServiceOptions};
use mirrorfs_fuse::{MirrorFs, MountSettings};

#[derive(Args, Debug)]
pub struct MountArgs {
    /// Mount point directory
    #[arg(value_name = "MOUNTPOINT", required_unless_present = "print_config")]
    pub mountpoint: Option<PathBuf>,

    /// Config file layered over the global and project configs
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Do not create or update rotated copies
    #[arg(long, conflicts_with = "mirror")]
    pub no_mirror: bool,

    /// Keep rotated copies even if a config layer turned them off
    #[arg(long)]
    pub mirror: bool,

    /// Allow other users to access the mount
    #[arg(long)]
    pub allow_other: bool,

    /// Unmount when the process exits
    #[arg(long)]
    pub auto_unmount: bool,

    /// Filesystem name shown in the mount table
    #[arg(long, value_name = "NAME")]
    pub fsname: Option<String>,

    /// Largest size a single file may grow to, in bytes
    #[arg(long, value_name = "BYTES")]
    pub max_file_size: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub print_config: bool,
}

impl MountArgs {
    /// Command-line flags win over every config layer
    pub fn apply_overrides(&self, config: &mut Config) {
        if self.no_mirror {
            config.mirror.enabled = false;
        }
        if self.mirror {
            config.mirror.enabled = true;
        }
        if self.allow_other {
            config.mount.allow_other = true;
        }
        if self.auto_unmount {
            config.mount.auto_unmount = true;
        }
        if let Some(fsname) = &self.fsname {
            config.mount.fsname = fsname.clone();
        }
        if let Some(size) = self.max_file_size {
            config.mount.max_file_size = size;
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }
    }
}

/// Execute the mount command
pub fn run(args: &MountArgs, config: &Config) -> Result<()> {
    let mountpoint = args
        .mountpoint
        .as_ref()
        .context("A mountpoint is required")?;

    // Ensure mountpoint exists
    if !mountpoint.exists() {
        fs::create_dir_all(mountpoint)
            .with_context(|| format!("Failed to create mountpoint: {}", mountpoint.display()))?;
    }

    log_cli_info!(
        "Mounting mirrorfs",
        mountpoint = tracing::field::display(mountpoint.display()),
        fsname = config.mount.fsname.as_str(),
        mirror = config.mirror.enabled
    );
    if !config.mirror.enabled {
        log_cli_warn!("Mirroring disabled; files will not get rotated copies");
    }

    let service = FilesystemService::new(ServiceOptions {
        mirror: config.mirror.enabled,
        max_file_size: config.mount.max_file_size,
    });
    let fs = MirrorFs::new(service, MountSettings::from(&config.mount));

    // This will block until unmounted
    fs.mount(mountpoint)
        .with_context(|| format!("Failed to mount at {}", mountpoint.display()))
}
