//! # mirrorfs CLI
//!
//! Mounts an in-memory filesystem that keeps a rotated copy of every file:
//! whatever is written to `/tag/item` can also be read from `/item/tag`.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use mirrorfs_config::Config;

mod mount;

/// mirrorfs - in-memory filesystem with automatic path mirroring
#[derive(Parser, Debug)]
#[command(name = "mirrorfs")]
#[command(version, about, long_about = None)]
#[command(after_help = "\
File-system specific behavior:
  Creating or writing /a/b also creates or writes /b/a.
  Deeper paths rotate their first component to the end (/a/b/c -> /b/c/a).
  Deleting either copy leaves the other in place.")]
struct Cli {
    #[command(flatten)]
    mount: mount::MountArgs,
}

fn main() -> ExitCode {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures; every other parse error exits 1
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config =
        Config::load_with(cli.mount.config.as_deref()).context("Failed to load config")?;
    cli.mount.apply_overrides(&mut config);

    if cli.mount.print_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    mirrorfs_config::init_logging(config.log.level);
    mount::run(&cli.mount, &config)
}
