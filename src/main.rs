//! RAX remote file client - Entry Point
//!
//! Runs a single file operation against the configured FTP or SFTP server.

use clap::Parser;
use log::info;
use std::path::Path;
use std::process;
use std::time::UNIX_EPOCH;

use rax_ftp_client::config::ClientConfig;
use rax_ftp_client::error::handlers::{exit_code, report};
use rax_ftp_client::error::{Error, Result};
use rax_ftp_client::transport::{FileKind, RemoteFile};
use rax_ftp_client::utils::logging::setup_logging;
use rax_ftp_client::{RemoteClient, connect};

mod cli;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            report(&e);
            process::exit(exit_code(&e));
        }
    }
}

/// Returns the process exit code.
fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };
    info!("Connecting to {}://{}", config.protocol, config.endpoint());

    let client = connect(&config)?;
    let outcome = execute(client.as_ref(), cli.command);
    client.close();
    outcome
}

fn execute(client: &dyn RemoteClient, command: Commands) -> Result<i32> {
    match command {
        Commands::Put {
            local,
            remote_dir,
            name,
            suffix,
        } => {
            let name = match name {
                Some(name) => name,
                None => local_file_name(&local)?,
            };
            client.put_file(&local, &remote_dir, &name, &suffix)?;
        }
        Commands::Get {
            remote_path,
            local_dir,
        } => client.get_by_path(&local_dir, &remote_path)?,
        Commands::Mv {
            src_dir,
            dest_dir,
            filename,
        } => client.move_file(&src_dir, &dest_dir, &filename)?,
        Commands::Cp {
            src_dir,
            dest_dir,
            filename,
            name,
            suffix,
        } => client.copy(&src_dir, &dest_dir, &filename, &suffix, &name)?,
        Commands::Rm { path } => return Ok(print_flag(client.delete_file(&path)?)),
        Commands::Rmdir { path } => return Ok(print_flag(client.remove_directory(&path)?)),
        Commands::Ls {
            dir,
            long,
            recursive,
        } => {
            let files = if recursive {
                client.list_recursive(&dir, true)?
            } else if long {
                client.list_files(&dir)?
            } else {
                for name in client.list_names(&dir)? {
                    println!("{name}");
                }
                return Ok(0);
            };
            for file in &files {
                print_entry(file, long);
            }
        }
        Commands::Exists { path, file } => {
            let exists = if file {
                client.file_exists(&path)?
            } else {
                client.path_exists(&path)?
            };
            return Ok(print_flag(exists));
        }
        Commands::Mkdir { path } => client.make_directories(&path)?,
    }
    Ok(0)
}

/// Print a yes/no outcome; "no" exits with 1.
fn print_flag(flag: bool) -> i32 {
    println!("{flag}");
    if flag { 0 } else { 1 }
}

fn print_entry(file: &RemoteFile, long: bool) {
    if !long {
        println!("{}", file.path());
        return;
    }
    let kind = match file.kind {
        FileKind::File => '-',
        FileKind::Directory => 'd',
        FileKind::Symlink => 'l',
    };
    let modified = file
        .modified
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("{} {:>12} {:>12} {}", kind, file.size, modified, file.path());
}

fn local_file_name(local: &Path) -> Result<String> {
    local
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidPath(local.display().to_string()))
}
