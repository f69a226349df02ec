//! Command-line arguments

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rax-ftp-client",
    version,
    about = "Transfer files to and from an FTP or SFTP server",
    after_help = "Connection settings come from config.toml and RAX_FTP_CLIENT_* environment variables.\nEXAMPLES:\n  Upload:    rax-ftp-client put ./report.csv /incoming/2024\n  Download:  rax-ftp-client get /incoming/2024/report.csv ./downloads\n  List tree: rax-ftp-client ls -l -r /incoming"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short = 'c', long, help = "Configuration file (toml, yaml or json)")]
    pub config: Option<PathBuf>,

    #[arg(short = 'v', long, action = clap::ArgAction::Count, help = "Increase log verbosity (-v, -vv, -vvv)")]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a local file
    Put {
        local: PathBuf,
        remote_dir: String,
        #[arg(short, long, help = "Remote file name [default: local file name]")]
        name: Option<String>,
        #[arg(short, long, default_value = ".tmp", help = "Staging suffix; empty uploads in place")]
        suffix: String,
    },

    /// Download a remote file into a local directory
    Get {
        remote_path: String,
        #[arg(default_value = ".")]
        local_dir: PathBuf,
    },

    /// Move a file to another remote directory
    Mv {
        src_dir: String,
        dest_dir: String,
        filename: String,
    },

    /// Copy a remote file
    Cp {
        src_dir: String,
        dest_dir: String,
        filename: String,
        #[arg(short, long, default_value = "", help = "New file name [default: same name]")]
        name: String,
        #[arg(short, long, default_value = ".tmp")]
        suffix: String,
    },

    /// Delete a remote file
    Rm { path: String },

    /// Remove an empty remote directory
    Rmdir { path: String },

    /// List a remote directory
    Ls {
        #[arg(default_value = "/")]
        dir: String,
        #[arg(short, long, help = "Show size, kind and modification time")]
        long: bool,
        #[arg(short, long, help = "Descend into subdirectories (files only)")]
        recursive: bool,
    },

    /// Check whether a remote path exists
    Exists {
        path: String,
        #[arg(short, long, help = "Require a plain file")]
        file: bool,
    },

    /// Create a remote directory and its parents
    Mkdir { path: String },
}
