use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ovl",
    about = "Overlay Link — shared state and asset transfer for broadcast graphics",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Sync endpoint of the server to talk to.
    #[arg(long, global = true, default_value = "ws://127.0.0.1:4600/ws")]
    pub server: String,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the OVL server
    Serve(ServeArgs),
    /// Read one key from the shared state
    Get(GetArgs),
    /// Write one key in the shared state
    Set(SetArgs),
    /// Follow one key and print every change
    Watch(WatchArgs),
    /// Upload a file in chunks and print its public URL
    Upload(UploadArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML config file; flags below override it.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    #[arg(long)]
    pub state_file: Option<PathBuf>,
    #[arg(long)]
    pub uploads_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct GetArgs {
    pub key: String,
}

#[derive(Args)]
pub struct SetArgs {
    pub key: String,
    /// JSON value; anything that does not parse as JSON is stored as a
    /// plain string.
    pub value: String,
}

#[derive(Args)]
pub struct WatchArgs {
    pub key: String,
}

#[derive(Args)]
pub struct UploadArgs {
    pub file: PathBuf,
    /// State key to bind the artifact URL to; omit to only upload.
    #[arg(long)]
    pub key: Option<String>,
    /// Name to store the file under (defaults to the source file name).
    #[arg(long)]
    pub name: Option<String>,
}
