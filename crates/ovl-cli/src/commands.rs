use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use colored::Colorize;
use tokio::sync::watch;

use ovl_protocol::WireMessage;
use ovl_server::{OvlServer, ServerConfig};
use ovl_sync::{
    Connection, Connector, Replica, ReplicaEvent, ReplicaOptions, UploadProgress, Uploader,
    WsConnector,
};
use ovl_types::UploadName;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Get(args) => cmd_get(&cli.server, args).await,
        Command::Set(args) => cmd_set(&cli.server, args).await,
        Command::Watch(args) => cmd_watch(&cli.server, args).await,
        Command::Upload(args) => cmd_upload(&cli.server, args).await,
    }
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match args.config {
        Some(path) => ServerConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(file) = args.state_file {
        config.snapshot_file = file;
    }
    if let Some(dir) = args.uploads_dir {
        config.uploads_dir = dir;
    }

    println!(
        "{} OVL server on {} (state: {}, uploads: {})",
        "✓".green().bold(),
        config.bind_addr.to_string().bold(),
        config.snapshot_file.display().to_string().cyan(),
        config.uploads_dir.display().to_string().cyan(),
    );
    OvlServer::new(config).serve().await?;
    Ok(())
}

async fn connect(server: &str) -> anyhow::Result<Connection> {
    WsConnector::new(server)
        .connect()
        .await
        .with_context(|| format!("connecting to {server}"))
}

async fn cmd_get(server: &str, args: GetArgs) -> anyhow::Result<()> {
    let mut conn = connect(server).await?;
    let Some(WireMessage::Init { state }) = conn.recv().await else {
        bail!("server did not send an initial snapshot");
    };
    match state.get(args.key.as_str()) {
        Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
        None => println!("{}", "(absent)".dimmed()),
    }
    Ok(())
}

async fn cmd_set(server: &str, args: SetArgs) -> anyhow::Result<()> {
    let value = serde_json::from_str(&args.value)
        .unwrap_or(serde_json::Value::String(args.value.clone()));

    let mut conn = connect(server).await?;
    let Some(WireMessage::Init { .. }) = conn.recv().await else {
        bail!("server did not send an initial snapshot");
    };
    conn.send(WireMessage::Mutate { key: args.key.clone().into(), value })
        .await
        .context("sending mutation")?;
    // Give the write pump a moment to flush before the runtime shuts down.
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("{} {} set", "✓".green().bold(), args.key.yellow());
    Ok(())
}

async fn cmd_watch(server: &str, args: WatchArgs) -> anyhow::Result<()> {
    let (replica, mut events) = Replica::spawn(
        Arc::new(WsConnector::new(server)),
        ReplicaOptions::default(),
    );
    let mut rx = replica.watch(args.key.clone()).await?;

    println!("Watching {} on {} (Ctrl-C to stop)", args.key.yellow().bold(), server.bold());
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    bail!("replica stopped");
                }
                let value = rx.borrow_and_update().clone();
                match value {
                    Some(v) => println!("{} {}", args.key.yellow(), serde_json::to_string(&v)?),
                    None => println!("{} {}", args.key.yellow(), "(removed)".dimmed()),
                }
            }
            event = events.recv() => match event {
                Some(ReplicaEvent::Connected) => println!("{}", "connected".green().dimmed()),
                Some(ReplicaEvent::Disconnected) => println!("{}", "disconnected, retrying…".red().dimmed()),
                Some(ReplicaEvent::MutationFailed { key }) => {
                    println!("{} {}", "write failed:".red(), key);
                }
                None => bail!("replica stopped"),
            },
        }
    }
}

async fn cmd_upload(server: &str, args: UploadArgs) -> anyhow::Result<()> {
    let name = match args.name {
        Some(name) => UploadName::parse(name)?,
        None => {
            let file_name = args
                .file
                .file_name()
                .and_then(|n| n.to_str())
                .context("source path has no usable file name")?;
            UploadName::parse(file_name)?
        }
    };
    let bind_key = args.key.clone().map(Into::into);

    let (tx, mut rx) = watch::channel(UploadProgress { bytes_acked: 0, total: 0 });
    let progress = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let p = *rx.borrow_and_update();
            print!("\r{:>3.0}%", p.ratio() * 100.0);
            use std::io::Write;
            let _ = std::io::stdout().flush();
        }
    });

    let uploader = Uploader::new(Arc::new(WsConnector::new(server)));
    let artifact = uploader
        .upload_with_progress(&args.file, name, bind_key, Some(tx))
        .await
        .with_context(|| format!("uploading {}", args.file.display()))?;
    progress.abort();

    println!("\r{} {}", "✓".green().bold(), artifact.url.cyan().bold());
    if let Some(key) = args.key {
        println!("  bound to {}", key.yellow());
    }
    Ok(())
}
